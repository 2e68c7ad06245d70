//! The store: single owner of the state tree and host of the mutation
//! pipeline.
//!
//! Every dispatch runs snapshot → handler → scope-filtered diff → notify
//! as one non-suspending unit. Async mutations suspend only in their read
//! phase, before the snapshot is taken, so no other dispatch on the same
//! store can observe a diff in progress. Dispatch takes `&mut self`: the
//! store has no internal locking, and concurrent dispatch must be
//! serialized by the caller.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::diff::{Delta, diff_trees, snapshot};
use crate::error::Error;
use crate::fanout::Fanouts;
use crate::mutation::{AsyncMutation, Mutation, Recovery};
use crate::path::PathScope;
use crate::subscribers::{Subscribers, SubscriptionId};
use crate::validate::check_agents;

/// Collects mutation descriptors before the store exists, so every
/// registration happens strictly before the first dispatch.
pub struct StoreBuilder<S> {
    mutations: Vec<Mutation<S>>,
    async_mutations: Vec<(String, Arc<dyn AsyncMutation<S>>)>,
}

impl<S> StoreBuilder<S> {
    pub fn new() -> Self {
        StoreBuilder {
            mutations: Vec::new(),
            async_mutations: Vec::new(),
        }
    }

    /// Register a synchronous mutation under its own name.
    pub fn mutation(mut self, mutation: Mutation<S>) -> Self {
        self.mutations.push(mutation);
        self
    }

    /// Register a two-phase async mutation under `name`.
    pub fn async_mutation(
        mut self,
        name: impl Into<String>,
        mutation: impl AsyncMutation<S> + 'static,
    ) -> Self {
        self.async_mutations.push((name.into(), Arc::new(mutation)));
        self
    }
}

impl<S: Serialize> StoreBuilder<S> {
    /// Check registrations and the initial state, then build the store.
    ///
    /// Names share one namespace across sync and async mutations; a repeat
    /// fails with [`Error::DuplicateMutation`]. The agents validation
    /// guard runs here, once, before any dispatch is possible.
    pub fn build(self, state: S) -> Result<Store<S>, Error> {
        let mut mutations = HashMap::new();
        for mutation in self.mutations {
            let name = mutation.name().to_string();
            if mutations.contains_key(&name) {
                return Err(Error::DuplicateMutation { name });
            }
            mutations.insert(name, mutation);
        }
        let mut async_mutations: HashMap<String, Arc<dyn AsyncMutation<S>>> = HashMap::new();
        for (name, mutation) in self.async_mutations {
            if mutations.contains_key(&name) || async_mutations.contains_key(&name) {
                return Err(Error::DuplicateMutation { name });
            }
            async_mutations.insert(name, mutation);
        }

        let tree = snapshot(&state).map_err(Error::Snapshot)?;
        check_agents(&tree)?;

        debug!(
            mutations = mutations.len(),
            async_mutations = async_mutations.len(),
            "store built"
        );
        Ok(Store {
            state,
            mutations,
            async_mutations,
            subscribers: Subscribers::new(),
            fanouts: Fanouts::new(),
        })
    }
}

impl<S> Default for StoreBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Single owner of the canonical state tree.
pub struct Store<S> {
    state: S,
    mutations: HashMap<String, Mutation<S>>,
    async_mutations: HashMap<String, Arc<dyn AsyncMutation<S>>>,
    subscribers: Subscribers,
    fanouts: Fanouts,
}

impl<S> std::fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("mutations", &self.mutations.keys().collect::<Vec<_>>())
            .field(
                "async_mutations",
                &self.async_mutations.keys().collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl<S: Serialize> Store<S> {
    pub fn builder() -> StoreBuilder<S> {
        StoreBuilder::new()
    }

    /// Read access to the state tree. Mutation happens only inside handler
    /// bodies, via dispatch.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// The companion coordinator for tracking fanned-out subtasks.
    pub fn fanouts(&self) -> &Fanouts {
        &self.fanouts
    }

    /// Run a synchronous mutation by name.
    ///
    /// Snapshots the tree, runs the handler, and — unless the handler
    /// declared a no-op scope — diffs the declared subtrees and notifies
    /// subscribers of a non-empty delta, synchronously and in
    /// subscription order. A handler failure propagates as
    /// [`Error::Handler`] with the tree possibly partially mutated; there
    /// is no rollback.
    pub fn dispatch(&mut self, name: &str, payload: impl Serialize) -> Result<(), Error> {
        let mutation = self
            .mutations
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownMutation {
                name: name.to_string(),
            })?;
        let payload = serde_json::to_value(payload).map_err(|source| Error::Payload {
            name: name.to_string(),
            source,
        })?;

        trace!(mutation = name, "dispatch");
        let before = snapshot(&self.state).map_err(Error::Snapshot)?;
        let scope = mutation
            .apply(&mut self.state, payload)
            .map_err(|source| Error::Handler {
                name: name.to_string(),
                source,
            })?;
        self.finish(name, &before, scope)
    }

    /// Run a two-phase async mutation by name.
    ///
    /// Awaits the read phase against the current, unsnapshotted tree. On
    /// success, runs snapshot → success finalizer → diff → notify. On
    /// failure, offers the error to the mutation's error finalizer: a
    /// recovered error drives the same snapshot/diff/notify sequence,
    /// an unhandled one comes back as [`Error::AsyncWork`] with no state
    /// change and no notification. If the host cancels the read-phase
    /// future, neither finalizer runs and nothing is notified.
    pub async fn dispatch_async(
        &mut self,
        name: &str,
        payload: impl Serialize,
    ) -> Result<(), Error> {
        let mutation = self
            .async_mutations
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| Error::UnknownMutation {
                name: name.to_string(),
            })?;
        let payload = serde_json::to_value(payload).map_err(|source| Error::Payload {
            name: name.to_string(),
            source,
        })?;

        trace!(mutation = name, "dispatch async read phase");
        match mutation.read(&self.state, payload).await {
            Ok(result) => {
                let before = snapshot(&self.state).map_err(Error::Snapshot)?;
                let scope = mutation
                    .on_success(&mut self.state, result)
                    .map_err(|source| Error::Handler {
                        name: name.to_string(),
                        source,
                    })?;
                self.finish(name, &before, scope)
            }
            Err(error) => {
                let before = snapshot(&self.state).map_err(Error::Snapshot)?;
                match mutation.on_error(&mut self.state, error) {
                    Recovery::Recovered(scope) => {
                        debug!(mutation = name, "read phase failed, error finalizer applied");
                        self.finish(name, &before, scope)
                    }
                    Recovery::Unhandled(source) => Err(Error::AsyncWork {
                        name: name.to_string(),
                        source,
                    }),
                }
            }
        }
    }

    /// Register a change observer. Returns the id to redeem with
    /// [`Store::unsubscribe`].
    pub fn subscribe(&mut self, callback: impl FnMut(&Delta) + Send + 'static) -> SubscriptionId {
        self.subscribers.subscribe(Box::new(callback))
    }

    /// Remove a subscription. Safe no-op if already removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscribers.unsubscribe(id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Shared tail of every dispatch: diff under the declared scope and
    /// notify subscribers when something actually changed.
    fn finish(&mut self, name: &str, before: &Value, scope: PathScope) -> Result<(), Error> {
        if scope.is_no_op() {
            trace!(mutation = name, "no-op scope, skipping diff");
            return Ok(());
        }
        let after = snapshot(&self.state).map_err(Error::Snapshot)?;
        let delta = diff_trees(before, &after, &scope);
        if delta.is_empty() {
            trace!(mutation = name, "empty delta, nothing to notify");
            return Ok(());
        }
        debug!(mutation = name, changes = delta.len(), "notifying subscribers");
        self.subscribers.notify(&delta);
        Ok(())
    }
}
