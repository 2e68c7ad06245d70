//! Mutation descriptors: named state transitions executed by a store.

use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::path::PathScope;

type Handler<S> = Arc<dyn Fn(&mut S, Value) -> anyhow::Result<PathScope> + Send + Sync>;

/// A named synchronous state transition.
///
/// A mutation pairs a unique name with a handler `(state, payload) ->
/// PathScope` and carries no behavior of its own: the handler only runs
/// when a store that registered the mutation dispatches its name, so a
/// descriptor cannot be invoked outside its container. Descriptors are
/// plain values and may be registered on different stores over the same
/// state type.
pub struct Mutation<S> {
    name: String,
    handler: Handler<S>,
}

impl<S> Mutation<S> {
    /// Pair `name` with a typed handler.
    ///
    /// The JSON payload supplied at dispatch time is decoded into `P`
    /// before the handler runs; a decode failure is reported as a handler
    /// error.
    pub fn new<P, F>(name: impl Into<String>, handler: F) -> Self
    where
        P: DeserializeOwned,
        F: Fn(&mut S, P) -> anyhow::Result<PathScope> + Send + Sync + 'static,
    {
        let name = name.into();
        let label = name.clone();
        Mutation {
            name,
            handler: Arc::new(move |state: &mut S, raw: Value| {
                let payload: P = serde_json::from_value(raw)
                    .with_context(|| format!("decode payload for mutation '{label}'"))?;
                handler(state, payload)
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn apply(&self, state: &mut S, payload: Value) -> anyhow::Result<PathScope> {
        (self.handler)(state, payload)
    }
}

impl<S> Clone for Mutation<S> {
    fn clone(&self) -> Self {
        Mutation {
            name: self.name.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<S> fmt::Debug for Mutation<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Disposition of a failed async read phase.
#[derive(Debug)]
pub enum Recovery {
    /// The error was absorbed into state; diff and notify under this scope.
    Recovered(PathScope),
    /// No error finalizer: propagate the error to the dispatch caller
    /// unchanged.
    Unhandled(anyhow::Error),
}

/// A named two-phase state transition: an async read-only phase followed
/// by a synchronous finalizer.
///
/// Implementations are registered by name on a store and dispatched with
/// [`Store::dispatch_async`](crate::container::Store::dispatch_async).
#[async_trait]
pub trait AsyncMutation<S>: Send + Sync {
    /// Perform the async work against the live, unsnapshotted state tree.
    ///
    /// Read-only by documented contract, not runtime enforcement: no
    /// snapshot exists yet, so anything mutated here is never diffed or
    /// reported.
    async fn read(&self, state: &S, payload: Value) -> anyhow::Result<Value>;

    /// Apply the read result to state. Runs inside the non-suspending
    /// snapshot → diff → notify unit.
    fn on_success(&self, state: &mut S, result: Value) -> anyhow::Result<PathScope>;

    /// Recover from a failed read phase.
    ///
    /// The default declares no error finalizer: the error goes back to the
    /// dispatch caller unchanged and nothing is notified. Overrides that
    /// write the failure into state must return [`Recovery::Recovered`]
    /// with the scope they touched; mutating and then returning
    /// `Unhandled` leaves the change undiffed.
    fn on_error(&self, state: &mut S, error: anyhow::Error) -> Recovery {
        let _ = state;
        Recovery::Unhandled(error)
    }
}
