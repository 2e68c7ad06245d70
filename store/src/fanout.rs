//! Fanout coordination: track independently-resolved named subtasks and
//! fire one aggregate callback when the last one resolves.
//!
//! A fanout is created with a fixed set of task names; each task gets a
//! single-use [`Resolver`]. The moment the last task resolves, the
//! registration is torn down and `on_complete` fires with the aggregate
//! result — exactly once. A completed fanout id is gone: any further
//! access to it is an error.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tracing::debug;

use crate::error::Error;

/// Outcome one resolver reports for its task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    pub succeeded: bool,
    /// Task-specific payload: a result on success, an error description on
    /// failure.
    pub result: Value,
}

impl TaskResult {
    pub fn success(result: impl Into<Value>) -> Self {
        TaskResult {
            succeeded: true,
            result: result.into(),
        }
    }

    pub fn failure(result: impl Into<Value>) -> Self {
        TaskResult {
            succeeded: false,
            result: result.into(),
        }
    }
}

/// Aggregate outcome passed to `on_complete` when the last task resolves.
#[derive(Debug, Clone)]
pub struct FanoutResult {
    pub fanout_id: String,
    pub description: String,
    pub success_count: usize,
    pub failure_count: usize,
    pub all_succeeded: bool,
    pub tasks: BTreeMap<String, TaskResult>,
}

type CompletionCallback = Box<dyn FnOnce(FanoutResult) + Send>;

struct Slot {
    name: String,
    outcome: Option<TaskResult>,
}

struct Entry {
    description: String,
    tasks: Vec<Slot>,
    on_complete: CompletionCallback,
}

impl Entry {
    fn slot_mut(&mut self, task: &str) -> Option<&mut Slot> {
        self.tasks.iter_mut().find(|slot| slot.name == task)
    }

    fn all_resolved(&self) -> bool {
        self.tasks.iter().all(|slot| slot.outcome.is_some())
    }
}

#[derive(Default)]
struct Registry {
    entries: HashMap<String, Entry>,
}

/// Tracks active fanouts.
///
/// Cloning shares the registry: the store owns one coordinator and every
/// resolver holds a shared handle into it, so resolvers may be handed to
/// arbitrary callers. The registry lock serializes resolution; completion
/// callbacks run after it is released.
#[derive(Clone, Default)]
pub struct Fanouts {
    registry: Arc<Mutex<Registry>>,
}

impl Fanouts {
    pub fn new() -> Self {
        Fanouts::default()
    }

    /// Register a fanout of named tasks.
    ///
    /// The task-name set is fixed here: every name starts unresolved, and
    /// `on_complete` fires once they have all been resolved. An active
    /// duplicate id, an empty task list, or a repeated task name fails
    /// fast.
    pub fn create<F>(
        &self,
        fanout_id: impl Into<String>,
        description: impl Into<String>,
        task_names: impl IntoIterator<Item = impl Into<String>>,
        on_complete: F,
    ) -> Result<(), Error>
    where
        F: FnOnce(FanoutResult) + Send + 'static,
    {
        let fanout_id = fanout_id.into();
        let mut tasks: Vec<Slot> = Vec::new();
        for name in task_names {
            let name = name.into();
            if tasks.iter().any(|slot| slot.name == name) {
                return Err(Error::DuplicateTask {
                    id: fanout_id,
                    task: name,
                });
            }
            tasks.push(Slot {
                name,
                outcome: None,
            });
        }
        if tasks.is_empty() {
            return Err(Error::EmptyFanout { id: fanout_id });
        }

        let mut registry = lock(&self.registry)?;
        if registry.entries.contains_key(&fanout_id) {
            return Err(Error::DuplicateFanout { id: fanout_id });
        }
        debug!(fanout = %fanout_id, tasks = tasks.len(), "fanout created");
        registry.entries.insert(
            fanout_id,
            Entry {
                description: description.into(),
                tasks,
                on_complete: Box::new(on_complete),
            },
        );
        Ok(())
    }

    /// Hand out a single-use resolver for one task of an active fanout.
    pub fn make_resolver(&self, fanout_id: &str, task_name: &str) -> Result<Resolver, Error> {
        let registry = lock(&self.registry)?;
        let entry = registry
            .entries
            .get(fanout_id)
            .ok_or_else(|| Error::UnknownFanout {
                id: fanout_id.to_string(),
            })?;
        if !entry.tasks.iter().any(|slot| slot.name == task_name) {
            return Err(Error::UnknownTask {
                id: fanout_id.to_string(),
                task: task_name.to_string(),
            });
        }
        Ok(Resolver {
            registry: Arc::clone(&self.registry),
            fanout_id: fanout_id.to_string(),
            task_name: task_name.to_string(),
        })
    }

    /// Number of fanouts still awaiting resolution.
    pub fn active(&self) -> Result<usize, Error> {
        Ok(lock(&self.registry)?.entries.len())
    }
}

/// Single-use handle that marks one fanout task resolved.
///
/// Captures only the two identifiers plus a shared handle to the
/// coordinator's registry.
pub struct Resolver {
    registry: Arc<Mutex<Registry>>,
    fanout_id: String,
    task_name: String,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("fanout_id", &self.fanout_id)
            .field("task_name", &self.task_name)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    pub fn fanout_id(&self) -> &str {
        &self.fanout_id
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// Record the task's outcome.
    ///
    /// A second resolution of the same task fails with
    /// [`Error::TaskAlreadyResolved`] and has no other effect. When this
    /// was the last unresolved task, the fanout's registration is removed
    /// and `on_complete` fires exactly once, outside the registry lock.
    pub fn resolve(&self, result: TaskResult) -> Result<(), Error> {
        let completed = {
            let mut registry = lock(&self.registry)?;
            let entry =
                registry
                    .entries
                    .get_mut(&self.fanout_id)
                    .ok_or_else(|| Error::UnknownFanout {
                        id: self.fanout_id.clone(),
                    })?;
            let slot = entry
                .slot_mut(&self.task_name)
                .ok_or_else(|| Error::UnknownTask {
                    id: self.fanout_id.clone(),
                    task: self.task_name.clone(),
                })?;
            if slot.outcome.is_some() {
                return Err(Error::TaskAlreadyResolved {
                    id: self.fanout_id.clone(),
                    task: self.task_name.clone(),
                });
            }
            debug!(
                fanout = %self.fanout_id,
                task = %self.task_name,
                succeeded = result.succeeded,
                "task resolved"
            );
            slot.outcome = Some(result);
            if entry.all_resolved() {
                registry
                    .entries
                    .remove(&self.fanout_id)
                    .map(|entry| finish(&self.fanout_id, entry))
            } else {
                None
            }
        };

        if let Some((on_complete, result)) = completed {
            debug!(
                fanout = %result.fanout_id,
                succeeded = result.success_count,
                failed = result.failure_count,
                "fanout complete"
            );
            on_complete(result);
        }
        Ok(())
    }
}

fn lock(registry: &Mutex<Registry>) -> Result<MutexGuard<'_, Registry>, Error> {
    registry
        .lock()
        .map_err(|err| Error::Internal(format!("fanout registry lock poisoned: {err}")))
}

/// Tear an entry down into its completion callback and aggregate result.
fn finish(fanout_id: &str, entry: Entry) -> (CompletionCallback, FanoutResult) {
    let mut tasks = BTreeMap::new();
    let mut success_count = 0;
    let mut failure_count = 0;
    for slot in entry.tasks {
        if let Some(outcome) = slot.outcome {
            if outcome.succeeded {
                success_count += 1;
            } else {
                failure_count += 1;
            }
            tasks.insert(slot.name, outcome);
        }
    }
    let result = FanoutResult {
        fanout_id: fanout_id.to_string(),
        description: entry.description,
        success_count,
        failure_count,
        all_succeeded: failure_count == 0,
        tasks,
    };
    (entry.on_complete, result)
}
