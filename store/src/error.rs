//! Crate-wide error type.

use thiserror::Error;

/// Errors surfaced by the store, the validation guard, and the fanout
/// coordinator.
///
/// Registration, lookup, and double-resolution errors are programmer
/// errors: they fail fast and are never retried. `Handler` and `AsyncWork`
/// carry the original failure as their source, unmodified, so callers can
/// downcast to the handler's own error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("mutation '{name}' is already registered")]
    DuplicateMutation { name: String },

    #[error("no mutation named '{name}' is registered")]
    UnknownMutation { name: String },

    #[error("failed to encode payload for mutation '{name}'")]
    Payload {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to snapshot state for diffing")]
    Snapshot(#[source] serde_json::Error),

    #[error("mutation '{name}' failed")]
    Handler {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("async mutation '{name}' failed")]
    AsyncWork {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("agents must be a map of agent name to agent state: {detail}")]
    AgentMapShape { detail: String },

    #[error("agents key '{key}' does not match agent name '{name}'")]
    AgentNameMismatch { key: String, name: String },

    #[error("fanout '{id}' already exists")]
    DuplicateFanout { id: String },

    #[error("fanout '{id}' does not exist")]
    UnknownFanout { id: String },

    #[error("task '{task}' is not in fanout '{id}'")]
    UnknownTask { id: String, task: String },

    #[error("task '{task}' appears more than once in fanout '{id}'")]
    DuplicateTask { id: String, task: String },

    #[error("fanout '{id}' has no tasks")]
    EmptyFanout { id: String },

    #[error("task '{task}' in fanout '{id}' is already resolved")]
    TaskAlreadyResolved { id: String, task: String },

    #[error("internal error: {0}")]
    Internal(String),
}
