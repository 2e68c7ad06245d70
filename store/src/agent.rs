//! Agent-visible state and the built-in mutations that manage it.
//!
//! `AgentState` is not a store of its own — it is composed into a larger
//! state type under the reserved `agents` key, one entry per agent, keyed
//! by agent name. Agents see their own entry plus whatever shared state
//! the application adds, and talk to each other through mutations on that
//! shared state. The key/name pairing is validated once at store
//! construction.

use std::collections::BTreeMap;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mutation::Mutation;
use crate::path::PathScope;
use crate::validate::AGENTS_KEY;

/// One chat message in an agent's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Tool metadata visible to agents: name, description, and payload schema,
/// never the handler itself. Lives in agent state so prompts can describe
/// the tools an agent holds; handlers live with the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub payload_schema: Value,
}

/// Per-agent state composed into the store under the reserved `agents`
/// key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Must match the key this entry is stored under.
    pub name: String,
    /// Whether the agent is enabled at all.
    pub active: bool,
    /// Signal that the agent should take its next action. Set by
    /// orchestration logic, or by other agents through a granted tool.
    pub should_act: bool,
    pub history: Vec<Message>,
    pub tools: Vec<ToolMetadata>,
}

impl AgentState {
    /// An inactive agent with empty history and no tools.
    pub fn new(name: impl Into<String>) -> Self {
        AgentState {
            name: name.into(),
            active: false,
            should_act: false,
            history: Vec::new(),
            tools: Vec::new(),
        }
    }
}

/// Access to the agents map of a state type.
///
/// Implementors must serialize the map under the reserved `agents` key so
/// that scopes, validation, and the built-in mutations all line up.
pub trait AgentsView {
    fn agents(&self) -> &BTreeMap<String, AgentState>;
    fn agents_mut(&mut self) -> &mut BTreeMap<String, AgentState>;
}

/// Payload for [`update_should_act`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateShouldAct {
    pub agent_name: String,
    pub should_act: bool,
}

/// Payload for [`record_history`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHistory {
    pub agent_name: String,
    pub messages: Vec<Message>,
}

/// Built-in mutation flipping an agent's `should_act` flag.
///
/// Orchestration uses this to control agent execution; agents use it (via
/// a granted tool) to signal completion or to activate other agents. An
/// unknown agent name is a handler error.
pub fn update_should_act<S: AgentsView>() -> Mutation<S> {
    Mutation::new(
        "update_should_act",
        |state: &mut S, payload: UpdateShouldAct| {
            let agent = state
                .agents_mut()
                .get_mut(&payload.agent_name)
                .ok_or_else(|| anyhow!("unknown agent '{}'", payload.agent_name))?;
            agent.should_act = payload.should_act;
            Ok(PathScope::paths([format!(
                "{AGENTS_KEY}.{}",
                payload.agent_name
            )]))
        },
    )
}

/// Built-in mutation appending messages to an agent's history.
pub fn record_history<S: AgentsView>() -> Mutation<S> {
    Mutation::new(
        "record_history",
        |state: &mut S, payload: RecordHistory| {
            let agent = state
                .agents_mut()
                .get_mut(&payload.agent_name)
                .ok_or_else(|| anyhow!("unknown agent '{}'", payload.agent_name))?;
            agent.history.extend(payload.messages);
            Ok(PathScope::paths([format!(
                "{AGENTS_KEY}.{}",
                payload.agent_name
            )]))
        },
    )
}
