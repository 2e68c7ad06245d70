//! Test-only helpers for constructing agent state.

use std::collections::BTreeMap;

use crate::agent::{AgentState, Message};

/// Agents map where every entry is keyed by its own name.
pub fn agents(names: &[&str]) -> BTreeMap<String, AgentState> {
    names
        .iter()
        .map(|name| ((*name).to_string(), AgentState::new(*name)))
        .collect()
}

/// Chat message with the given role and content.
pub fn message(role: &str, content: &str) -> Message {
    Message {
        role: role.to_string(),
        content: content.to_string(),
    }
}
