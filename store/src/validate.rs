//! One-time structural validation of the reserved agents map.
//!
//! Runs inside [`StoreBuilder::build`](crate::container::StoreBuilder::build),
//! after the state is assigned and before any dispatch is possible. Never
//! re-run after construction. Shape violations are caught by an embedded
//! JSON Schema; the key/name pairing is a semantic invariant checked by
//! hand.

use jsonschema::validator_for;
use serde_json::Value;
use tracing::debug;

use crate::error::Error;

/// Reserved top-level key of the state tree holding the agents map.
pub const AGENTS_KEY: &str = "agents";

static AGENTS_SCHEMA: &str = include_str!("../schemas/agents.schema.json");

/// Check the agents sub-map of a serialized state tree.
///
/// Trees without the reserved key (or with a null value there) pass. A
/// sub-map that is not a map of name-carrying objects is the structural
/// error [`Error::AgentMapShape`]; an entry whose `name` field disagrees
/// with its key is [`Error::AgentNameMismatch`], naming both sides.
pub(crate) fn check_agents(tree: &Value) -> Result<(), Error> {
    let Some(agents) = tree.get(AGENTS_KEY) else {
        return Ok(());
    };
    if agents.is_null() {
        return Ok(());
    }
    check_shape(agents)?;
    check_names(agents)?;
    debug!("agents map validated");
    Ok(())
}

fn check_shape(agents: &Value) -> Result<(), Error> {
    let schema: Value = serde_json::from_str(AGENTS_SCHEMA)
        .map_err(|err| Error::Internal(format!("parse agents schema: {err}")))?;
    let validator = validator_for(&schema)
        .map_err(|err| Error::Internal(format!("compile agents schema: {err}")))?;
    if !validator.is_valid(agents) {
        let detail = validator
            .iter_errors(agents)
            .map(|err| err.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(Error::AgentMapShape { detail });
    }
    Ok(())
}

fn check_names(agents: &Value) -> Result<(), Error> {
    if let Some(map) = agents.as_object() {
        for (key, entry) in map {
            let name = entry.get("name").and_then(Value::as_str).unwrap_or("");
            if key != name {
                return Err(Error::AgentNameMismatch {
                    key: key.clone(),
                    name: name.to_string(),
                });
            }
        }
    }
    Ok(())
}
