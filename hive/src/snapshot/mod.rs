//! Snapshot/restore: versioned serialization of multi-agent state.
//!
//! A [`Snapshot`] captures per-agent conversations and context state,
//! delegation instances, the scratchpad, read tracking, and plugin state in
//! one document (version `"2.1.0"`). Restore is three-phase: validate
//! version and type, classify entries as restorable or skipped (producing
//! warnings, never errors, for anything missing from the current
//! configuration), then rebuild message lists and rehydrate state.
//!
//! Conversations are stored without system messages; the agent's
//! `system_prompt` is a separate field, and restore prepends the *current*
//! prompt by default (or the historical one with
//! [`RestoreOptions::preserve_system_prompts`]).

mod swarm_state;
mod workflow_state;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::chat::ContextState;
use crate::message::Message;
use crate::scratchpad::ScratchpadEntry;

/// The only snapshot version this build reads or writes.
pub const SNAPSHOT_VERSION: &str = "2.1.0";

/// Orchestration type a snapshot was taken from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotType {
    Swarm,
    Workflow,
}

impl SnapshotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotType::Swarm => "swarm",
            SnapshotType::Workflow => "workflow",
        }
    }
}

/// Per-agent (or per-delegation-instance) snapshot entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub system_prompt: String,
    /// Conversation without system messages.
    pub conversation: Vec<Message>,
    pub context_state: ContextState,
}

/// Scratchpad section: flat entries for swarms, mode + data for workflows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScratchpadSection {
    Workflow {
        shared: bool,
        data: BTreeMap<String, ScratchpadEntry>,
    },
    Swarm(BTreeMap<String, ScratchpadEntry>),
}

/// The versioned snapshot document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: String,
    #[serde(rename = "type")]
    pub snapshot_type: SnapshotType,
    pub metadata: Map<String, Value>,
    pub agents: BTreeMap<String, AgentSnapshot>,
    pub delegation_instances: BTreeMap<String, AgentSnapshot>,
    pub scratchpad: ScratchpadSection,
    pub read_tracking: BTreeMap<String, BTreeMap<String, String>>,
    pub plugin_states: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Snapshot {
    /// Phase-one validation shared by both orchestration types.
    pub fn validate(&self, expected: SnapshotType) -> Result<(), StateError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(StateError::VersionMismatch(self.version.clone()));
        }
        if self.snapshot_type != expected {
            return Err(StateError::TypeMismatch {
                expected: expected.as_str(),
                found: self.snapshot_type.as_str(),
            });
        }
        Ok(())
    }
}

/// Snapshot validation failures. Raised only in restore phase one; partial
/// mismatches later surface as warnings instead.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("unsupported snapshot version {0:?} (expected {SNAPSHOT_VERSION:?})")]
    VersionMismatch(String),
    #[error("snapshot type {found:?} does not match orchestration type {expected:?}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("malformed snapshot: {0}")]
    Malformed(String),
}

/// One restore warning.
#[derive(Clone, Debug, PartialEq)]
pub enum RestoreWarning {
    /// A snapshot agent is absent from the current configuration.
    AgentNotFound { name: String },
    /// A delegation key references an agent pair no longer configured.
    DelegationNotFound { key: String },
    /// Workflow scratchpad mode differs; restored anyway.
    ScratchpadModeMismatch { snapshot_shared: bool, current_shared: bool },
}

impl RestoreWarning {
    /// Stable kind tag (`"agent_not_found"`, ...).
    pub fn kind(&self) -> &'static str {
        match self {
            RestoreWarning::AgentNotFound { .. } => "agent_not_found",
            RestoreWarning::DelegationNotFound { .. } => "delegation_not_found",
            RestoreWarning::ScratchpadModeMismatch { .. } => "scratchpad_mode_mismatch",
        }
    }
}

/// Options for restore.
#[derive(Clone, Copy, Debug, Default)]
pub struct RestoreOptions {
    /// Restore the historical system prompt instead of the current one.
    pub preserve_system_prompts: bool,
}

/// Outcome of a restore: warnings and skip lists, never a hard failure for
/// partial mismatches.
#[derive(Clone, Debug, Default)]
pub struct RestoreResult {
    pub warnings: Vec<RestoreWarning>,
    pub skipped_agents: Vec<String>,
    pub skipped_delegations: Vec<String>,
}

impl RestoreResult {
    /// Warnings of the given kind tag.
    pub fn warnings_of_kind(&self, kind: &str) -> Vec<&RestoreWarning> {
        self.warnings.iter().filter(|w| w.kind() == kind).collect()
    }
}

/// Splits a conversation into (system prompt, non-system messages) for
/// snapshot storage.
pub(crate) fn split_conversation(messages: Vec<Message>) -> (Option<String>, Vec<Message>) {
    let mut system = None;
    let mut rest = Vec::with_capacity(messages.len());
    for message in messages {
        if message.is_system() && system.is_none() {
            system = Some(message.content.as_text());
        } else if !message.is_system() {
            rest.push(message);
        }
    }
    (system, rest)
}

/// Rebuilds a full message list from a snapshot entry: exactly one system
/// message is prepended unless the effective prompt is absent.
pub(crate) fn rebuild_conversation(
    entry: &AgentSnapshot,
    current_system: Option<&str>,
    options: RestoreOptions,
) -> Vec<Message> {
    let prompt = if options.preserve_system_prompts {
        (!entry.system_prompt.is_empty()).then(|| entry.system_prompt.clone())
    } else {
        current_system.map(str::to_string)
    };
    let mut messages = Vec::with_capacity(entry.conversation.len() + 1);
    if let Some(prompt) = prompt {
        messages.push(Message::system(prompt));
    }
    messages.extend(entry.conversation.iter().filter(|m| !m.is_system()).cloned());
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> AgentSnapshot {
        AgentSnapshot {
            system_prompt: "historical prompt".to_string(),
            conversation: vec![Message::user("hi"), Message::assistant("hello")],
            context_state: ContextState::default(),
        }
    }

    #[test]
    fn validate_rejects_wrong_version_and_type() {
        let snapshot = Snapshot {
            version: "1.0.0".to_string(),
            snapshot_type: SnapshotType::Swarm,
            metadata: Map::new(),
            agents: BTreeMap::new(),
            delegation_instances: BTreeMap::new(),
            scratchpad: ScratchpadSection::Swarm(BTreeMap::new()),
            read_tracking: BTreeMap::new(),
            plugin_states: BTreeMap::new(),
        };
        assert!(matches!(
            snapshot.validate(SnapshotType::Swarm),
            Err(StateError::VersionMismatch(v)) if v == "1.0.0"
        ));

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION.to_string(),
            ..snapshot
        };
        assert!(matches!(
            snapshot.validate(SnapshotType::Workflow),
            Err(StateError::TypeMismatch { .. })
        ));
        assert!(snapshot.validate(SnapshotType::Swarm).is_ok());
    }

    #[test]
    fn rebuild_prepends_current_system_prompt_by_default() {
        let messages = rebuild_conversation(&entry(), Some("current prompt"), RestoreOptions::default());
        assert_eq!(messages.len(), 3);
        assert!(messages[0].is_system());
        assert_eq!(messages[0].content.as_text(), "current prompt");
    }

    #[test]
    fn rebuild_can_preserve_historical_prompt() {
        let messages = rebuild_conversation(
            &entry(),
            Some("current prompt"),
            RestoreOptions {
                preserve_system_prompts: true,
            },
        );
        assert_eq!(messages[0].content.as_text(), "historical prompt");
    }

    #[test]
    fn rebuild_without_prompt_has_no_system_message() {
        let mut e = entry();
        e.system_prompt.clear();
        let messages = rebuild_conversation(
            &e,
            None,
            RestoreOptions {
                preserve_system_prompts: true,
            },
        );
        assert!(!messages.iter().any(|m| m.is_system()));
        let messages = rebuild_conversation(&e, None, RestoreOptions::default());
        assert!(!messages.iter().any(|m| m.is_system()));
    }

    #[test]
    fn split_conversation_extracts_first_system() {
        let (system, rest) = split_conversation(vec![
            Message::system("prompt"),
            Message::user("a"),
            Message::assistant("b"),
        ]);
        assert_eq!(system.as_deref(), Some("prompt"));
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn snapshot_document_round_trips_through_json() {
        let mut agents = BTreeMap::new();
        agents.insert("a".to_string(), entry());
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION.to_string(),
            snapshot_type: SnapshotType::Workflow,
            metadata: Map::new(),
            agents,
            delegation_instances: BTreeMap::new(),
            scratchpad: ScratchpadSection::Workflow {
                shared: true,
                data: BTreeMap::new(),
            },
            read_tracking: BTreeMap::new(),
            plugin_states: BTreeMap::new(),
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["type"], "workflow");
        assert_eq!(json["scratchpad"]["shared"], true);
        let back: Snapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }
}
