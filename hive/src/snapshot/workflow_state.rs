//! Snapshot capture and restore for [`Workflow`].
//!
//! Workflow snapshots capture the carried chat instances (agents configured
//! with `reset_context: false`), the scratchpad in its workflow shape
//! (`{shared, data}`), and read tracking. Restored conversations are held
//! pending and applied lazily as node swarms initialize the owning
//! instances.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

use serde_json::{Map, Value};

use crate::scratchpad::ScratchpadMode;
use crate::workflow::Workflow;

use super::{
    split_conversation, AgentSnapshot, RestoreOptions, RestoreResult, RestoreWarning,
    ScratchpadSection, Snapshot, SnapshotType, StateError, SNAPSHOT_VERSION,
};

impl Workflow {
    /// Captures carried instances, scratchpad, and read tracking.
    pub fn snapshot(&self) -> Snapshot {
        let mut agents = BTreeMap::new();
        let mut delegation_instances = BTreeMap::new();
        {
            let carried = self.carried.lock().unwrap_or_else(|e| e.into_inner());
            for (name, carry) in carried.iter() {
                let (system, conversation) = split_conversation(carry.primary.messages());
                agents.insert(
                    name.clone(),
                    AgentSnapshot {
                        system_prompt: system
                            .or_else(|| carry.primary.system_prompt().map(str::to_string))
                            .unwrap_or_default(),
                        conversation,
                        context_state: carry.primary.context_state(),
                    },
                );
                for (key, chat) in &carry.delegations {
                    let (system, conversation) = split_conversation(chat.messages());
                    delegation_instances.insert(
                        key.as_str().to_string(),
                        AgentSnapshot {
                            system_prompt: system
                                .or_else(|| chat.system_prompt().map(str::to_string))
                                .unwrap_or_default(),
                            conversation,
                            context_state: chat.context_state(),
                        },
                    );
                }
            }
        }

        let shared = self.scratchpad_mode == ScratchpadMode::Enabled;
        let mut metadata = Map::new();
        metadata.insert(
            "first_message_sent".to_string(),
            Value::Bool(self.executed.load(Ordering::SeqCst)),
        );

        Snapshot {
            version: SNAPSHOT_VERSION.to_string(),
            snapshot_type: SnapshotType::Workflow,
            metadata,
            agents,
            delegation_instances,
            scratchpad: ScratchpadSection::Workflow {
                shared,
                data: if shared {
                    self.shared_scratchpad.export()
                } else {
                    BTreeMap::new()
                },
            },
            read_tracking: self.read_tracker.export(),
            plugin_states: BTreeMap::new(),
        }
    }

    /// Three-phase restore. Conversations for restorable agents are queued
    /// and applied when their instances come up during node execution; a
    /// scratchpad mode mismatch warns and restores anyway.
    pub fn restore(
        &self,
        snapshot: &Snapshot,
        options: RestoreOptions,
    ) -> Result<RestoreResult, StateError> {
        snapshot.validate(SnapshotType::Workflow)?;
        let mut result = RestoreResult::default();

        {
            let mut pending = self
                .pending_restore
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            pending.options = options;

            for (name, entry) in &snapshot.agents {
                if !self.definitions.contains_key(name) {
                    result
                        .warnings
                        .push(RestoreWarning::AgentNotFound { name: name.clone() });
                    result.skipped_agents.push(name.clone());
                    continue;
                }
                pending.agents.insert(name.clone(), entry.clone());
            }

            for (key, entry) in &snapshot.delegation_instances {
                let known = key
                    .split_once('@')
                    .map(|(callee, caller)| {
                        self.definitions.contains_key(callee)
                            && (caller == "*" || self.definitions.contains_key(caller))
                    })
                    .unwrap_or(false);
                if !known {
                    result
                        .warnings
                        .push(RestoreWarning::DelegationNotFound { key: key.clone() });
                    result.skipped_delegations.push(key.clone());
                    continue;
                }
                pending.delegations.insert(key.clone(), entry.clone());
            }
        }

        match &snapshot.scratchpad {
            ScratchpadSection::Workflow { shared, data } => {
                let current_shared = self.scratchpad_mode == ScratchpadMode::Enabled;
                if *shared != current_shared {
                    // Mode mismatch warns and restores anyway.
                    result.warnings.push(RestoreWarning::ScratchpadModeMismatch {
                        snapshot_shared: *shared,
                        current_shared,
                    });
                }
                self.shared_scratchpad.import(data.clone());
            }
            ScratchpadSection::Swarm(_) => {
                return Err(StateError::Malformed(
                    "workflow snapshot carries a swarm scratchpad section".to_string(),
                ));
            }
        }
        self.read_tracker.import(snapshot.read_tracking.clone());

        if let Some(sent) = snapshot
            .metadata
            .get("first_message_sent")
            .and_then(|v| v.as_bool())
        {
            self.executed.store(sent, Ordering::SeqCst);
        }

        Ok(result)
    }
}
