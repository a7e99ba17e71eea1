//! Snapshot capture and restore for [`Swarm`].

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

use serde_json::{Map, Value};

use crate::swarm::Swarm;

use super::{
    rebuild_conversation, split_conversation, AgentSnapshot, RestoreOptions, RestoreResult,
    RestoreWarning, ScratchpadSection, Snapshot, SnapshotType, StateError, SNAPSHOT_VERSION,
};

impl Swarm {
    /// Captures all caches — initialized agent chats, delegation instances,
    /// scratchpad, read tracking, plugin state — into one document.
    pub fn snapshot(&self) -> Snapshot {
        let core = &self.core;

        let mut agents = BTreeMap::new();
        for (name, chat) in core.cached_primaries() {
            let (system, conversation) = split_conversation(chat.messages());
            agents.insert(
                name,
                AgentSnapshot {
                    system_prompt: system
                        .or_else(|| chat.system_prompt().map(str::to_string))
                        .unwrap_or_default(),
                    conversation,
                    context_state: chat.context_state(),
                },
            );
        }

        let mut delegation_instances = BTreeMap::new();
        for (key, chat) in core.delegation_cache.entries() {
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

        let mut plugin_states = BTreeMap::new();
        for plugin in core.plugins() {
            let mut per_agent = BTreeMap::new();
            for name in core.definitions.keys() {
                if let Some(state) = plugin.snapshot_state(name) {
                    per_agent.insert(name.clone(), state);
                }
            }
            if !per_agent.is_empty() {
                plugin_states.insert(plugin.name().to_string(), per_agent);
            }
        }

        let mut metadata = Map::new();
        metadata.insert(
            "first_message_sent".to_string(),
            Value::Bool(core.first_message_sent.load(Ordering::SeqCst)),
        );

        Snapshot {
            version: SNAPSHOT_VERSION.to_string(),
            snapshot_type: SnapshotType::Swarm,
            metadata,
            agents,
            delegation_instances,
            scratchpad: ScratchpadSection::Swarm(core.scratchpad.export()),
            read_tracking: core.read_tracker.export(),
            plugin_states,
        }
    }

    /// Three-phase restore. Missing agents and delegation pairs become
    /// warnings and skip entries; only version/type mismatches (and a
    /// structurally unusable document) fail.
    pub async fn restore(
        &self,
        snapshot: &Snapshot,
        options: RestoreOptions,
    ) -> Result<RestoreResult, StateError> {
        snapshot.validate(SnapshotType::Swarm)?;
        let core = &self.core;
        let mut result = RestoreResult::default();

        for (name, entry) in &snapshot.agents {
            if !core.definitions.contains_key(name) {
                result
                    .warnings
                    .push(RestoreWarning::AgentNotFound { name: name.clone() });
                result.skipped_agents.push(name.clone());
                continue;
            }
            let chat = core
                .primary_chat(name)
                .await
                .map_err(|e| StateError::Malformed(e.to_string()))?;
            chat.replace_messages(rebuild_conversation(entry, chat.system_prompt(), options));
            chat.restore_context_state(entry.context_state.clone());
        }

        for (key, entry) in &snapshot.delegation_instances {
            let Some((callee, caller)) = key.split_once('@') else {
                result
                    .warnings
                    .push(RestoreWarning::DelegationNotFound { key: key.clone() });
                result.skipped_delegations.push(key.clone());
                continue;
            };
            let callee_known = core.definitions.contains_key(callee);
            let caller_known = caller == "*" || core.definitions.contains_key(caller);
            if !callee_known || !caller_known {
                result
                    .warnings
                    .push(RestoreWarning::DelegationNotFound { key: key.clone() });
                result.skipped_delegations.push(key.clone());
                continue;
            }
            let chat = core
                .delegation_chat(callee, caller, 1)
                .await
                .map_err(|e| StateError::Malformed(e.to_string()))?;
            chat.replace_messages(rebuild_conversation(entry, chat.system_prompt(), options));
            chat.restore_context_state(entry.context_state.clone());
        }

        match &snapshot.scratchpad {
            ScratchpadSection::Swarm(data) => core.scratchpad.import(data.clone()),
            ScratchpadSection::Workflow { .. } => {
                return Err(StateError::Malformed(
                    "swarm snapshot carries a workflow scratchpad section".to_string(),
                ));
            }
        }
        core.read_tracker.import(snapshot.read_tracking.clone());

        for plugin in core.plugins() {
            if let Some(per_agent) = snapshot.plugin_states.get(plugin.name()) {
                for (agent, state) in per_agent {
                    plugin.restore_state(agent, state);
                }
            }
        }

        if let Some(sent) = snapshot
            .metadata
            .get("first_message_sent")
            .and_then(|v| v.as_bool())
        {
            core.first_message_sent.store(sent, Ordering::SeqCst);
        }

        Ok(result)
    }
}
