//! Plugin interface: runtime-injected tools and system-prompt fragments.
//!
//! Plugins (e.g. a memory plugin) contribute tools and prompt fragments per
//! agent. The swarm composes tool lists and prompt contributions at chat
//! construction time; plugin state participates in snapshot/restore as an
//! opaque JSON blob per (plugin, agent).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::AgentDefinition;
use crate::tools::Tool;

/// A plugin contributing tools, prompt fragments, and snapshot state.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique plugin name; keys the `plugin_states` snapshot section.
    fn name(&self) -> &str;

    /// Tools injected into the given agent's tool set. Called once per chat
    /// construction.
    fn tools(&self, agent: &AgentDefinition) -> Vec<Arc<dyn Tool>>;

    /// Whether the plugin keeps per-agent storage for this agent.
    fn storage_enabled(&self, agent: &AgentDefinition) -> bool {
        let _ = agent;
        false
    }

    /// Fragment appended to the agent's system prompt, if any.
    fn system_prompt_contribution(&self, agent: &AgentDefinition) -> Option<String> {
        let _ = agent;
        None
    }

    /// Opaque per-agent state captured into snapshots.
    fn snapshot_state(&self, agent: &str) -> Option<Value> {
        let _ = agent;
        None
    }

    /// Rehydrates per-agent state from a snapshot. Unknown shapes should be
    /// ignored, not fail.
    fn restore_state(&self, agent: &str, state: &Value) {
        let _ = (agent, state);
    }
}
