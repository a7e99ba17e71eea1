//! Delegation: agents calling other agents as tools.
//!
//! When agent `A` has `delegates_to: [B]`, a synthetic tool named `B` is
//! installed in `A`'s tool set. Invoking it resolves (or lazily creates) the
//! chat instance keyed `"B@A"` — or `"B@*"` when `B` is shared across
//! delegations — forwards the prompt, and returns the child's final
//! assistant content as the tool result.
//!
//! Configuration-time checks reject self-edges; transitive cycles are
//! permitted at runtime because every delegation is an independent
//! conversation, and [`MAX_DELEGATION_DEPTH`] stops runaway recursion.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::agent::AgentDefinition;
use crate::chat::AgentChat;
use crate::swarm::SwarmCore;
use crate::tools::{Tool, ToolContext, ToolError, ToolOutcome, ToolSpec};

/// Depth cap for nested delegations. Exceeding it fails the delegating tool
/// call (a stringified error the caller's LLM observes), not the whole turn.
pub const MAX_DELEGATION_DEPTH: usize = 16;

/// Cache key for a delegation chat instance: `"<callee>@<caller>"`, or
/// `"<callee>@*"` for callees shared across delegations.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DelegationKey(String);

impl DelegationKey {
    pub fn scoped(callee: &str, caller: &str) -> Self {
        Self(format!("{callee}@{caller}"))
    }

    pub fn shared(callee: &str) -> Self {
        Self(format!("{callee}@*"))
    }

    /// The key for a call of `callee` by `caller`, honoring
    /// `shared_across_delegations`.
    pub fn for_call(callee: &AgentDefinition, caller: &str) -> Self {
        if callee.shared_across_delegations {
            Self::shared(&callee.name)
        } else {
            Self::scoped(&callee.name, caller)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The callee name (before the `@`).
    pub fn callee(&self) -> &str {
        self.0.split('@').next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for DelegationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DelegationKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Swarm-scoped cache of delegation chat instances. Entries are immutable
/// after insertion, so lookups are lock-free reads.
#[derive(Default)]
pub struct DelegationCache {
    entries: DashMap<DelegationKey, Arc<AgentChat>>,
}

impl DelegationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &DelegationKey) -> Option<Arc<AgentChat>> {
        self.entries.get(key).map(|e| Arc::clone(e.value()))
    }

    /// Returns the cached instance for `key`, inserting the one built by
    /// `build` on first use.
    pub fn get_or_insert_with(
        &self,
        key: DelegationKey,
        build: impl FnOnce() -> Arc<AgentChat>,
    ) -> Arc<AgentChat> {
        Arc::clone(self.entries.entry(key).or_insert_with(build).value())
    }

    /// Seeds an instance (workflow carry-over, restore).
    pub fn insert(&self, key: DelegationKey, chat: Arc<AgentChat>) {
        self.entries.insert(key, chat);
    }

    pub fn contains(&self, key: &DelegationKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Sorted cache keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().0.clone()).collect();
        keys.sort();
        keys
    }

    /// All entries, for snapshot capture and carry-over.
    pub fn entries(&self) -> Vec<(DelegationKey, Arc<AgentChat>)> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The synthetic tool installed for each delegation target.
pub struct DelegateTool {
    callee: Arc<AgentDefinition>,
    caller: String,
    swarm: Weak<SwarmCore>,
}

impl DelegateTool {
    pub fn new(callee: Arc<AgentDefinition>, caller: impl Into<String>, swarm: Weak<SwarmCore>) -> Self {
        Self {
            callee,
            caller: caller.into(),
            swarm,
        }
    }
}

#[async_trait]
impl Tool for DelegateTool {
    fn name(&self) -> &str {
        &self.callee.name
    }

    fn spec(&self) -> ToolSpec {
        let description = self.callee.description.clone().unwrap_or_else(|| {
            format!("Delegate a task to the {} agent.", self.callee.name)
        });
        ToolSpec::single_string_arg(
            &self.callee.name,
            description,
            "prompt",
            "The task or question for this agent. Provide full context; the agent does not see the current conversation.",
        )
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let prompt = args
            .get("prompt")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidInput("missing required argument: prompt".into()))?;

        let depth = ctx.delegation_depth + 1;
        if depth > MAX_DELEGATION_DEPTH {
            return Err(ToolError::Execution(format!(
                "delegation depth limit ({MAX_DELEGATION_DEPTH}) exceeded at {}",
                DelegationKey::for_call(&self.callee, &self.caller)
            )));
        }

        let swarm = self
            .swarm
            .upgrade()
            .ok_or_else(|| ToolError::Execution("swarm is no longer alive".into()))?;

        let chat = swarm
            .delegation_chat(&self.callee.name, &self.caller, depth)
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;

        let reply = chat
            .ask(prompt)
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;

        Ok(ToolOutcome::Text(reply.content.as_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_rendering_scoped_and_shared() {
        assert_eq!(DelegationKey::scoped("worker", "lead").as_str(), "worker@lead");
        assert_eq!(DelegationKey::shared("worker").as_str(), "worker@*");
        assert_eq!(DelegationKey::scoped("worker", "lead").callee(), "worker");
    }

    #[tokio::test]
    async fn depth_cap_fails_the_call_before_touching_the_swarm() {
        let callee = Arc::new(
            AgentDefinition::builder("worker")
                .directory(std::env::temp_dir())
                .build()
                .unwrap(),
        );
        let tool = DelegateTool::new(callee, "lead", Weak::new());
        let mut ctx = crate::tools::ToolContext::new("lead", std::env::temp_dir());
        ctx.delegation_depth = MAX_DELEGATION_DEPTH;

        let err = tool
            .call(serde_json::json!({"prompt": "go deeper"}), &ctx)
            .await
            .unwrap_err();
        assert!(err.into_result_text().contains("depth limit"));
    }

    #[test]
    fn for_call_honors_shared_flag() {
        let scoped = AgentDefinition::builder("worker")
            .directory(std::env::temp_dir())
            .build()
            .unwrap();
        assert_eq!(
            DelegationKey::for_call(&scoped, "lead").as_str(),
            "worker@lead"
        );

        let shared = AgentDefinition::builder("worker")
            .directory(std::env::temp_dir())
            .shared_across_delegations(true)
            .build()
            .unwrap();
        assert_eq!(DelegationKey::for_call(&shared, "lead").as_str(), "worker@*");
    }
}
