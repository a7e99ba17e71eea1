//! Hook dispatcher: pre/post-tool, prompt, stop, and lifecycle interceptors.
//!
//! Hooks are declared per agent (or per swarm) and fire FIFO per event. A
//! handler is either *callable* (an in-process closure returning a
//! [`HookAction`]) or *shell* (a command receiving a JSON document on stdin;
//! see [`shell`] for the exit-code protocol). Hook failures never fail the
//! turn: anything other than an explicit halt logs and continues.

mod shell;

pub use shell::{run_shell_hook, SHELL_HOOK_DEFAULT_TIMEOUT};

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// Hook event kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEvent {
    PreToolUse,
    PostToolUse,
    UserPrompt,
    AgentStop,
    SessionStart,
    ContextWarning,
    SwarmStart,
    SwarmStop,
}

impl HookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::PreToolUse => "pre_tool_use",
            HookEvent::PostToolUse => "post_tool_use",
            HookEvent::UserPrompt => "user_prompt",
            HookEvent::AgentStop => "agent_stop",
            HookEvent::SessionStart => "session_start",
            HookEvent::ContextWarning => "context_warning",
            HookEvent::SwarmStart => "swarm_start",
            HookEvent::SwarmStop => "swarm_stop",
        }
    }

    /// Events where shell stdout replaces the content on exit 0.
    pub fn stdout_replaces(&self) -> bool {
        matches!(self, HookEvent::UserPrompt | HookEvent::SessionStart)
    }
}

/// What a hook decided.
#[derive(Clone, Debug, PartialEq)]
pub enum HookAction {
    /// Proceed unchanged.
    Continue,
    /// Stop the surrounding operation; the message is surfaced to the caller.
    Halt(String),
    /// Proceed with the given replacement content (prompt, tool result, ...).
    Replace(String),
}

type CallableHook = Arc<dyn Fn(&Value) -> HookAction + Send + Sync>;

/// Handler kind: in-process callable or shell command.
#[derive(Clone)]
pub enum HookHandler {
    Callable(CallableHook),
    Shell {
        command: String,
        timeout: Duration,
    },
}

/// One configured hook: event, optional tool-name matcher, handler.
#[derive(Clone)]
pub struct HookDefinition {
    pub event: HookEvent,
    /// Matched against the tool name for pre/post tool events; other events
    /// ignore it.
    pub matcher: Option<Regex>,
    pub handler: HookHandler,
}

impl std::fmt::Debug for HookDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookDefinition")
            .field("event", &self.event)
            .field("matcher", &self.matcher.as_ref().map(|m| m.as_str()))
            .finish_non_exhaustive()
    }
}

impl HookDefinition {
    pub fn callable(
        event: HookEvent,
        handler: impl Fn(&Value) -> HookAction + Send + Sync + 'static,
    ) -> Self {
        Self {
            event,
            matcher: None,
            handler: HookHandler::Callable(Arc::new(handler)),
        }
    }

    pub fn shell(event: HookEvent, command: impl Into<String>) -> Self {
        Self {
            event,
            matcher: None,
            handler: HookHandler::Shell {
                command: command.into(),
                timeout: SHELL_HOOK_DEFAULT_TIMEOUT,
            },
        }
    }

    /// Restricts a tool hook to tool names matching `pattern`.
    pub fn with_matcher(mut self, pattern: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|source| ConfigError::InvalidMatcher {
            pattern: pattern.to_string(),
            source,
        })?;
        self.matcher = Some(regex);
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if let HookHandler::Shell { timeout: t, .. } = &mut self.handler {
            *t = timeout;
        }
        self
    }
}

/// Identity fields passed to shell hooks via the environment.
#[derive(Clone, Debug, Default)]
pub struct HookEnvironment {
    pub project_dir: std::path::PathBuf,
    pub agent_name: String,
    pub swarm_name: String,
}

/// Dispatches hooks for one agent. Handlers fire FIFO per event; the running
/// content (prompt, tool result) threads through `Replace` outcomes; the
/// first `Halt` wins.
#[derive(Clone, Default)]
pub struct HookDispatcher {
    hooks: Vec<HookDefinition>,
    environment: HookEnvironment,
}

impl HookDispatcher {
    pub fn new(hooks: Vec<HookDefinition>, environment: HookEnvironment) -> Self {
        Self { hooks, environment }
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Runs every hook registered for `event` in registration order.
    ///
    /// `tool_name` is matched against each hook's matcher for tool events.
    /// `payload` is the event document handed to handlers (shell handlers
    /// receive it on stdin with `event`, `agent`, and `swarm` merged in).
    ///
    /// Returns `Continue` when nothing intervened, `Replace(content)` with the
    /// final content when at least one hook replaced it, or the first `Halt`.
    pub async fn dispatch(
        &self,
        event: HookEvent,
        tool_name: Option<&str>,
        payload: &Value,
    ) -> HookAction {
        let mut replaced: Option<String> = None;
        for hook in self.hooks.iter().filter(|h| h.event == event) {
            if let (Some(matcher), Some(name)) = (&hook.matcher, tool_name) {
                if !matcher.is_match(name) {
                    continue;
                }
            }
            let document = self.build_document(event, tool_name, payload, replaced.as_deref());
            let action = match &hook.handler {
                HookHandler::Callable(f) => f(&document),
                HookHandler::Shell { command, timeout } => {
                    run_shell_hook(command, *timeout, event, &document, &self.environment).await
                }
            };
            match action {
                HookAction::Continue => {}
                HookAction::Replace(content) => replaced = Some(content),
                HookAction::Halt(message) => return HookAction::Halt(message),
            }
        }
        match replaced {
            Some(content) => HookAction::Replace(content),
            None => HookAction::Continue,
        }
    }

    fn build_document(
        &self,
        event: HookEvent,
        tool_name: Option<&str>,
        payload: &Value,
        replaced: Option<&str>,
    ) -> Value {
        let mut document = serde_json::json!({
            "event": event.as_str(),
            "agent": self.environment.agent_name,
            "swarm": self.environment.swarm_name,
        });
        if let Some(obj) = document.as_object_mut() {
            if let Some(name) = tool_name {
                obj.insert("tool".into(), Value::String(name.into()));
            }
            if let Some(fields) = payload.as_object() {
                for (k, v) in fields {
                    obj.insert(k.clone(), v.clone());
                }
            }
            // Later hooks in the chain see the content as replaced so far.
            if let Some(content) = replaced {
                obj.insert("content".into(), Value::String(content.into()));
            }
        }
        document
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dispatcher(hooks: Vec<HookDefinition>) -> HookDispatcher {
        HookDispatcher::new(
            hooks,
            HookEnvironment {
                project_dir: std::env::temp_dir(),
                agent_name: "lead".into(),
                swarm_name: "team".into(),
            },
        )
    }

    #[tokio::test]
    async fn hooks_fire_fifo_and_replacement_threads_through() {
        let hooks = vec![
            HookDefinition::callable(HookEvent::UserPrompt, |_| {
                HookAction::Replace("first".into())
            }),
            HookDefinition::callable(HookEvent::UserPrompt, |doc| {
                assert_eq!(doc["content"], "first");
                HookAction::Replace(format!("{} then second", doc["content"].as_str().unwrap()))
            }),
        ];
        let action = dispatcher(hooks)
            .dispatch(HookEvent::UserPrompt, None, &json!({"prompt": "原"}))
            .await;
        assert_eq!(action, HookAction::Replace("first then second".into()));
    }

    #[tokio::test]
    async fn first_halt_wins() {
        let hooks = vec![
            HookDefinition::callable(HookEvent::PreToolUse, |_| {
                HookAction::Halt("not allowed".into())
            }),
            HookDefinition::callable(HookEvent::PreToolUse, |_| {
                panic!("must not run after halt")
            }),
        ];
        let action = dispatcher(hooks)
            .dispatch(HookEvent::PreToolUse, Some("bash"), &json!({}))
            .await;
        assert_eq!(action, HookAction::Halt("not allowed".into()));
    }

    #[tokio::test]
    async fn matcher_filters_tool_events() {
        let hooks = vec![HookDefinition::callable(HookEvent::PreToolUse, |_| {
            HookAction::Halt("bash is blocked".into())
        })
        .with_matcher("^bash$")
        .unwrap()];
        let dispatcher = dispatcher(hooks);

        let allowed = dispatcher
            .dispatch(HookEvent::PreToolUse, Some("read_file"), &json!({}))
            .await;
        assert_eq!(allowed, HookAction::Continue);

        let blocked = dispatcher
            .dispatch(HookEvent::PreToolUse, Some("bash"), &json!({}))
            .await;
        assert!(matches!(blocked, HookAction::Halt(_)));
    }

    #[tokio::test]
    async fn document_carries_identity_and_payload() {
        let hooks = vec![HookDefinition::callable(HookEvent::PostToolUse, |doc| {
            assert_eq!(doc["event"], "post_tool_use");
            assert_eq!(doc["agent"], "lead");
            assert_eq!(doc["swarm"], "team");
            assert_eq!(doc["tool"], "bash");
            assert_eq!(doc["parameters"]["command"], "ls");
            HookAction::Continue
        })];
        let action = dispatcher(hooks)
            .dispatch(
                HookEvent::PostToolUse,
                Some("bash"),
                &json!({"parameters": {"command": "ls"}}),
            )
            .await;
        assert_eq!(action, HookAction::Continue);
    }

    #[test]
    fn invalid_matcher_is_a_config_error() {
        let err = HookDefinition::shell(HookEvent::PreToolUse, "true")
            .with_matcher("(unclosed")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMatcher { .. }));
    }
}
