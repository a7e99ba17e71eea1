//! Orchestration event types (type + payload).
//! Message- and tool-carrying variants use `serde_json::Value` for structured
//! payloads; hive serializes its own types into that.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One orchestration event: wire shape is `type` + payload fields.
/// The envelope (execution_id, scope, event_id) is applied separately.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    SwarmStart {
        swarm: String,
        prompt: String,
    },
    SwarmStop {
        swarm: String,
        content: String,
    },
    SwarmError {
        swarm: String,
        error: String,
    },
    NodeStart {
        node: String,
    },
    NodeStop {
        node: String,
    },
    /// A message slot was opened for `agent` (assistant turn or tool result).
    NewMessage {
        agent: String,
        role: String,
    },
    /// A message for `agent` is complete and appended to history.
    EndMessage {
        agent: String,
        role: String,
        content: String,
    },
    ToolCall {
        agent: String,
        tool: String,
        call_id: String,
        arguments: Value,
    },
    ToolResult {
        agent: String,
        tool: String,
        call_id: String,
        result: String,
    },
    ContextWarning {
        agent: String,
        threshold: u8,
        remaining_tokens: u64,
    },
    AgentStop {
        agent: String,
        content: String,
    },
    UserPrompt {
        agent: String,
        prompt: String,
    },
    SessionStart {
        swarm: String,
    },
    ObserverAgentError {
        observer: String,
        error: String,
    },
    Custom {
        value: Value,
    },
}

impl LogEvent {
    /// Serializes this event to a JSON object (type + payload only; no envelope).
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// The agent this event is attributed to, when the variant carries one.
    ///
    /// Observer managers use this for the self-consumption guard: an observer
    /// never reacts to events produced by its own agent.
    pub fn agent(&self) -> Option<&str> {
        match self {
            LogEvent::NewMessage { agent, .. }
            | LogEvent::EndMessage { agent, .. }
            | LogEvent::ToolCall { agent, .. }
            | LogEvent::ToolResult { agent, .. }
            | LogEvent::ContextWarning { agent, .. }
            | LogEvent::AgentStop { agent, .. }
            | LogEvent::UserPrompt { agent, .. } => Some(agent),
            _ => None,
        }
    }

    /// The `type` tag this event serializes under (e.g. `"tool_call"`).
    pub fn type_tag(&self) -> &'static str {
        match self {
            LogEvent::SwarmStart { .. } => "swarm_start",
            LogEvent::SwarmStop { .. } => "swarm_stop",
            LogEvent::SwarmError { .. } => "swarm_error",
            LogEvent::NodeStart { .. } => "node_start",
            LogEvent::NodeStop { .. } => "node_stop",
            LogEvent::NewMessage { .. } => "new_message",
            LogEvent::EndMessage { .. } => "end_message",
            LogEvent::ToolCall { .. } => "tool_call",
            LogEvent::ToolResult { .. } => "tool_result",
            LogEvent::ContextWarning { .. } => "context_warning",
            LogEvent::AgentStop { .. } => "agent_stop",
            LogEvent::UserPrompt { .. } => "user_prompt",
            LogEvent::SessionStart { .. } => "session_start",
            LogEvent::ObserverAgentError { .. } => "observer_agent_error",
            LogEvent::Custom { .. } => "custom",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_snake_case_type_tag() {
        let ev = LogEvent::ToolCall {
            agent: "lead".into(),
            tool: "worker".into(),
            call_id: "call-1".into(),
            arguments: serde_json::json!({"prompt": "hi"}),
        };
        let v = ev.to_value().unwrap();
        assert_eq!(v["type"], "tool_call");
        assert_eq!(v["agent"], "lead");
        assert_eq!(v["arguments"]["prompt"], "hi");
    }

    #[test]
    fn agent_accessor_covers_attributed_variants() {
        let ev = LogEvent::EndMessage {
            agent: "worker".into(),
            role: "assistant".into(),
            content: "done".into(),
        };
        assert_eq!(ev.agent(), Some("worker"));
        let ev = LogEvent::NodeStart { node: "plan".into() };
        assert_eq!(ev.agent(), None);
    }

    #[test]
    fn type_tag_matches_serde_tag() {
        let events = [
            LogEvent::SwarmStart {
                swarm: "s".into(),
                prompt: "p".into(),
            },
            LogEvent::ContextWarning {
                agent: "a".into(),
                threshold: 80,
                remaining_tokens: 1000,
            },
            LogEvent::ObserverAgentError {
                observer: "o".into(),
                error: "e".into(),
            },
        ];
        for ev in events {
            let v = ev.to_value().unwrap();
            assert_eq!(v["type"], ev.type_tag());
        }
    }
}
