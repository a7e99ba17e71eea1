use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ToolContext, ToolError};

/// Tool specification sent to the LLM: name, description, and the JSON
/// schema its arguments are validated against.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
}

impl ToolSpec {
    /// A spec taking a single required string argument.
    pub fn single_string_arg(
        name: impl Into<String>,
        description: impl Into<String>,
        arg: &str,
        arg_description: &str,
    ) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    arg: { "type": "string", "description": arg_description }
                },
                "required": [arg]
            }),
        }
    }
}

/// What a tool call produced.
///
/// `Halt` is the halt sentinel: it terminates the calling agent's turn and
/// its payload becomes the assistant's reply. Modeled as a variant rather
/// than an error so there is no hidden nonlocal exit.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutcome {
    Text(String),
    Structured(Value),
    Halt(String),
}

impl ToolOutcome {
    /// The result text appended to history.
    pub fn as_text(&self) -> String {
        match self {
            ToolOutcome::Text(s) | ToolOutcome::Halt(s) => s.clone(),
            ToolOutcome::Structured(v) => v.to_string(),
        }
    }

    pub fn is_halt(&self) -> bool {
        matches!(self, ToolOutcome::Halt(_))
    }
}

/// A single tool callable by the LLM.
///
/// Each tool has a unique case-sensitive name, a [`ToolSpec`], and the call
/// logic. Tools are produced by factories registered in
/// [`ToolRegistry`](super::ToolRegistry); the chat engine executes them with
/// a per-call [`ToolContext`].
///
/// # Errors
///
/// `call` returns [`ToolError`] for invalid arguments, execution failures,
/// blocked commands, and missing prior reads. The engine never lets these
/// escape the tool boundary: they are stringified into the tool-result
/// message so sibling calls proceed and the LLM can react.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name, as the LLM addresses it.
    fn name(&self) -> &str;

    /// The specification advertised to the LLM.
    fn spec(&self) -> ToolSpec;

    /// Executes the tool with validated arguments and the per-call context.
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError>;
}

impl std::fmt::Debug for dyn Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool").field("name", &self.name()).finish()
    }
}
