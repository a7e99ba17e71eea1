//! Scratchpad tools: write, read, and list inter-agent notes.
//!
//! These are the built-in tools over the swarm scratchpad. Their factories
//! declare the `agent_name` and `scratchpad_storage` requirements, so an
//! agent only gets them when the swarm exposes a scratchpad (workflows in
//! `disabled` mode do not).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ConfigError;
use crate::scratchpad::Scratchpad;

use super::{Tool, ToolContext, ToolError, ToolOutcome, ToolRegistry, ToolRequirement, ToolSpec};

pub const TOOL_SCRATCHPAD_WRITE: &str = "scratchpad_write";
pub const TOOL_SCRATCHPAD_READ: &str = "scratchpad_read";
pub const TOOL_SCRATCHPAD_LIST: &str = "scratchpad_list";

struct ScratchpadWriteTool {
    agent: String,
    scratchpad: Arc<Scratchpad>,
}

#[async_trait]
impl Tool for ScratchpadWriteTool {
    fn name(&self) -> &str {
        TOOL_SCRATCHPAD_WRITE
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_SCRATCHPAD_WRITE.to_string(),
            description: Some(
                "Store a note other agents can read. Overwrites any existing note under the same key."
                    .to_string(),
            ),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "key": { "type": "string", "description": "Note key" },
                    "value": { "description": "Note content (any JSON value)" }
                },
                "required": ["key", "value"]
            }),
        }
    }

    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let key = args
            .get("key")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidInput("missing required argument: key".into()))?;
        let value = args
            .get("value")
            .cloned()
            .ok_or_else(|| ToolError::InvalidInput("missing required argument: value".into()))?;
        self.scratchpad.write(key, value, self.agent.clone());
        Ok(ToolOutcome::Text(format!("stored {key}")))
    }
}

struct ScratchpadReadTool {
    scratchpad: Arc<Scratchpad>,
}

#[async_trait]
impl Tool for ScratchpadReadTool {
    fn name(&self) -> &str {
        TOOL_SCRATCHPAD_READ
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::single_string_arg(
            TOOL_SCRATCHPAD_READ,
            "Read a note stored by any agent.",
            "key",
            "Note key",
        )
    }

    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let key = args
            .get("key")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidInput("missing required argument: key".into()))?;
        match self.scratchpad.entry(key) {
            Some(entry) => Ok(ToolOutcome::Structured(serde_json::json!({
                "key": key,
                "value": entry.value,
                "agent": entry.agent,
                "ts": entry.ts,
            }))),
            None => Ok(ToolOutcome::Text(format!("no note stored under {key}"))),
        }
    }
}

struct ScratchpadListTool {
    scratchpad: Arc<Scratchpad>,
}

#[async_trait]
impl Tool for ScratchpadListTool {
    fn name(&self) -> &str {
        TOOL_SCRATCHPAD_LIST
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_SCRATCHPAD_LIST.to_string(),
            description: Some("List the keys of all stored notes.".to_string()),
            input_schema: serde_json::json!({ "type": "object", "properties": {} }),
        }
    }

    async fn call(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        Ok(ToolOutcome::Structured(Value::from(self.scratchpad.keys())))
    }
}

/// Registers the three scratchpad tools. Both factories fail fast when the
/// instantiating chat has no scratchpad storage.
pub fn register_scratchpad_tools(registry: &mut ToolRegistry) -> Result<(), ConfigError> {
    registry.register(
        TOOL_SCRATCHPAD_WRITE,
        vec![ToolRequirement::AgentName, ToolRequirement::ScratchpadStorage],
        |ctx| {
            Ok(Arc::new(ScratchpadWriteTool {
                agent: ctx.agent_name.clone().unwrap_or_default(),
                scratchpad: ctx
                    .scratchpad
                    .clone()
                    .ok_or(ConfigError::MissingToolRequirement {
                        tool: TOOL_SCRATCHPAD_WRITE.to_string(),
                        requirement: "scratchpad_storage",
                    })?,
            }) as Arc<dyn Tool>)
        },
    )?;
    registry.register(
        TOOL_SCRATCHPAD_READ,
        vec![ToolRequirement::ScratchpadStorage],
        |ctx| {
            Ok(Arc::new(ScratchpadReadTool {
                scratchpad: ctx
                    .scratchpad
                    .clone()
                    .ok_or(ConfigError::MissingToolRequirement {
                        tool: TOOL_SCRATCHPAD_READ.to_string(),
                        requirement: "scratchpad_storage",
                    })?,
            }) as Arc<dyn Tool>)
        },
    )?;
    registry.register(
        TOOL_SCRATCHPAD_LIST,
        vec![ToolRequirement::ScratchpadStorage],
        |ctx| {
            Ok(Arc::new(ScratchpadListTool {
                scratchpad: ctx
                    .scratchpad
                    .clone()
                    .ok_or(ConfigError::MissingToolRequirement {
                        tool: TOOL_SCRATCHPAD_LIST.to_string(),
                        requirement: "scratchpad_storage",
                    })?,
            }) as Arc<dyn Tool>)
        },
    )?;
    Ok(())
}
