//! MCP (Model Context Protocol) client contract and tool adapter.
//!
//! Transports live outside the core. The core consumes a connected
//! [`McpClient`] and treats it as a tool factory: each discovered tool
//! becomes an [`McpToolAdapter`] in the owning agent's tool set. An
//! individual MCP tool failure surfaces as that tool's stringified result;
//! sibling tools and the rest of the turn proceed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::{Tool, ToolContext, ToolError, ToolOutcome, ToolSpec};

/// Transport used to reach an MCP server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum McpTransport {
    /// Spawned subprocess speaking JSON-RPC over stdio.
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// Server-sent events endpoint.
    Sse { url: String },
    /// Plain HTTP endpoint.
    Http { url: String },
}

/// One MCP server entry in an agent definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub name: String,
    #[serde(flatten)]
    pub transport: McpTransport,
}

/// MCP failures. Scoped to the failing tool call or client; never fatal to
/// the turn.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("mcp timeout: {0}")]
    Timeout(String),
    #[error("mcp transport: {0}")]
    Transport(String),
    #[error("mcp protocol: {0}")]
    Protocol(String),
}

impl McpError {
    fn into_tool_error(self) -> ToolError {
        match self {
            McpError::Timeout(msg) => ToolError::Transport(format!("mcp timeout: {msg}")),
            McpError::Transport(msg) => ToolError::Transport(msg),
            McpError::Protocol(msg) => ToolError::Execution(msg),
        }
    }
}

/// A connected MCP server, as the core consumes it.
#[async_trait]
pub trait McpClient: Send + Sync {
    /// Tool specs offered by the server.
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, McpError>;

    /// Invokes one server-side tool.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, McpError>;

    /// Shuts the client down. Called from swarm cleanup; must be idempotent.
    async fn stop(&self) -> Result<(), McpError>;
}

/// Default budget for one MCP tool call.
pub const MCP_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Adapts one discovered MCP tool to the [`Tool`] contract.
pub struct McpToolAdapter {
    client: Arc<dyn McpClient>,
    spec: ToolSpec,
    timeout: Duration,
}

impl McpToolAdapter {
    pub fn new(client: Arc<dyn McpClient>, spec: ToolSpec) -> Self {
        Self {
            client,
            spec,
            timeout: MCP_CALL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Tool for McpToolAdapter {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn spec(&self) -> ToolSpec {
        self.spec.clone()
    }

    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let call = self.client.call_tool(&self.spec.name, args);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => match value {
                Value::String(text) => Ok(ToolOutcome::Text(text)),
                other => Ok(ToolOutcome::Structured(other)),
            },
            Ok(Err(err)) => Err(err.into_tool_error()),
            Err(_) => Err(ToolError::Timeout(self.timeout.as_secs())),
        }
    }
}

/// Discovers the server's tools and wraps each as a [`Tool`].
pub async fn discover_tools(client: Arc<dyn McpClient>) -> Result<Vec<Arc<dyn Tool>>, McpError> {
    let specs = client.list_tools().await?;
    Ok(specs
        .into_iter()
        .map(|spec| Arc::new(McpToolAdapter::new(Arc::clone(&client), spec)) as Arc<dyn Tool>)
        .collect())
}
