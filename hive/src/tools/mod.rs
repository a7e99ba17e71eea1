//! Tool system: trait, registry, per-call context, and enforcement shims.
//!
//! Tool *bodies* (filesystem, search, bash) live outside the core; this
//! module defines the [`Tool`] contract the chat engine executes, the
//! [`ToolRegistry`] mapping names to factories with declared context
//! requirements, and the two enforcement shims every conforming tool body
//! must route through: [`bash_guard`] (blocked-command rejection) and the
//! read-before-edit check on [`crate::read_tracker::ReadTracker`].

pub mod bash_guard;
mod context;
mod registry;
mod scratchpad_tools;
mod r#trait;

pub use context::ToolContext;
pub use registry::{ToolBuildContext, ToolRegistry, ToolRequirement};
pub use scratchpad_tools::{
    register_scratchpad_tools, TOOL_SCRATCHPAD_LIST, TOOL_SCRATCHPAD_READ, TOOL_SCRATCHPAD_WRITE,
};
pub use r#trait::{Tool, ToolOutcome, ToolSpec};

/// Tool failures. Never propagated past the tool boundary: the chat engine
/// stringifies them via [`ToolError::into_result_text`] so the LLM can
/// observe and react.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Execution(String),
    #[error("{0}")]
    Blocked(String),
    #[error("{0}")]
    ReadRequired(String),
    #[error("{0}")]
    Transport(String),
    #[error("timed out after {0} seconds")]
    Timeout(u64),
}

impl ToolError {
    /// Short kind tag used in stringified results.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::InvalidInput(_) => "InvalidInput",
            ToolError::Execution(_) => "ExecutionError",
            ToolError::Blocked(_) => "BlockedCommand",
            ToolError::ReadRequired(_) => "ReadRequired",
            ToolError::Transport(_) => "TransportError",
            ToolError::Timeout(_) => "Timeout",
        }
    }

    /// The `Error: <kind>: <message>` text appended to history in place of a
    /// tool result.
    pub fn into_result_text(self) -> String {
        format!("Error: {}: {}", self.kind(), self)
    }
}
