//! Per-call context handed to tools.
//!
//! The chat engine builds one [`ToolContext`] per agent and passes it to
//! every `Tool::call`. Shared state (scratchpad, read tracker) is referenced
//! by `Arc` handle into swarm-owned tables, so tools never own a piece of the
//! swarm.

use std::path::PathBuf;
use std::sync::Arc;

use crate::logstream::LogStream;
use crate::read_tracker::ReadTracker;
use crate::scratchpad::Scratchpad;

/// Context available to a tool during execution.
#[derive(Clone, Default)]
pub struct ToolContext {
    /// Name of the agent making the call.
    pub agent_name: String,
    /// The agent's working directory; relative tool paths resolve against it.
    pub directory: PathBuf,
    /// Swarm scratchpad, when the tool's factory declared the requirement.
    pub scratchpad: Option<Arc<Scratchpad>>,
    /// The calling agent's read tracker (read-before-edit enforcement).
    pub read_tracker: Option<Arc<ReadTracker>>,
    /// Event stream for tools that emit progress events.
    pub stream: Option<Arc<LogStream>>,
    /// Delegation nesting depth of the calling chat; the delegation tool
    /// enforces the depth cap from this.
    pub delegation_depth: usize,
}

impl ToolContext {
    pub fn new(agent_name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            agent_name: agent_name.into(),
            directory: directory.into(),
            ..Self::default()
        }
    }

    pub fn with_scratchpad(mut self, scratchpad: Arc<Scratchpad>) -> Self {
        self.scratchpad = Some(scratchpad);
        self
    }

    pub fn with_read_tracker(mut self, read_tracker: Arc<ReadTracker>) -> Self {
        self.read_tracker = Some(read_tracker);
        self
    }

    pub fn with_stream(mut self, stream: Arc<LogStream>) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Resolves a tool-supplied path against the agent's working directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let p = PathBuf::from(path);
        if p.is_absolute() {
            p
        } else {
            self.directory.join(p)
        }
    }
}
