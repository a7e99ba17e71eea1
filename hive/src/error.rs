//! Shared error types.
//!
//! Configuration-class errors abort construction and bubble out of builder
//! calls. Runtime errors inside a single tool call never cross the tool
//! boundary (see [`crate::tools::ToolError`]); LLM and timeout errors surface
//! to the caller of `ask` as [`ChatError`]. Snapshot validation failures are
//! [`StateError`](crate::snapshot::StateError).

use crate::llm::LlmError;

/// Declarative configuration problems: missing fields, unknown references,
/// bad paths, topology violations. Raised at build time, never during a run.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid agent name {0:?}: must be non-empty and must not contain '@'")]
    InvalidAgentName(String),
    #[error("agent {0:?} is defined more than once")]
    DuplicateAgent(String),
    #[error("agent {agent:?} delegates to unknown agent {target:?}")]
    UnknownDelegate { agent: String, target: String },
    #[error("agent {0:?} delegates to itself")]
    SelfDelegation(String),
    #[error("agent {agent:?}: working directory {path:?} does not exist")]
    MissingDirectory { agent: String, path: String },
    #[error("agent {0:?} not found")]
    AgentNotFound(String),
    #[error("lead agent {0:?} not found in the agent set")]
    UnknownLead(String),
    #[error("no provider configured for agent {0:?}")]
    MissingProvider(String),
    #[error("invalid api version {0:?}")]
    InvalidApiVersion(String),
    #[error("tool {0:?} is already registered")]
    ToolNameCollision(String),
    #[error("unknown tool {0:?}")]
    UnknownTool(String),
    #[error("tool {tool:?} requires {requirement} which is not available")]
    MissingToolRequirement {
        tool: String,
        requirement: &'static str,
    },
    #[error("circular dependency involving node {0:?}")]
    CircularDependency(String),
    #[error("workflow node {0:?} not found")]
    UnknownNode(String),
    #[error("node {0:?} is defined more than once")]
    DuplicateNode(String),
    #[error("start node {0:?} must have no dependencies")]
    StartNodeHasDependencies(String),
    #[error("node {0:?} has no agents and no transformer")]
    EmptyNode(String),
    #[error("invalid hook matcher {pattern:?}: {source}")]
    InvalidMatcher {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors surfaced by [`AgentChat::ask`](crate::chat::AgentChat::ask) and by
/// `Swarm::execute`.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("llm error: {0}")]
    Llm(#[from] LlmError),
    #[error("configuration: {0}")]
    Configuration(#[from] ConfigError),
    #[error("agent turn timed out after {0} seconds")]
    TurnTimeout(u64),
    #[error("execution timed out after {0} seconds")]
    ExecutionTimeout(u64),
    #[error("agent {0:?} not found")]
    AgentNotFound(String),
    #[error("prompt halted by hook: {0}")]
    HaltedByHook(String),
}
