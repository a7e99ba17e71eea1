//! # Hive
//!
//! Orchestrate teams of conversational LLM agents in Rust. Each agent is a
//! declaratively configured actor (model, system prompt, tools, working
//! directory, delegation targets, hooks); agents cooperate along two axes:
//!
//! - **Delegation**: an agent calls other agents as tools within one turn.
//!   Delegation conversations are cached per caller (`"worker@lead"`), or
//!   shared (`"worker@*"`) when the callee opts in.
//! - **Workflow**: a DAG of *nodes*, each a mini-swarm, executed in
//!   topological order with input/output transformers that can rewrite
//!   content, skip a node, halt the workflow, or jump to another node.
//!
//! ## Main modules
//!
//! - [`agent`]: [`AgentDefinition`] and its validating builder — the
//!   declarative configuration surface.
//! - [`chat`]: [`AgentChat`] — the per-agent conversation loop: LLM
//!   round-trips, parallel tool execution with request-order results,
//!   callbacks, around-wrappers, context-window accounting, cancellation.
//! - [`swarm`]: [`Swarm`] — agents + lead + shared state, executed for one
//!   prompt; lazy chat initialization and idempotent cleanup.
//! - [`workflow`]: [`Workflow`] — node graph validation (Kahn),
//!   transformers, per-node mini-swarms, context carry-over.
//! - [`delegation`]: the agent-as-tool adaptor, instance cache, and depth
//!   cap.
//! - [`llm`]: the [`Provider`] contract, retry policy, response continuity,
//!   and the scripted mock.
//! - [`tools`]: the [`Tool`] contract, registry with declared requirements,
//!   and the blocked-command guard.
//! - [`hooks`]: pre/post-tool, prompt, stop and lifecycle hooks — callable
//!   or shell, with the stdin-JSON/exit-code protocol.
//! - [`logstream`]: structured event fan-out with filters, idempotent
//!   subscription handles, and task-scoped streams.
//! - [`observer`]: fire-and-forget side agents triggered by events.
//! - [`scratchpad`] / [`read_tracker`]: volatile inter-agent notes and the
//!   read-before-edit record.
//! - [`snapshot`]: versioned state capture and three-phase, warning-based
//!   restore.
//! - [`plugin`] / [`mcp`]: the plugin and MCP client contracts the core
//!   consumes.
//!
//! Key types are re-exported at the crate root:
//! `use hive::{Swarm, AgentDefinition, ScriptedProvider};`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hive::{AgentDefinition, ScriptedProvider, Swarm};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let worker = AgentDefinition::builder("worker")
//!     .description("Implements code changes")
//!     .build()?;
//! let lead = AgentDefinition::builder("lead")
//!     .system_prompt("Use worker for any code task.")
//!     .delegates_to(["worker"])
//!     .build()?;
//!
//! let swarm = Swarm::builder("team")
//!     .agent(lead)
//!     .agent(worker)
//!     .lead("lead")
//!     .provider(Arc::new(ScriptedProvider::always("done")))
//!     .build()?;
//!
//! let reply = swarm.execute("ship the feature").await?;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod chat;
pub mod delegation;
pub mod error;
pub mod hooks;
pub mod llm;
pub mod logstream;
pub mod mcp;
pub mod message;
pub mod observer;
pub mod plugin;
pub mod read_tracker;
pub mod scratchpad;
pub mod snapshot;
pub mod swarm;
pub mod tools;
pub mod workflow;

pub use agent::{AgentDefinition, AgentDefinitionBuilder, ApiVersion, ToolConfig};
pub use chat::{
    AgentChat, AroundLlmRequest, AroundToolExecution, CallbackHandle, ChatEvent,
    ConcurrencyStrategy, ContextBudget, ContextState,
};
pub use delegation::{DelegationCache, DelegationKey, MAX_DELEGATION_DEPTH};
pub use error::{ChatError, ConfigError};
pub use hooks::{HookAction, HookDefinition, HookDispatcher, HookEvent};
pub use llm::{
    ApiShape, CompletionRequest, CompletionResponse, LlmError, Provider, ResponseContinuity,
    RetryPolicy, ScriptedProvider,
};
pub use logstream::{LogCollector, LogStream, SubscriptionHandle};
pub use mcp::{McpClient, McpError, McpServerConfig, McpToolAdapter, McpTransport};
pub use message::{Message, MessageContent, Role, ToolCall};
pub use observer::{ObserverConfig, ObserverManager};
pub use plugin::Plugin;
pub use read_tracker::ReadTracker;
pub use scratchpad::{Scratchpad, ScratchpadEntry, ScratchpadMode};
pub use snapshot::{
    RestoreOptions, RestoreResult, RestoreWarning, Snapshot, SnapshotType, StateError,
    SNAPSHOT_VERSION,
};
pub use swarm::{Swarm, SwarmBuilder};
pub use tools::{Tool, ToolContext, ToolError, ToolOutcome, ToolRegistry, ToolSpec};
pub use workflow::{
    NodeAgentConfig, NodeContext, NodeDefinition, NodeResult, Transformer, TransformerAction,
    Workflow, WorkflowBuilder, WorkflowError, WorkflowResult,
};

// Re-exported so downstream crates can speak the wire event types without a
// separate dependency declaration.
pub use log_event::{Envelope, LogEvent};
