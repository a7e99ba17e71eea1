//! Workflow executor: a DAG of nodes, each a mini-swarm.
//!
//! Nodes execute in topological order (Kahn over the dependency lists). Each
//! node binds its context, runs the optional input transformer, executes a
//! mini-swarm built from the node's agent configs, runs the optional output
//! transformer, and records a [`NodeResult`]. Transformers can skip the
//! node, halt the whole workflow, or jump (`goto`) to any node in the
//! execution order.
//!
//! Agents with `reset_context: false` carry their chat instances — the
//! primary together with all of its delegation instances — into later
//! nodes.

mod topo;
mod transformer;

pub use topo::topological_order;
pub use transformer::{
    NodeContext, NodeResult, Transformer, TransformerAction, TransformerEvent,
    SHELL_TRANSFORMER_TIMEOUT,
};

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use log_event::LogEvent;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent::{AgentDefinition, ToolConfig};
use crate::chat::AgentChat;
use crate::delegation::DelegationKey;
use crate::error::{ChatError, ConfigError};
use crate::llm::{Provider, RetryPolicy};
use crate::logstream::LogStream;
use crate::read_tracker::ReadTracker;
use crate::scratchpad::{Scratchpad, ScratchpadMode};
use crate::swarm::Swarm;
use crate::tools::ToolRegistry;

/// One agent's participation in a node.
#[derive(Clone, Debug)]
pub struct NodeAgentConfig {
    pub name: String,
    /// Overrides the definition's delegation targets for this node.
    pub delegates_to: Option<Vec<String>>,
    /// When false, the agent's chat (and its delegation instances) carries
    /// over from earlier nodes instead of starting fresh.
    pub reset_context: bool,
    /// Overrides the definition's tool list for this node.
    pub tools: Option<Vec<ToolConfig>>,
}

impl NodeAgentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delegates_to: None,
            reset_context: true,
            tools: None,
        }
    }

    /// Keep this agent's conversation across nodes.
    pub fn keep_context(mut self) -> Self {
        self.reset_context = false;
        self
    }

    pub fn delegates_to(mut self, targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.delegates_to = Some(targets.into_iter().map(Into::into).collect());
        self
    }

    pub fn tools(mut self, tools: Vec<ToolConfig>) -> Self {
        self.tools = Some(tools);
        self
    }
}

/// One workflow node.
#[derive(Clone)]
pub struct NodeDefinition {
    pub name: String,
    pub agents: Vec<NodeAgentConfig>,
    pub depends_on: Vec<String>,
    /// Lead override; defaults to the first agent config.
    pub lead: Option<String>,
    pub input_transformer: Option<Transformer>,
    pub output_transformer: Option<Transformer>,
}

impl NodeDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agents: Vec::new(),
            depends_on: Vec::new(),
            lead: None,
            input_transformer: None,
            output_transformer: None,
        }
    }

    pub fn agent(mut self, agent: NodeAgentConfig) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn agent_named(self, name: impl Into<String>) -> Self {
        self.agent(NodeAgentConfig::new(name))
    }

    pub fn depends_on(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.depends_on.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn lead(mut self, name: impl Into<String>) -> Self {
        self.lead = Some(name.into());
        self
    }

    pub fn input_transformer(mut self, transformer: Transformer) -> Self {
        self.input_transformer = Some(transformer);
        self
    }

    pub fn output_transformer(mut self, transformer: Transformer) -> Self {
        self.output_transformer = Some(transformer);
        self
    }
}

/// Errors surfaced by [`Workflow::execute`].
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error("goto target {0:?} is not in the execution order")]
    UnknownGotoTarget(String),
}

/// Final outcome of a workflow execution.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkflowResult {
    pub content: String,
    /// The producing agent, or `"halted:<node>"` / `"skipped:<node>"` for
    /// synthesized outcomes.
    pub agent: String,
    pub all_results: BTreeMap<String, NodeResult>,
}

/// Builder for [`Workflow`].
pub struct WorkflowBuilder {
    name: String,
    agents: Vec<AgentDefinition>,
    nodes: Vec<NodeDefinition>,
    start_node: Option<String>,
    scratchpad_mode: ScratchpadMode,
    default_provider: Option<Arc<dyn Provider>>,
    providers: HashMap<String, Arc<dyn Provider>>,
    registry: Arc<ToolRegistry>,
    retry: RetryPolicy,
    execution_timeout: Option<Duration>,
    stream: Option<Arc<LogStream>>,
}

impl WorkflowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agents: Vec::new(),
            nodes: Vec::new(),
            start_node: None,
            scratchpad_mode: ScratchpadMode::default(),
            default_provider: None,
            providers: HashMap::new(),
            registry: Arc::new(ToolRegistry::new()),
            retry: RetryPolicy::default(),
            execution_timeout: None,
            stream: None,
        }
    }

    pub fn agent(mut self, definition: AgentDefinition) -> Self {
        self.agents.push(definition);
        self
    }

    pub fn node(mut self, node: NodeDefinition) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn start_node(mut self, name: impl Into<String>) -> Self {
        self.start_node = Some(name.into());
        self
    }

    pub fn scratchpad_mode(mut self, mode: ScratchpadMode) -> Self {
        self.scratchpad_mode = mode;
        self
    }

    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.default_provider = Some(provider);
        self
    }

    pub fn provider_for(mut self, agent: impl Into<String>, provider: Arc<dyn Provider>) -> Self {
        self.providers.insert(agent.into(), provider);
        self
    }

    pub fn registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }

    pub fn with_stream(mut self, stream: Arc<LogStream>) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Validates the node graph and produces the workflow.
    pub fn build(self) -> Result<Workflow, ConfigError> {
        if self.nodes.is_empty() {
            return Err(ConfigError::UnknownNode("<workflow has no nodes>".into()));
        }

        let mut definitions: HashMap<String, Arc<AgentDefinition>> = HashMap::new();
        for agent in self.agents {
            if definitions.contains_key(&agent.name) {
                return Err(ConfigError::DuplicateAgent(agent.name));
            }
            definitions.insert(agent.name.clone(), Arc::new(agent));
        }

        let mut seen = std::collections::HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.name.clone()) {
                return Err(ConfigError::DuplicateNode(node.name.clone()));
            }
            if node.agents.is_empty()
                && node.input_transformer.is_none()
                && node.output_transformer.is_none()
            {
                return Err(ConfigError::EmptyNode(node.name.clone()));
            }
            for agent in &node.agents {
                if !definitions.contains_key(&agent.name) {
                    return Err(ConfigError::AgentNotFound(agent.name.clone()));
                }
                for target in agent.delegates_to.iter().flatten() {
                    if !definitions.contains_key(target) {
                        return Err(ConfigError::UnknownDelegate {
                            agent: agent.name.clone(),
                            target: target.clone(),
                        });
                    }
                }
            }
            if let Some(lead) = &node.lead {
                if !node.agents.iter().any(|a| &a.name == lead) {
                    return Err(ConfigError::UnknownLead(lead.clone()));
                }
            }
        }

        let order = topological_order(&self.nodes)?;
        let start = match self.start_node {
            Some(start) => {
                let node = self
                    .nodes
                    .iter()
                    .find(|n| n.name == start)
                    .ok_or_else(|| ConfigError::UnknownNode(start.clone()))?;
                if !node.depends_on.is_empty() {
                    return Err(ConfigError::StartNodeHasDependencies(start));
                }
                node.name.clone()
            }
            None => order[0].clone(),
        };

        let nodes: HashMap<String, NodeDefinition> = self
            .nodes
            .into_iter()
            .map(|n| (n.name.clone(), n))
            .collect();

        let stream = self
            .stream
            .unwrap_or_else(|| LogStream::new(format!("workflow-{}", Uuid::new_v4().simple())));

        Ok(Workflow {
            name: self.name,
            definitions,
            nodes,
            order,
            start,
            scratchpad_mode: self.scratchpad_mode,
            shared_scratchpad: Arc::new(Scratchpad::new()),
            read_tracker: Arc::new(ReadTracker::new()),
            default_provider: self.default_provider,
            providers: self.providers,
            registry: self.registry,
            retry: self.retry,
            execution_timeout: self.execution_timeout,
            stream,
            cancel: CancellationToken::new(),
            carried: StdMutex::new(HashMap::new()),
            retained: StdMutex::new(Vec::new()),
            pending_restore: StdMutex::new(PendingRestore::default()),
            executed: AtomicBool::new(false),
        })
    }
}

/// Chat instances carried across nodes for a `reset_context: false` agent.
#[derive(Clone)]
pub(crate) struct CarriedInstances {
    pub(crate) primary: Arc<AgentChat>,
    pub(crate) delegations: Vec<(DelegationKey, Arc<AgentChat>)>,
}

/// Snapshot entries waiting for the owning chat instance to exist. Applied
/// as node swarms are built.
#[derive(Default)]
pub(crate) struct PendingRestore {
    pub(crate) agents: HashMap<String, crate::snapshot::AgentSnapshot>,
    pub(crate) delegations: HashMap<String, crate::snapshot::AgentSnapshot>,
    pub(crate) options: crate::snapshot::RestoreOptions,
}

/// A validated workflow, ready to execute.
pub struct Workflow {
    name: String,
    pub(crate) definitions: HashMap<String, Arc<AgentDefinition>>,
    nodes: HashMap<String, NodeDefinition>,
    order: Vec<String>,
    start: String,
    pub(crate) scratchpad_mode: ScratchpadMode,
    pub(crate) shared_scratchpad: Arc<Scratchpad>,
    pub(crate) read_tracker: Arc<ReadTracker>,
    default_provider: Option<Arc<dyn Provider>>,
    providers: HashMap<String, Arc<dyn Provider>>,
    registry: Arc<ToolRegistry>,
    retry: RetryPolicy,
    execution_timeout: Option<Duration>,
    pub(crate) stream: Arc<LogStream>,
    cancel: CancellationToken,
    /// Instances of `reset_context: false` agents, kept across nodes and
    /// executions; also what a workflow snapshot captures.
    pub(crate) carried: StdMutex<HashMap<String, CarriedInstances>>,
    /// Node swarms from past executions, kept so carried chats retain
    /// working swarm handles.
    retained: StdMutex<Vec<Swarm>>,
    pub(crate) pending_restore: StdMutex<PendingRestore>,
    pub(crate) executed: AtomicBool,
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow").field("name", &self.name).finish()
    }
}

impl Workflow {
    pub fn builder(name: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The computed execution order.
    pub fn execution_order(&self) -> &[String] {
        &self.order
    }

    pub fn stream(&self) -> Arc<LogStream> {
        Arc::clone(&self.stream)
    }

    /// Runs the workflow for one prompt.
    pub async fn execute(&self, prompt: &str) -> Result<WorkflowResult, WorkflowError> {
        let execution_id = format!("exec-{}", Uuid::new_v4().simple());
        self.stream.set_execution_id(&execution_id);
        self.executed.store(true, std::sync::atomic::Ordering::SeqCst);
        self.stream.emit(&LogEvent::SwarmStart {
            swarm: self.name.clone(),
            prompt: prompt.to_string(),
        });

        let outcome = self.run_nodes(prompt).await;

        match &outcome {
            Ok(result) => self.stream.emit(&LogEvent::SwarmStop {
                swarm: self.name.clone(),
                content: result.content.clone(),
            }),
            Err(error) => self.stream.emit(&LogEvent::SwarmError {
                swarm: self.name.clone(),
                error: error.to_string(),
            }),
        };
        outcome
    }

    async fn run_nodes(&self, prompt: &str) -> Result<WorkflowResult, WorkflowError> {
        let mut all_results: BTreeMap<String, NodeResult> = BTreeMap::new();
        let mut injected: Option<String> = None;
        let mut last: Option<NodeResult> = None;
        let mut index = self
            .order
            .iter()
            .position(|n| n == &self.start)
            .unwrap_or(0);

        while index < self.order.len() {
            let node_name = self.order[index].clone();
            let node = match self.nodes.get(&node_name) {
                Some(node) => node,
                None => break,
            };
            let scope = format!("node:{node_name}");
            self.stream.emit_scoped(
                &LogEvent::NodeStart {
                    node: node_name.clone(),
                },
                &scope,
            );

            let content = injected.take().unwrap_or_else(|| {
                if node.depends_on.len() == 1 {
                    all_results
                        .get(&node.depends_on[0])
                        .map(|r| r.content.clone())
                        .unwrap_or_else(|| prompt.to_string())
                } else {
                    prompt.to_string()
                }
            });

            let input_context = NodeContext {
                event: TransformerEvent::Input,
                node_name: node_name.clone(),
                original_prompt: prompt.to_string(),
                content,
                all_results: all_results.clone(),
                dependencies: node.depends_on.clone(),
            };
            let action = match &node.input_transformer {
                Some(transformer) => transformer.apply(&input_context).await,
                None => TransformerAction::Continue(input_context.content.clone()),
            };

            let content = match action {
                TransformerAction::Halt(content) => {
                    self.emit_node_stop(&node_name, &scope);
                    return Ok(WorkflowResult {
                        content,
                        agent: format!("halted:{node_name}"),
                        all_results,
                    });
                }
                TransformerAction::Goto { target, content } => {
                    let position = self
                        .order
                        .iter()
                        .position(|n| n == &target)
                        .ok_or(WorkflowError::UnknownGotoTarget(target))?;
                    injected = Some(content);
                    self.emit_node_stop(&node_name, &scope);
                    index = position;
                    continue;
                }
                TransformerAction::Skip(content) => {
                    let result = NodeResult {
                        agent: format!("skipped:{node_name}"),
                        content,
                        duration_ms: 0,
                    };
                    all_results.insert(node_name.clone(), result.clone());
                    last = Some(result);
                    self.emit_node_stop(&node_name, &scope);
                    index += 1;
                    continue;
                }
                TransformerAction::Continue(content) => content,
            };

            let mut result = if node.agents.is_empty() {
                // Transformer-only node: the transformed input is the result.
                NodeResult {
                    agent: format!("transformer:{node_name}"),
                    content,
                    duration_ms: 0,
                }
            } else {
                let swarm = self.build_node_swarm(node).await?;
                let started = Instant::now();
                let output = swarm.execute(&content).await?;
                let result = NodeResult {
                    agent: swarm.lead().to_string(),
                    content: output,
                    duration_ms: started.elapsed().as_millis() as u64,
                };
                self.carry_instances(node, &swarm);
                // Node swarms stay alive so carried chats keep working
                // handles to their cores.
                self.retained
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(swarm);
                result
            };

            if let Some(transformer) = &node.output_transformer {
                let output_context = NodeContext {
                    event: TransformerEvent::Output,
                    node_name: node_name.clone(),
                    original_prompt: prompt.to_string(),
                    content: result.content.clone(),
                    all_results: all_results.clone(),
                    dependencies: node.depends_on.clone(),
                };
                match transformer.apply(&output_context).await {
                    TransformerAction::Continue(content)
                    | TransformerAction::Skip(content) => result.content = content,
                    TransformerAction::Halt(content) => {
                        all_results.insert(node_name.clone(), result);
                        self.emit_node_stop(&node_name, &scope);
                        return Ok(WorkflowResult {
                            content,
                            agent: format!("halted:{node_name}"),
                            all_results,
                        });
                    }
                    TransformerAction::Goto { target, content } => {
                        let position = self
                            .order
                            .iter()
                            .position(|n| n == &target)
                            .ok_or(WorkflowError::UnknownGotoTarget(target))?;
                        all_results.insert(node_name.clone(), result.clone());
                        last = Some(result);
                        injected = Some(content);
                        self.emit_node_stop(&node_name, &scope);
                        index = position;
                        continue;
                    }
                }
            }

            all_results.insert(node_name.clone(), result.clone());
            last = Some(result);
            self.emit_node_stop(&node_name, &scope);
            index += 1;
        }

        let last = last.unwrap_or(NodeResult {
            agent: format!("halted:{}", self.start),
            content: String::new(),
            duration_ms: 0,
        });
        Ok(WorkflowResult {
            content: last.content,
            agent: last.agent,
            all_results,
        })
    }

    fn emit_node_stop(&self, node: &str, scope: &str) {
        self.stream.emit_scoped(
            &LogEvent::NodeStop {
                node: node.to_string(),
            },
            scope,
        );
    }

    /// Builds the mini-swarm for one node, seeding carried chat instances
    /// and applying any pending restored conversations.
    async fn build_node_swarm(&self, node: &NodeDefinition) -> Result<Swarm, ConfigError> {
        let mut builder = Swarm::builder(format!("{}:{}", self.name, node.name))
            .registry(Arc::clone(&self.registry))
            .retry(self.retry)
            .with_stream(Arc::clone(&self.stream))
            .with_cancellation(self.cancel.clone())
            .with_read_tracker(Arc::clone(&self.read_tracker))
            .scope_prefix(format!("node:{}", node.name))
            .inherit_subscriptions(false);

        builder = match self.scratchpad_mode {
            ScratchpadMode::Enabled => builder
                .with_scratchpad(Arc::clone(&self.shared_scratchpad))
                .scratchpad_enabled(true),
            ScratchpadMode::PerNode => builder.scratchpad_enabled(true),
            ScratchpadMode::Disabled => builder.scratchpad_enabled(false),
        };

        if let Some(timeout) = self.execution_timeout {
            builder = builder.execution_timeout(timeout);
        }
        if let Some(provider) = &self.default_provider {
            builder = builder.provider(Arc::clone(provider));
        }

        for config in &node.agents {
            let Some(definition) = self.definitions.get(&config.name) else {
                return Err(ConfigError::AgentNotFound(config.name.clone()));
            };
            let mut definition = definition.as_ref().clone();
            if let Some(delegates) = &config.delegates_to {
                definition.delegates_to = delegates.clone();
            }
            if let Some(tools) = &config.tools {
                definition.tools = tools.clone();
            }
            if let Some(provider) = self.providers.get(&config.name) {
                builder = builder.provider_for(config.name.clone(), Arc::clone(provider));
            }
            builder = builder.agent(definition);
        }
        if let Some(lead) = &node.lead {
            builder = builder.lead(lead.clone());
        }

        let swarm = builder.build()?;

        {
            let carried = self.carried.lock().unwrap_or_else(|e| e.into_inner());
            for config in &node.agents {
                if config.reset_context {
                    continue;
                }
                if let Some(carry) = carried.get(&config.name) {
                    swarm
                        .core
                        .seed_primary(config.name.clone(), Arc::clone(&carry.primary));
                    for (key, chat) in &carry.delegations {
                        swarm
                            .core
                            .delegation_cache
                            .insert(key.clone(), Arc::clone(chat));
                    }
                }
            }
        }

        self.apply_pending_restore(node, &swarm).await?;
        Ok(swarm)
    }

    /// Applies restored conversations whose owning instances belong to this
    /// node's swarm, initializing those chats now.
    async fn apply_pending_restore(
        &self,
        node: &NodeDefinition,
        swarm: &Swarm,
    ) -> Result<(), ConfigError> {
        let (agents, delegations, options) = {
            let mut pending = self.pending_restore.lock().unwrap_or_else(|e| e.into_inner());
            if pending.agents.is_empty() && pending.delegations.is_empty() {
                return Ok(());
            }
            let mut agents = Vec::new();
            for config in &node.agents {
                if let Some(entry) = pending.agents.remove(&config.name) {
                    agents.push((config.name.clone(), entry));
                }
            }
            let node_agents: Vec<&str> =
                node.agents.iter().map(|a| a.name.as_str()).collect();
            let keys: Vec<String> = pending
                .delegations
                .keys()
                .filter(|key| {
                    key.split_once('@')
                        .map(|(_, caller)| caller == "*" || node_agents.contains(&caller))
                        .unwrap_or(false)
                })
                .cloned()
                .collect();
            let mut delegations = Vec::new();
            for key in keys {
                if let Some(entry) = pending.delegations.remove(&key) {
                    delegations.push((key, entry));
                }
            }
            (agents, delegations, pending.options)
        };

        for (name, entry) in agents {
            let chat = swarm.core.primary_chat(&name).await?;
            chat.replace_messages(crate::snapshot::rebuild_conversation(
                &entry,
                chat.system_prompt(),
                options,
            ));
            chat.restore_context_state(entry.context_state.clone());
        }
        for (key, entry) in delegations {
            let Some((callee, caller)) = key.split_once('@') else {
                continue;
            };
            if !swarm.core.definitions.contains_key(callee) {
                continue;
            }
            let chat = swarm.core.delegation_chat(callee, caller, 1).await?;
            chat.replace_messages(crate::snapshot::rebuild_conversation(
                &entry,
                chat.system_prompt(),
                options,
            ));
            chat.restore_context_state(entry.context_state.clone());
        }
        Ok(())
    }

    /// After a node ran, captures chat instances for its
    /// `reset_context: false` agents. A primary and its delegation instances
    /// are cached together or not at all.
    fn carry_instances(&self, node: &NodeDefinition, swarm: &Swarm) {
        let mut carried = self.carried.lock().unwrap_or_else(|e| e.into_inner());
        for config in &node.agents {
            if config.reset_context {
                continue;
            }
            let Some(primary) = swarm.core.cached_primary(&config.name) else {
                // Never initialized in this node; nothing to carry.
                continue;
            };
            let delegations: Vec<(DelegationKey, Arc<AgentChat>)> = swarm
                .core
                .delegation_cache
                .entries()
                .into_iter()
                .filter(|(key, _)| {
                    key.as_str()
                        .split_once('@')
                        .map(|(_, caller)| caller == config.name || caller == "*")
                        .unwrap_or(false)
                })
                .collect();
            carried.insert(
                config.name.clone(),
                CarriedInstances {
                    primary,
                    delegations,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(name: &str) -> AgentDefinition {
        AgentDefinition::builder(name)
            .directory(std::env::temp_dir())
            .build()
            .unwrap()
    }

    #[test]
    fn duplicate_node_rejected() {
        let err = Workflow::builder("wf")
            .agent(agent("a"))
            .node(NodeDefinition::new("plan").agent_named("a"))
            .node(NodeDefinition::new("plan").agent_named("a"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateNode(name) if name == "plan"));
    }

    #[test]
    fn agentless_node_without_transformer_rejected() {
        let err = Workflow::builder("wf")
            .node(NodeDefinition::new("empty"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyNode(name) if name == "empty"));
    }

    #[test]
    fn start_node_with_dependencies_rejected() {
        let err = Workflow::builder("wf")
            .agent(agent("a"))
            .node(NodeDefinition::new("first").agent_named("a"))
            .node(
                NodeDefinition::new("second")
                    .agent_named("a")
                    .depends_on(["first"]),
            )
            .start_node("second")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::StartNodeHasDependencies(_)));
    }

    #[test]
    fn execution_order_is_topological() {
        let wf = Workflow::builder("wf")
            .agent(agent("a"))
            .node(
                NodeDefinition::new("verify")
                    .agent_named("a")
                    .depends_on(["build"]),
            )
            .node(NodeDefinition::new("plan").agent_named("a"))
            .node(
                NodeDefinition::new("build")
                    .agent_named("a")
                    .depends_on(["plan"]),
            )
            .build()
            .unwrap();
        assert_eq!(wf.execution_order(), &["plan", "build", "verify"]);
    }

    #[test]
    fn cycle_in_dependencies_rejected() {
        let err = Workflow::builder("wf")
            .agent(agent("a"))
            .node(
                NodeDefinition::new("x")
                    .agent_named("a")
                    .depends_on(["y"]),
            )
            .node(
                NodeDefinition::new("y")
                    .agent_named("a")
                    .depends_on(["x"]),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::CircularDependency(_)));
    }

    #[test]
    fn unknown_node_agent_rejected() {
        let err = Workflow::builder("wf")
            .node(NodeDefinition::new("plan").agent_named("ghost"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::AgentNotFound(name) if name == "ghost"));
    }
}
