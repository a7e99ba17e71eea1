//! Swarm: a set of agents with a designated lead, executed for one prompt.
//!
//! The builder validates definitions and topology up front; agent chats are
//! initialized lazily on first reference and cached for the swarm's
//! lifetime. `execute` sets up the execution scope (fresh execution id,
//! task-local stream), runs the lead agent's `ask`, emits
//! `swarm_start`/`swarm_stop`/`swarm_error`, and always runs observer and
//! MCP cleanup on the way out.
//!
//! Shared state — scratchpad, read tracker, delegation cache — is owned here
//! and handed to chats and tools as `Arc` handles, never as ownership
//! cycles; anything pointing back at the swarm holds a `Weak`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log_event::LogEvent;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent::AgentDefinition;
use crate::chat::{AgentChat, ChatParams};
use crate::delegation::{DelegateTool, DelegationCache, DelegationKey};
use crate::error::{ChatError, ConfigError};
use crate::hooks::{HookAction, HookDefinition, HookDispatcher, HookEnvironment, HookEvent};
use crate::llm::{Provider, RetryPolicy};
use crate::logstream::{self, LogStream};
use crate::mcp::{discover_tools, McpClient};
use crate::observer::{ObserverConfig, ObserverManager};
use crate::plugin::Plugin;
use crate::read_tracker::ReadTracker;
use crate::scratchpad::Scratchpad;
use crate::tools::{Tool, ToolBuildContext, ToolContext, ToolRegistry};

/// Builder for [`Swarm`]. `build` validates the whole topology.
pub struct SwarmBuilder {
    name: String,
    agents: Vec<AgentDefinition>,
    lead: Option<String>,
    default_provider: Option<Arc<dyn Provider>>,
    providers: HashMap<String, Arc<dyn Provider>>,
    registry: Arc<ToolRegistry>,
    plugins: Vec<Arc<dyn Plugin>>,
    observers: Vec<ObserverConfig>,
    mcp_clients: Vec<(String, Arc<dyn McpClient>)>,
    hooks: Vec<HookDefinition>,
    execution_timeout: Option<Duration>,
    retry: RetryPolicy,
    inherit_subscriptions: bool,
    stream: Option<Arc<LogStream>>,
    scratchpad: Option<Arc<Scratchpad>>,
    scratchpad_enabled: bool,
    read_tracker: Option<Arc<ReadTracker>>,
    cancel: Option<CancellationToken>,
    scope_prefix: String,
}

impl SwarmBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agents: Vec::new(),
            lead: None,
            default_provider: None,
            providers: HashMap::new(),
            registry: Arc::new(ToolRegistry::new()),
            plugins: Vec::new(),
            observers: Vec::new(),
            mcp_clients: Vec::new(),
            hooks: Vec::new(),
            execution_timeout: None,
            retry: RetryPolicy::default(),
            inherit_subscriptions: true,
            stream: None,
            scratchpad: None,
            scratchpad_enabled: true,
            read_tracker: None,
            cancel: None,
            scope_prefix: String::new(),
        }
    }

    pub fn agent(mut self, definition: AgentDefinition) -> Self {
        self.agents.push(definition);
        self
    }

    pub fn lead(mut self, name: impl Into<String>) -> Self {
        self.lead = Some(name.into());
        self
    }

    /// Default provider used by every agent without a per-agent override.
    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.default_provider = Some(provider);
        self
    }

    /// Per-agent provider override.
    pub fn provider_for(mut self, agent: impl Into<String>, provider: Arc<dyn Provider>) -> Self {
        self.providers.insert(agent.into(), provider);
        self
    }

    pub fn registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn observer(mut self, observer: ObserverConfig) -> Self {
        self.observers.push(observer);
        self
    }

    /// Registers a connected MCP client under the server name agents
    /// reference in `mcp_servers`.
    pub fn mcp_client(mut self, name: impl Into<String>, client: Arc<dyn McpClient>) -> Self {
        self.mcp_clients.push((name.into(), client));
        self
    }

    /// Swarm-level hook (session/swarm lifecycle events).
    pub fn hook(mut self, hook: HookDefinition) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Whether a nested swarm reuses the parent execution's stream (and so
    /// its subscriptions). Defaults to true.
    pub fn inherit_subscriptions(mut self, inherit: bool) -> Self {
        self.inherit_subscriptions = inherit;
        self
    }

    pub fn with_stream(mut self, stream: Arc<LogStream>) -> Self {
        self.stream = Some(stream);
        self
    }

    pub(crate) fn with_scratchpad(mut self, scratchpad: Arc<Scratchpad>) -> Self {
        self.scratchpad = Some(scratchpad);
        self
    }

    pub(crate) fn scratchpad_enabled(mut self, enabled: bool) -> Self {
        self.scratchpad_enabled = enabled;
        self
    }

    pub(crate) fn with_read_tracker(mut self, read_tracker: Arc<ReadTracker>) -> Self {
        self.read_tracker = Some(read_tracker);
        self
    }

    pub(crate) fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub(crate) fn scope_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.scope_prefix = prefix.into();
        self
    }

    /// Validates the topology and produces the swarm.
    pub fn build(self) -> Result<Swarm, ConfigError> {
        let mut definitions: HashMap<String, Arc<AgentDefinition>> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for agent in self.agents {
            if definitions.contains_key(&agent.name) {
                return Err(ConfigError::DuplicateAgent(agent.name));
            }
            order.push(agent.name.clone());
            definitions.insert(agent.name.clone(), Arc::new(agent));
        }
        let lead = match self.lead {
            Some(lead) => {
                if !definitions.contains_key(&lead) {
                    return Err(ConfigError::UnknownLead(lead));
                }
                lead
            }
            None => order
                .first()
                .cloned()
                .ok_or_else(|| ConfigError::UnknownLead("<none>".to_string()))?,
        };

        for definition in definitions.values() {
            for target in &definition.delegates_to {
                if target == &definition.name {
                    return Err(ConfigError::SelfDelegation(definition.name.clone()));
                }
                if !definitions.contains_key(target) {
                    return Err(ConfigError::UnknownDelegate {
                        agent: definition.name.clone(),
                        target: target.clone(),
                    });
                }
            }
            if !definition.disable_default_tools {
                for tool in &definition.tools {
                    if !self.registry.contains(&tool.name) {
                        return Err(ConfigError::UnknownTool(tool.name.clone()));
                    }
                    for path in &tool.allowed_paths {
                        if !path.exists() {
                            return Err(ConfigError::MissingDirectory {
                                agent: definition.name.clone(),
                                path: path.display().to_string(),
                            });
                        }
                    }
                }
            }
        }

        let stream = self
            .stream
            .or_else(|| self.inherit_subscriptions.then(logstream::current).flatten())
            .unwrap_or_else(|| LogStream::new(format!("swarm-{}", Uuid::new_v4().simple())));

        let hook_environment = HookEnvironment {
            project_dir: definitions
                .get(&lead)
                .map(|d| d.directory.clone())
                .unwrap_or_default(),
            agent_name: lead.clone(),
            swarm_name: self.name.clone(),
        };

        let core = Arc::new(SwarmCore {
            name: self.name,
            definitions,
            lead,
            default_provider: self.default_provider,
            providers: self.providers,
            registry: self.registry,
            plugins: self.plugins,
            scratchpad: self.scratchpad.unwrap_or_else(|| Arc::new(Scratchpad::new())),
            scratchpad_enabled: self.scratchpad_enabled,
            read_tracker: self
                .read_tracker
                .unwrap_or_else(|| Arc::new(ReadTracker::new())),
            chats: dashmap::DashMap::new(),
            delegation_cache: DelegationCache::new(),
            stream,
            observers: ObserverManager::new(self.observers),
            mcp_clients: self.mcp_clients,
            hooks: HookDispatcher::new(self.hooks, hook_environment),
            execution_timeout: self.execution_timeout,
            retry: self.retry,
            cancel: self.cancel.unwrap_or_default(),
            scope_prefix: self.scope_prefix,
            first_message_sent: AtomicBool::new(false),
        });
        ObserverManager::install(&core);
        Ok(Swarm { core })
    }
}

/// Swarm-owned state shared with chats, tools, and the snapshot layer.
pub struct SwarmCore {
    pub(crate) name: String,
    pub(crate) definitions: HashMap<String, Arc<AgentDefinition>>,
    pub(crate) lead: String,
    default_provider: Option<Arc<dyn Provider>>,
    providers: HashMap<String, Arc<dyn Provider>>,
    registry: Arc<ToolRegistry>,
    plugins: Vec<Arc<dyn Plugin>>,
    pub(crate) scratchpad: Arc<Scratchpad>,
    scratchpad_enabled: bool,
    pub(crate) read_tracker: Arc<ReadTracker>,
    chats: dashmap::DashMap<String, Arc<AgentChat>>,
    pub(crate) delegation_cache: DelegationCache,
    pub(crate) stream: Arc<LogStream>,
    pub(crate) observers: ObserverManager,
    mcp_clients: Vec<(String, Arc<dyn McpClient>)>,
    hooks: HookDispatcher,
    execution_timeout: Option<Duration>,
    retry: RetryPolicy,
    cancel: CancellationToken,
    scope_prefix: String,
    pub(crate) first_message_sent: AtomicBool,
}

impl SwarmCore {
    fn provider_for(&self, definition: &AgentDefinition) -> Result<Arc<dyn Provider>, ConfigError> {
        self.providers
            .get(&definition.name)
            .or(self.default_provider.as_ref())
            .cloned()
            .ok_or_else(|| ConfigError::MissingProvider(definition.name.clone()))
    }

    fn scoped(&self, segment: &str) -> String {
        if self.scope_prefix.is_empty() {
            segment.to_string()
        } else {
            format!("{}/{}", self.scope_prefix, segment)
        }
    }

    /// Builds one chat instance for `definition`.
    async fn build_chat(
        self: &Arc<Self>,
        definition: &Arc<AgentDefinition>,
        scope: String,
        depth: usize,
    ) -> Result<Arc<AgentChat>, ConfigError> {
        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();

        if !definition.disable_default_tools {
            let build_ctx = ToolBuildContext {
                agent_name: Some(definition.name.clone()),
                directory: Some(definition.directory.clone()),
                scratchpad: self.scratchpad_enabled.then(|| Arc::clone(&self.scratchpad)),
                chat: None,
            };
            for tool in &definition.tools {
                tools.push(self.registry.instantiate(&tool.name, &build_ctx)?);
            }
        }

        let push_unique = |tools: &mut Vec<Arc<dyn Tool>>, tool: Arc<dyn Tool>| {
            if tools.iter().any(|t| t.name() == tool.name()) {
                tracing::warn!(agent = %definition.name, tool = tool.name(), "duplicate tool name; keeping the first");
            } else {
                tools.push(tool);
            }
        };

        for plugin in &self.plugins {
            for tool in plugin.tools(definition) {
                push_unique(&mut tools, tool);
            }
        }

        for server in &definition.mcp_servers {
            let Some((_, client)) = self.mcp_clients.iter().find(|(n, _)| n == &server.name)
            else {
                tracing::warn!(agent = %definition.name, server = %server.name, "no MCP client registered; skipping");
                continue;
            };
            match discover_tools(Arc::clone(client)).await {
                Ok(discovered) => {
                    for tool in discovered {
                        push_unique(&mut tools, tool);
                    }
                }
                Err(error) => {
                    // One failing server never blocks the agent.
                    tracing::warn!(server = %server.name, %error, "MCP tool discovery failed");
                }
            }
        }

        for target in &definition.delegates_to {
            let callee = self
                .definitions
                .get(target)
                .ok_or_else(|| ConfigError::AgentNotFound(target.clone()))?;
            push_unique(
                &mut tools,
                Arc::new(DelegateTool::new(
                    Arc::clone(callee),
                    definition.name.clone(),
                    Arc::downgrade(self),
                )),
            );
        }

        let mut system_prompt = definition.system_prompt.clone();
        for plugin in &self.plugins {
            if let Some(fragment) = plugin.system_prompt_contribution(definition) {
                system_prompt = Some(match system_prompt {
                    Some(prompt) => format!("{prompt}\n\n{fragment}"),
                    None => fragment,
                });
            }
        }

        let tool_context = ToolContext {
            agent_name: definition.name.clone(),
            directory: definition.directory.clone(),
            scratchpad: self.scratchpad_enabled.then(|| Arc::clone(&self.scratchpad)),
            read_tracker: Some(Arc::clone(&self.read_tracker)),
            stream: Some(Arc::clone(&self.stream)),
            delegation_depth: depth,
        };

        let hooks = HookDispatcher::new(
            definition.hooks.clone(),
            HookEnvironment {
                project_dir: definition.directory.clone(),
                agent_name: definition.name.clone(),
                swarm_name: self.name.clone(),
            },
        );

        Ok(AgentChat::new(ChatParams {
            definition: Arc::clone(definition),
            provider: self.provider_for(definition)?,
            retry: self.retry,
            tools,
            tool_context,
            hooks,
            stream: Arc::clone(&self.stream),
            scope,
            system_prompt,
            depth,
            cancel: self.cancel.clone(),
            execution_timeout: self.execution_timeout,
        }))
    }

    /// The lazily initialized primary chat for `name`.
    pub async fn primary_chat(self: &Arc<Self>, name: &str) -> Result<Arc<AgentChat>, ConfigError> {
        if let Some(chat) = self.chats.get(name) {
            return Ok(Arc::clone(chat.value()));
        }
        let definition = self
            .definitions
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::AgentNotFound(name.to_string()))?;
        let chat = self
            .build_chat(&definition, self.scoped(name), 0)
            .await?;
        Ok(Arc::clone(
            self.chats
                .entry(name.to_string())
                .or_insert(chat)
                .value(),
        ))
    }

    /// The cached (or freshly built) delegation chat for `callee@caller`.
    pub async fn delegation_chat(
        self: &Arc<Self>,
        callee: &str,
        caller: &str,
        depth: usize,
    ) -> Result<Arc<AgentChat>, ConfigError> {
        let definition = self
            .definitions
            .get(callee)
            .cloned()
            .ok_or_else(|| ConfigError::AgentNotFound(callee.to_string()))?;
        let key = DelegationKey::for_call(&definition, caller);
        if let Some(chat) = self.delegation_cache.get(&key) {
            return Ok(chat);
        }
        let chat = self
            .build_chat(&definition, self.scoped(key.as_str()), depth)
            .await?;
        self.delegation_cache.insert(key.clone(), Arc::clone(&chat));
        Ok(chat)
    }

    /// A fresh isolated chat for one observer run. Never cached.
    pub(crate) async fn observer_chat(
        self: &Arc<Self>,
        definition: &Arc<AgentDefinition>,
    ) -> Result<Arc<AgentChat>, String> {
        self.build_chat(definition, self.scoped(&format!("observer:{}", definition.name)), 0)
            .await
            .map_err(|e| e.to_string())
    }

    /// Seeds a primary chat (workflow context carry-over, restore).
    pub(crate) fn seed_primary(&self, name: impl Into<String>, chat: Arc<AgentChat>) {
        self.chats.insert(name.into(), chat);
    }

    pub(crate) fn cached_primary(&self, name: &str) -> Option<Arc<AgentChat>> {
        self.chats.get(name).map(|c| Arc::clone(c.value()))
    }

    pub(crate) fn cached_primaries(&self) -> Vec<(String, Arc<AgentChat>)> {
        self.chats
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect()
    }

    pub(crate) fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    async fn cleanup_mcp_clients(&self) {
        for (name, client) in &self.mcp_clients {
            if let Err(error) = client.stop().await {
                tracing::warn!(server = %name, %error, "MCP client stop failed");
            }
        }
    }

    /// Stops MCP clients and clears delegation caches. Idempotent.
    pub async fn cleanup(&self) {
        self.cleanup_mcp_clients().await;
        self.delegation_cache.clear();
    }
}

/// A set of agents with a designated lead, executed for one prompt at a
/// time.
pub struct Swarm {
    pub(crate) core: Arc<SwarmCore>,
}

impl std::fmt::Debug for Swarm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Swarm").field("name", &self.core.name).finish()
    }
}

impl Swarm {
    pub fn builder(name: impl Into<String>) -> SwarmBuilder {
        SwarmBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn lead(&self) -> &str {
        &self.core.lead
    }

    pub fn stream(&self) -> Arc<LogStream> {
        Arc::clone(&self.core.stream)
    }

    pub fn scratchpad(&self) -> Arc<Scratchpad> {
        Arc::clone(&self.core.scratchpad)
    }

    pub fn read_tracker(&self) -> Arc<ReadTracker> {
        Arc::clone(&self.core.read_tracker)
    }

    pub fn agent_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.core.definitions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Cached delegation-instance keys (`"callee@caller"`), sorted.
    pub fn delegation_keys(&self) -> Vec<String> {
        self.core.delegation_cache.keys()
    }

    /// The cached chat for `name`, when it has been initialized.
    pub fn agent_chat(&self, name: &str) -> Option<Arc<AgentChat>> {
        self.core.cached_primary(name)
    }

    /// The cached delegation chat for `key`, when present.
    pub fn delegation_chat(&self, key: &str) -> Option<Arc<AgentChat>> {
        self.core
            .delegation_cache
            .get(&DelegationKey::from(key.to_string()))
    }

    /// Initializes (or returns) the primary chat for `name`.
    pub async fn chat(&self, name: &str) -> Result<Arc<AgentChat>, ConfigError> {
        self.core.primary_chat(name).await
    }

    /// Runs one prompt through the lead agent and returns the final content.
    pub async fn execute(&self, prompt: &str) -> Result<String, ChatError> {
        let core = &self.core;
        let execution_id = format!("exec-{}", Uuid::new_v4().simple());
        core.stream.set_execution_id(&execution_id);

        let mut prompt = prompt.to_string();
        if !core.first_message_sent.swap(true, Ordering::SeqCst) {
            core.stream.emit(&LogEvent::SessionStart {
                swarm: core.name.clone(),
            });
            match core
                .hooks
                .dispatch(HookEvent::SessionStart, None, &json!({ "prompt": prompt }))
                .await
            {
                HookAction::Replace(replaced) => prompt = replaced,
                HookAction::Halt(message) => return Err(ChatError::HaltedByHook(message)),
                HookAction::Continue => {}
            }
        }

        core.stream.emit(&LogEvent::SwarmStart {
            swarm: core.name.clone(),
            prompt: prompt.clone(),
        });
        if let HookAction::Halt(message) = core
            .hooks
            .dispatch(HookEvent::SwarmStart, None, &json!({ "prompt": prompt }))
            .await
        {
            core.observers.cleanup().await;
            return Err(ChatError::HaltedByHook(message));
        }

        let timer = core.execution_timeout.map(|timeout| {
            let cancel = core.cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                cancel.cancel();
            })
        });

        let core_for_run = Arc::clone(core);
        let run_prompt = prompt.clone();
        let result = logstream::with_stream(Arc::clone(&core.stream), async move {
            let lead = core_for_run.primary_chat(&core_for_run.lead).await?;
            let reply = lead.ask(&run_prompt).await?;
            Ok::<String, ChatError>(reply.content.as_text())
        })
        .await;

        if let Some(timer) = timer {
            timer.abort();
        }

        match &result {
            Ok(content) => {
                core.stream.emit(&LogEvent::SwarmStop {
                    swarm: core.name.clone(),
                    content: content.clone(),
                });
                core.hooks
                    .dispatch(HookEvent::SwarmStop, None, &json!({ "content": content }))
                    .await;
            }
            Err(error) => {
                core.stream.emit(&LogEvent::SwarmError {
                    swarm: core.name.clone(),
                    error: error.to_string(),
                });
            }
        }

        core.observers.cleanup().await;
        core.cleanup_mcp_clients().await;
        result
    }

    /// Stops MCP clients and clears delegation caches. Idempotent.
    pub async fn cleanup(&self) {
        self.core.cleanup().await;
    }
}
