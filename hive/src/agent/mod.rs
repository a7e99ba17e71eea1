//! Agent definitions: the declarative configuration surface.
//!
//! An [`AgentDefinition`] is immutable once built. The builder validates
//! fail-fast: bad names, missing working directories, self-delegation and
//! invalid api-version selectors never reach runtime.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::chat::ConcurrencyStrategy;
use crate::error::ConfigError;
use crate::hooks::HookDefinition;
use crate::mcp::McpServerConfig;

/// Default per-turn timeout for an agent.
pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(300);

/// One tool entry of an agent definition: the registry name plus optional
/// per-tool permissions.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ToolConfig {
    pub name: String,
    /// For filesystem tools: paths the tool may touch. Empty means
    /// unrestricted within the working directory.
    pub allowed_paths: Vec<PathBuf>,
}

impl ToolConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            allowed_paths: Vec::new(),
        }
    }
}

/// Provider API selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ApiVersion {
    #[default]
    ChatCompletion,
    Responses,
}

impl std::str::FromStr for ApiVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat_completion" => Ok(ApiVersion::ChatCompletion),
            "responses" => Ok(ApiVersion::Responses),
            other => Err(ConfigError::InvalidApiVersion(other.to_string())),
        }
    }
}

/// Immutable configuration of one agent.
#[derive(Clone, Debug)]
pub struct AgentDefinition {
    pub name: String,
    pub description: Option<String>,
    pub model: String,
    pub provider: Option<String>,
    pub base_url: Option<String>,
    pub api_version: ApiVersion,
    pub temperature: Option<f64>,
    pub reasoning_effort: Option<String>,
    /// Additional provider parameters forwarded verbatim.
    pub provider_params: Map<String, Value>,
    pub headers: Vec<(String, String)>,
    pub system_prompt: Option<String>,
    /// Working directory; must exist when the definition is built.
    pub directory: PathBuf,
    pub tools: Vec<ToolConfig>,
    pub delegates_to: Vec<String>,
    pub mcp_servers: Vec<McpServerConfig>,
    pub hooks: Vec<HookDefinition>,
    /// Per-turn budget for `ask`.
    pub timeout: Duration,
    pub concurrency: ConcurrencyStrategy,
    pub context_window: u64,
    pub warning_thresholds: Vec<u8>,
    pub bypass_permissions: bool,
    pub disable_default_tools: bool,
    pub coding_agent: bool,
    /// When set, one delegation instance serves all callers (`"name@*"`).
    pub shared_across_delegations: bool,
}

impl AgentDefinition {
    pub fn builder(name: impl Into<String>) -> AgentDefinitionBuilder {
        AgentDefinitionBuilder::new(name)
    }
}

/// Builder for [`AgentDefinition`]; `build` validates.
pub struct AgentDefinitionBuilder {
    name: String,
    description: Option<String>,
    model: String,
    provider: Option<String>,
    base_url: Option<String>,
    api_version: ApiVersion,
    temperature: Option<f64>,
    reasoning_effort: Option<String>,
    provider_params: Map<String, Value>,
    headers: Vec<(String, String)>,
    system_prompt: Option<String>,
    directory: Option<PathBuf>,
    tools: Vec<ToolConfig>,
    delegates_to: Vec<String>,
    mcp_servers: Vec<McpServerConfig>,
    hooks: Vec<HookDefinition>,
    timeout: Duration,
    concurrency: ConcurrencyStrategy,
    context_window: u64,
    warning_thresholds: Vec<u8>,
    bypass_permissions: bool,
    disable_default_tools: bool,
    coding_agent: bool,
    shared_across_delegations: bool,
}

impl AgentDefinitionBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            model: "gpt-5-mini".to_string(),
            provider: None,
            base_url: None,
            api_version: ApiVersion::default(),
            temperature: None,
            reasoning_effort: None,
            provider_params: Map::new(),
            headers: Vec::new(),
            system_prompt: None,
            directory: None,
            tools: Vec::new(),
            delegates_to: Vec::new(),
            mcp_servers: Vec::new(),
            hooks: Vec::new(),
            timeout: DEFAULT_AGENT_TIMEOUT,
            concurrency: ConcurrencyStrategy::default(),
            context_window: 200_000,
            warning_thresholds: vec![50, 80, 95],
            bypass_permissions: false,
            disable_default_tools: false,
            coding_agent: false,
            shared_across_delegations: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn api_version(mut self, api_version: ApiVersion) -> Self {
        self.api_version = api_version;
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn reasoning_effort(mut self, effort: impl Into<String>) -> Self {
        self.reasoning_effort = Some(effort.into());
        self
    }

    pub fn provider_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.provider_params.insert(key.into(), value);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn tool(mut self, tool: ToolConfig) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tool_named(self, name: impl Into<String>) -> Self {
        self.tool(ToolConfig::named(name))
    }

    pub fn delegates_to(mut self, targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.delegates_to
            .extend(targets.into_iter().map(Into::into));
        self
    }

    pub fn mcp_server(mut self, server: McpServerConfig) -> Self {
        self.mcp_servers.push(server);
        self
    }

    pub fn hook(mut self, hook: HookDefinition) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn concurrency(mut self, concurrency: ConcurrencyStrategy) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn context_window(mut self, context_window: u64) -> Self {
        self.context_window = context_window;
        self
    }

    pub fn warning_thresholds(mut self, thresholds: Vec<u8>) -> Self {
        self.warning_thresholds = thresholds;
        self
    }

    pub fn bypass_permissions(mut self, on: bool) -> Self {
        self.bypass_permissions = on;
        self
    }

    pub fn disable_default_tools(mut self, on: bool) -> Self {
        self.disable_default_tools = on;
        self
    }

    pub fn coding_agent(mut self, on: bool) -> Self {
        self.coding_agent = on;
        self
    }

    pub fn shared_across_delegations(mut self, on: bool) -> Self {
        self.shared_across_delegations = on;
        self
    }

    /// Validates and produces the immutable definition.
    pub fn build(self) -> Result<AgentDefinition, ConfigError> {
        if self.name.is_empty() || self.name.contains('@') {
            return Err(ConfigError::InvalidAgentName(self.name));
        }
        if self.delegates_to.iter().any(|t| *t == self.name) {
            return Err(ConfigError::SelfDelegation(self.name));
        }
        let directory = match self.directory {
            Some(dir) => dir,
            None => std::env::current_dir().map_err(|_| ConfigError::MissingDirectory {
                agent: self.name.clone(),
                path: ".".to_string(),
            })?,
        };
        if !directory.is_dir() {
            return Err(ConfigError::MissingDirectory {
                agent: self.name,
                path: directory.display().to_string(),
            });
        }
        Ok(AgentDefinition {
            name: self.name,
            description: self.description,
            model: self.model,
            provider: self.provider,
            base_url: self.base_url,
            api_version: self.api_version,
            temperature: self.temperature,
            reasoning_effort: self.reasoning_effort,
            provider_params: self.provider_params,
            headers: self.headers,
            system_prompt: self.system_prompt,
            directory,
            tools: self.tools,
            delegates_to: self.delegates_to,
            mcp_servers: self.mcp_servers,
            hooks: self.hooks,
            timeout: self.timeout,
            concurrency: self.concurrency,
            context_window: self.context_window,
            warning_thresholds: self.warning_thresholds,
            bypass_permissions: self.bypass_permissions,
            disable_default_tools: self.disable_default_tools,
            coding_agent: self.coding_agent,
            shared_across_delegations: self.shared_across_delegations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_applies_defaults() {
        let def = AgentDefinition::builder("worker")
            .directory(std::env::temp_dir())
            .build()
            .unwrap();
        assert_eq!(def.timeout, DEFAULT_AGENT_TIMEOUT);
        assert_eq!(def.concurrency, ConcurrencyStrategy::Sequential);
        assert_eq!(def.warning_thresholds, vec![50, 80, 95]);
        assert!(!def.shared_across_delegations);
    }

    #[test]
    fn name_with_at_sign_is_rejected() {
        let err = AgentDefinition::builder("worker@lead")
            .directory(std::env::temp_dir())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAgentName(_)));

        let err = AgentDefinition::builder("").build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAgentName(_)));
    }

    #[test]
    fn self_delegation_is_rejected() {
        let err = AgentDefinition::builder("lead")
            .directory(std::env::temp_dir())
            .delegates_to(["lead"])
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::SelfDelegation(name) if name == "lead"));
    }

    #[test]
    fn missing_directory_is_rejected() {
        let err = AgentDefinition::builder("worker")
            .directory("/nonexistent/hive/dir")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingDirectory { .. }));
    }

    #[test]
    fn api_version_parses_known_selectors() {
        assert_eq!(
            "responses".parse::<ApiVersion>().unwrap(),
            ApiVersion::Responses
        );
        assert_eq!(
            "chat_completion".parse::<ApiVersion>().unwrap(),
            ApiVersion::ChatCompletion
        );
        assert!(matches!(
            "v9".parse::<ApiVersion>(),
            Err(ConfigError::InvalidApiVersion(_))
        ));
    }
}
