//! YAML swarm configuration: schema and conversion to agent definitions.
//!
//! ```yaml
//! version: 2
//! swarm:
//!   name: review team
//!   lead: lead
//!   agents:
//!     lead:
//!       model: gpt-5-mini
//!       system_prompt: Coordinate the team. Use worker for code tasks.
//!       delegates_to: [worker]
//!     worker:
//!       model: gpt-5-mini
//!       directory: ./src
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use hive::{AgentDefinition, ApiVersion, ConcurrencyStrategy, ToolConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("unsupported config version {0} (expected 2)")]
    UnsupportedVersion(u32),
    #[error(transparent)]
    Agent(#[from] hive::ConfigError),
}

/// One agent entry in the YAML file. Everything but `model` is optional.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentEntry {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub reasoning_effort: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub delegates_to: Vec<String>,
    /// Per-turn timeout in seconds.
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Tool concurrency: omitted = sequential; set = task fan-out bound.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    #[serde(default)]
    pub context_window: Option<u64>,
    #[serde(default)]
    pub bypass_permissions: bool,
    #[serde(default)]
    pub disable_default_tools: bool,
    #[serde(default)]
    pub coding_agent: bool,
    #[serde(default)]
    pub shared_across_delegations: bool,
    /// Canned reply for the `scripted` provider (config smoke tests).
    #[serde(default)]
    pub scripted_reply: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SwarmSection {
    pub name: String,
    #[serde(default)]
    pub lead: Option<String>,
    pub agents: BTreeMap<String, AgentEntry>,
}

/// Top-level config document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwarmFile {
    pub version: u32,
    pub swarm: SwarmSection,
}

impl SwarmFile {
    /// Builds validated agent definitions, rooting relative directories at
    /// `root`.
    pub fn definitions(&self, root: &Path) -> Result<Vec<AgentDefinition>, ConfigFileError> {
        let mut definitions = Vec::with_capacity(self.swarm.agents.len());
        for (name, entry) in &self.swarm.agents {
            let mut builder = AgentDefinition::builder(name.clone());
            if let Some(description) = &entry.description {
                builder = builder.description(description.clone());
            }
            if let Some(model) = &entry.model {
                builder = builder.model(model.clone());
            }
            if let Some(provider) = &entry.provider {
                builder = builder.provider(provider.clone());
            }
            if let Some(base_url) = &entry.base_url {
                builder = builder.base_url(base_url.clone());
            }
            if let Some(api_version) = &entry.api_version {
                builder = builder.api_version(api_version.parse::<ApiVersion>()?);
            }
            if let Some(temperature) = entry.temperature {
                builder = builder.temperature(temperature);
            }
            if let Some(effort) = &entry.reasoning_effort {
                builder = builder.reasoning_effort(effort.clone());
            }
            if let Some(env) = &entry.api_key_env {
                builder = builder.provider_param("api_key_env", serde_json::json!(env));
            }
            if let Some(reply) = &entry.scripted_reply {
                builder = builder.provider_param("scripted_reply", serde_json::json!(reply));
            }
            if let Some(prompt) = &entry.system_prompt {
                builder = builder.system_prompt(prompt.clone());
            }
            let directory = match &entry.directory {
                Some(dir) if dir.is_absolute() => dir.clone(),
                Some(dir) => root.join(dir),
                None => root.to_path_buf(),
            };
            builder = builder.directory(directory);
            for tool in &entry.tools {
                builder = builder.tool(ToolConfig::named(tool));
            }
            builder = builder.delegates_to(entry.delegates_to.iter().cloned());
            if let Some(timeout) = entry.timeout {
                builder = builder.timeout(std::time::Duration::from_secs(timeout));
            }
            if let Some(max) = entry.max_concurrency {
                builder = builder.concurrency(ConcurrencyStrategy::Tasks(max));
            }
            if let Some(window) = entry.context_window {
                builder = builder.context_window(window);
            }
            builder = builder
                .bypass_permissions(entry.bypass_permissions)
                .disable_default_tools(entry.disable_default_tools)
                .coding_agent(entry.coding_agent)
                .shared_across_delegations(entry.shared_across_delegations);
            definitions.push(builder.build()?);
        }
        Ok(definitions)
    }
}

/// Loads and version-checks a swarm file.
pub fn load_swarm_file(path: &Path) -> Result<SwarmFile, ConfigFileError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let file: SwarmFile =
        serde_yaml::from_str(&content).map_err(|source| ConfigFileError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    if file.version != 2 {
        return Err(ConfigFileError::UnsupportedVersion(file.version));
    }
    Ok(file)
}

/// The commented starter config written by `hive init`.
pub const STARTER_CONFIG: &str = r#"version: 2
swarm:
  name: my team
  lead: lead
  agents:
    lead:
      description: Coordinates the team
      model: gpt-5-mini
      system_prompt: |
        You are the team lead. Delegate code tasks to worker and
        summarize the results.
      delegates_to: [worker]
    worker:
      description: Implements code changes
      model: gpt-5-mini
      system_prompt: You implement code changes precisely.
      # directory: ./src
      # tools: [bash, read_file, edit_file]
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starter_config_parses_and_builds() {
        let file: SwarmFile = serde_yaml::from_str(STARTER_CONFIG).unwrap();
        assert_eq!(file.version, 2);
        assert_eq!(file.swarm.lead.as_deref(), Some("lead"));

        let defs = file.definitions(&std::env::temp_dir()).unwrap();
        assert_eq!(defs.len(), 2);
        let lead = defs.iter().find(|d| d.name == "lead").unwrap();
        assert_eq!(lead.delegates_to, vec!["worker"]);
    }

    #[test]
    fn unsupported_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hive.yml");
        std::fs::write(&path, "version: 1\nswarm:\n  name: x\n  agents: {}\n").unwrap();
        let err = load_swarm_file(&path).unwrap_err();
        assert!(matches!(err, ConfigFileError::UnsupportedVersion(1)));
    }

    #[test]
    fn unknown_agent_fields_rejected() {
        let yaml = "version: 2\nswarm:\n  name: x\n  agents:\n    a:\n      modl: typo\n";
        let err = serde_yaml::from_str::<SwarmFile>(yaml).unwrap_err();
        assert!(err.to_string().contains("modl"));
    }

    #[test]
    fn relative_directories_root_at_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        let yaml = "version: 2\nswarm:\n  name: x\n  agents:\n    a:\n      directory: ./src\n";
        let file: SwarmFile = serde_yaml::from_str(yaml).unwrap();
        let defs = file.definitions(dir.path()).unwrap();
        assert_eq!(defs[0].directory, dir.path().join("./src"));
    }
}
