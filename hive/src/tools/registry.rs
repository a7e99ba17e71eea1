//! Tool registry: names to factories with declared context requirements.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::scratchpad::Scratchpad;

use super::Tool;

/// What a tool factory needs from the instantiating chat. Instantiation
/// fails fast when a declared requirement is absent from the build context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolRequirement {
    AgentName,
    Directory,
    ScratchpadStorage,
    ChatInstance,
}

impl ToolRequirement {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolRequirement::AgentName => "agent_name",
            ToolRequirement::Directory => "directory",
            ToolRequirement::ScratchpadStorage => "scratchpad_storage",
            ToolRequirement::ChatInstance => "chat_instance",
        }
    }
}

/// Context a factory builds from. Fields are filled by the swarm for the
/// chat being constructed; a factory only sees what it declared.
#[derive(Clone, Default)]
pub struct ToolBuildContext {
    pub agent_name: Option<String>,
    pub directory: Option<PathBuf>,
    pub scratchpad: Option<Arc<Scratchpad>>,
    /// Weak handle to the owning chat, for tools that read the conversation.
    pub chat: Option<std::sync::Weak<crate::chat::AgentChat>>,
}

impl ToolBuildContext {
    fn satisfies(&self, requirement: ToolRequirement) -> bool {
        match requirement {
            ToolRequirement::AgentName => self.agent_name.is_some(),
            ToolRequirement::Directory => self.directory.is_some(),
            ToolRequirement::ScratchpadStorage => self.scratchpad.is_some(),
            ToolRequirement::ChatInstance => self.chat.is_some(),
        }
    }
}

type ToolBuilder =
    Box<dyn Fn(&ToolBuildContext) -> Result<Arc<dyn Tool>, ConfigError> + Send + Sync>;

struct ToolFactory {
    requires: Vec<ToolRequirement>,
    build: ToolBuilder,
}

/// Maps case-sensitive tool names to factories.
///
/// Registration rejects collisions regardless of origin (built-in, plugin,
/// user-registered); instantiation checks the declared requirement set
/// before invoking the factory.
#[derive(Default)]
pub struct ToolRegistry {
    factories: HashMap<String, ToolFactory>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `name`. Fails on collision.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        requires: Vec<ToolRequirement>,
        build: impl Fn(&ToolBuildContext) -> Result<Arc<dyn Tool>, ConfigError>
            + Send
            + Sync
            + 'static,
    ) -> Result<(), ConfigError> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(ConfigError::ToolNameCollision(name));
        }
        self.factories.insert(
            name,
            ToolFactory {
                requires,
                build: Box::new(build),
            },
        );
        Ok(())
    }

    /// Registers a ready-made tool instance that needs nothing from the chat.
    pub fn register_instance(&mut self, tool: Arc<dyn Tool>) -> Result<(), ConfigError> {
        let name = tool.name().to_string();
        self.register(name, Vec::new(), move |_| Ok(Arc::clone(&tool)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Builds the tool `name` for the given context. Fails fast on unknown
    /// names and on missing requirements.
    pub fn instantiate(
        &self,
        name: &str,
        ctx: &ToolBuildContext,
    ) -> Result<Arc<dyn Tool>, ConfigError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ConfigError::UnknownTool(name.to_string()))?;
        for requirement in &factory.requires {
            if !ctx.satisfies(*requirement) {
                return Err(ConfigError::MissingToolRequirement {
                    tool: name.to_string(),
                    requirement: requirement.as_str(),
                });
            }
        }
        (factory.build)(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolContext, ToolError, ToolOutcome, ToolSpec};
    use async_trait::async_trait;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn spec(&self) -> ToolSpec {
            ToolSpec::single_string_arg("echo", "Echo the input", "text", "Text to echo")
        }

        async fn call(
            &self,
            args: serde_json::Value,
            _ctx: &ToolContext,
        ) -> Result<ToolOutcome, ToolError> {
            let text = args.get("text").and_then(|v| v.as_str()).unwrap_or("");
            Ok(ToolOutcome::Text(text.to_string()))
        }
    }

    #[test]
    fn collision_is_rejected_at_registration() {
        let mut registry = ToolRegistry::new();
        registry.register_instance(Arc::new(EchoTool)).unwrap();
        let err = registry.register_instance(Arc::new(EchoTool)).unwrap_err();
        assert!(matches!(err, ConfigError::ToolNameCollision(name) if name == "echo"));
    }

    #[test]
    fn missing_requirement_fails_fast() {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                "scoped",
                vec![ToolRequirement::AgentName, ToolRequirement::ScratchpadStorage],
                |_| Ok(Arc::new(EchoTool) as Arc<dyn Tool>),
            )
            .unwrap();

        let ctx = ToolBuildContext {
            agent_name: Some("worker".into()),
            ..ToolBuildContext::default()
        };
        let err = registry.instantiate("scoped", &ctx).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingToolRequirement {
                requirement: "scratchpad_storage",
                ..
            }
        ));
    }

    #[test]
    fn unknown_tool_is_an_error() {
        let registry = ToolRegistry::new();
        let err = registry
            .instantiate("ghost", &ToolBuildContext::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTool(name) if name == "ghost"));
    }

    #[test]
    fn names_are_sorted() {
        let mut registry = ToolRegistry::new();
        registry
            .register("zeta", vec![], |_| Ok(Arc::new(EchoTool) as Arc<dyn Tool>))
            .unwrap();
        registry
            .register("alpha", vec![], |_| Ok(Arc::new(EchoTool) as Arc<dyn Tool>))
            .unwrap();
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
    }
}
