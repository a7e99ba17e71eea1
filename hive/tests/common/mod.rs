//! Shared fixtures for integration tests.

use std::sync::Arc;

use async_trait::async_trait;
use hive::{
    AgentDefinition, CompletionRequest, CompletionResponse, LlmError, Provider, Role,
};

/// Provider that echoes the latest user message back as the assistant reply.
#[allow(dead_code)]
pub struct EchoProvider;

#[async_trait]
impl Provider for EchoProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let echo = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_text())
            .unwrap_or_default();
        Ok(CompletionResponse::text(echo))
    }
}

/// An agent definition rooted in the temp directory.
#[allow(dead_code)]
pub fn agent(name: &str) -> AgentDefinition {
    AgentDefinition::builder(name)
        .directory(std::env::temp_dir())
        .build()
        .expect("agent definition")
}

#[allow(dead_code)]
pub fn echo_provider() -> Arc<EchoProvider> {
    Arc::new(EchoProvider)
}
