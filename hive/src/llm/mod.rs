//! LLM provider abstraction.
//!
//! The chat engine depends on a callable that turns a message history plus a
//! tool list into one assistant message with optional tool calls; this module
//! defines that contract and a scripted mock for tests. Provider HTTP
//! protocols live outside the core; adapters implement [`Provider`] and hand
//! instances to the swarm builder.
//!
//! Two API shapes are supported: chat-completion (stateless; the full history
//! is sent on every call) and responses (stateful; the adapter honors
//! `previous_response_id` and the engine tracks continuity via
//! [`ResponseContinuity`]).

mod continuity;
mod retry;
mod scripted;

pub use continuity::{ResponseContinuity, RESPONSE_ID_TTL};
pub use retry::{complete_with_retry, RetryPolicy};
pub use scripted::ScriptedProvider;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::message::{Message, MessageContent, ToolCall};
use crate::tools::ToolSpec;

/// Which request protocol a provider speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ApiShape {
    /// Stateless chat-completion: full history each call.
    #[default]
    ChatCompletion,
    /// Stateful responses API: supports `previous_response_id` with
    /// server-side retention.
    Responses,
}

/// One completion request. `messages` is the full history for stateless
/// providers; stateful providers may be handed only the delta plus
/// `previous_response_id`.
#[derive(Clone, Debug, Default)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
    pub model: String,
    pub temperature: Option<f64>,
    pub reasoning_effort: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Provider-specific parameters forwarded verbatim.
    pub params: Map<String, Value>,
    /// For [`ApiShape::Responses`] providers: the previous response to
    /// continue from.
    pub previous_response_id: Option<String>,
}

/// One assistant reply from a provider.
#[derive(Clone, Debug)]
pub struct CompletionResponse {
    pub content: MessageContent,
    /// Tool calls in request order; empty means a final reply.
    pub tool_calls: Vec<ToolCall>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub model_id: Option<String>,
    /// Set by stateful providers; feeds [`ResponseContinuity`].
    pub response_id: Option<String>,
}

impl CompletionResponse {
    /// A plain text reply with no tool calls.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: MessageContent::Text(content.into()),
            tool_calls: Vec::new(),
            input_tokens: None,
            output_tokens: None,
            model_id: None,
            response_id: None,
        }
    }

    /// A reply that requests the given tool calls.
    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::text(content)
        }
    }

    pub fn with_usage(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.input_tokens = Some(input_tokens);
        self.output_tokens = Some(output_tokens);
        self
    }

    /// Converts this response into an assistant [`Message`].
    pub fn into_message(self) -> Message {
        let mut msg = Message::assistant_with_tool_calls(self.content, self.tool_calls);
        msg.input_tokens = self.input_tokens;
        msg.output_tokens = self.output_tokens;
        msg.model_id = self.model_id;
        msg.response_id = self.response_id;
        msg
    }
}

/// Provider failures.
///
/// [`LlmError::retryable`] marks the transient subset the HTTP layer retries
/// with exponential backoff (429, 5xx, connection reset); everything else
/// surfaces immediately to the caller of `ask`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("rate limited (429)")]
    RateLimited,
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("connection failed: {0}")]
    Connection(String),
    /// A stateful provider no longer holds the referenced response.
    #[error("previous response not found: {0}")]
    ResponseNotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("api error: {0}")]
    Api(String),
}

impl LlmError {
    /// Whether the retry policy should re-attempt this failure.
    pub fn retryable(&self) -> bool {
        match self {
            LlmError::RateLimited | LlmError::Connection(_) => true,
            LlmError::Server { status, .. } => {
                matches!(status, 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }
}

/// LLM provider: given a request, returns one assistant message and optional
/// tool calls.
///
/// Implementations: [`ScriptedProvider`] (fixed script, tests) and external
/// HTTP adapters. The engine calls this through
/// [`complete_with_retry`] so transient failures back off before surfacing.
#[async_trait]
pub trait Provider: Send + Sync {
    /// One completion round-trip.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// The request protocol this provider speaks. Defaults to stateless
    /// chat-completion.
    fn api_shape(&self) -> ApiShape {
        ApiShape::ChatCompletion
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_covers_the_fixed_status_set() {
        assert!(LlmError::RateLimited.retryable());
        assert!(LlmError::Connection("reset".into()).retryable());
        for status in [500u16, 502, 503, 504] {
            assert!(LlmError::Server {
                status,
                message: String::new()
            }
            .retryable());
        }
        assert!(!LlmError::Server {
            status: 501,
            message: String::new()
        }
        .retryable());
        assert!(!LlmError::InvalidRequest("bad".into()).retryable());
        assert!(!LlmError::ResponseNotFound("resp-1".into()).retryable());
    }

    #[test]
    fn into_message_carries_usage_and_response_id() {
        let mut resp = CompletionResponse::text("done").with_usage(10, 5);
        resp.response_id = Some("resp-9".into());
        let msg = resp.into_message();
        assert_eq!(msg.input_tokens, Some(10));
        assert_eq!(msg.output_tokens, Some(5));
        assert_eq!(msg.response_id.as_deref(), Some("resp-9"));
        assert!(msg.tool_calls.is_none());
    }
}
