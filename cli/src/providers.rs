//! Provider resolution and the OpenAI-compatible HTTP adapter.
//!
//! The hive core only defines the [`Provider`] contract; this module is the
//! HTTP collaborator. `openai` (the default) speaks the chat-completions
//! wire shape against `base_url`; `scripted` replays a canned reply and
//! exists so configs can be smoke-tested offline.

use std::sync::Arc;

use async_trait::async_trait;
use hive::{
    AgentDefinition, CompletionRequest, CompletionResponse, LlmError, MessageContent, Provider,
    Role, ScriptedProvider, ToolCall,
};
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("unsupported provider {0:?}")]
    Unsupported(String),
    #[error("missing API key: environment variable {0} is not set")]
    MissingApiKey(String),
}

/// Default endpoint for the `openai` provider.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat-completions adapter for OpenAI-compatible servers.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn wire_messages(request: &CompletionRequest) -> Vec<Value> {
        request
            .messages
            .iter()
            .map(|message| {
                let role = message.role.as_str();
                let content = message.content.as_text();
                match message.role {
                    Role::Assistant => {
                        let mut entry = json!({ "role": role, "content": content });
                        if let Some(calls) = &message.tool_calls {
                            entry["tool_calls"] = Value::Array(
                                calls
                                    .iter()
                                    .map(|call| {
                                        json!({
                                            "id": call.id,
                                            "type": "function",
                                            "function": {
                                                "name": call.name,
                                                "arguments": call.arguments.to_string(),
                                            }
                                        })
                                    })
                                    .collect(),
                            );
                        }
                        entry
                    }
                    Role::Tool => json!({
                        "role": "tool",
                        "tool_call_id": message.tool_call_id,
                        "content": content,
                    }),
                    _ => json!({ "role": role, "content": content }),
                }
            })
            .collect()
    }

    fn wire_tools(request: &CompletionRequest) -> Vec<Value> {
        request
            .tools
            .iter()
            .map(|spec| {
                json!({
                    "type": "function",
                    "function": {
                        "name": spec.name,
                        "description": spec.description,
                        "parameters": spec.input_schema,
                    }
                })
            })
            .collect()
    }

    fn parse_tool_calls(message: &Value) -> Vec<ToolCall> {
        message["tool_calls"]
            .as_array()
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|call| {
                        let id = call["id"].as_str()?.to_string();
                        let name = call["function"]["name"].as_str()?.to_string();
                        let raw = call["function"]["arguments"].as_str().unwrap_or("{}");
                        let arguments = serde_json::from_str(raw)
                            .unwrap_or_else(|_| Value::String(raw.to_string()));
                        Some(ToolCall::new(id, name, arguments))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let mut body = json!({
            "model": request.model,
            "messages": Self::wire_messages(&request),
        });
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(Self::wire_tools(&request));
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(effort) = &request.reasoning_effort {
            body["reasoning_effort"] = json!(effort);
        }
        for (key, value) in &request.params {
            if key != "api_key_env" && key != "scripted_reply" {
                body[key.as_str()] = value.clone();
            }
        }

        let mut http = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body);
        for (name, value) in &request.headers {
            http = http.header(name, value);
        }

        let response = http.send().await.map_err(|err| {
            if err.is_connect() || err.is_timeout() {
                LlmError::Connection(err.to_string())
            } else {
                LlmError::Api(err.to_string())
            }
        })?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|err| LlmError::Api(err.to_string()))?;

        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited);
        }
        if status.is_server_error() {
            return Err(LlmError::Server {
                status: status.as_u16(),
                message: payload["error"]["message"]
                    .as_str()
                    .unwrap_or("server error")
                    .to_string(),
            });
        }
        if !status.is_success() {
            return Err(LlmError::InvalidRequest(
                payload["error"]["message"]
                    .as_str()
                    .unwrap_or("request rejected")
                    .to_string(),
            ));
        }

        let message = &payload["choices"][0]["message"];
        Ok(CompletionResponse {
            content: MessageContent::Text(
                message["content"].as_str().unwrap_or_default().to_string(),
            ),
            tool_calls: Self::parse_tool_calls(message),
            input_tokens: payload["usage"]["prompt_tokens"].as_u64(),
            output_tokens: payload["usage"]["completion_tokens"].as_u64(),
            model_id: payload["model"].as_str().map(str::to_string),
            response_id: payload["id"].as_str().map(str::to_string),
        })
    }
}

/// Resolves the provider for one agent definition.
///
/// - `openai` (default): chat-completions against `base_url` (or
///   `$OPENAI_BASE_URL`, or the public endpoint), key from the env var named
///   by `api_key_env` (default `OPENAI_API_KEY`).
/// - `scripted`: replays `scripted_reply` (default `"ok"`); no network.
pub fn resolve_provider(definition: &AgentDefinition) -> Result<Arc<dyn Provider>, ProviderError> {
    match definition.provider.as_deref().unwrap_or("openai") {
        "scripted" => {
            let reply = definition
                .provider_params
                .get("scripted_reply")
                .and_then(|v| v.as_str())
                .unwrap_or("ok");
            Ok(Arc::new(ScriptedProvider::always(reply)))
        }
        "openai" | "openai_compatible" => {
            let base_url = definition
                .base_url
                .clone()
                .or_else(|| std::env::var("OPENAI_BASE_URL").ok())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
            let key_var = definition
                .provider_params
                .get("api_key_env")
                .and_then(|v| v.as_str())
                .unwrap_or("OPENAI_API_KEY")
                .to_string();
            let api_key =
                std::env::var(&key_var).map_err(|_| ProviderError::MissingApiKey(key_var))?;
            Ok(Arc::new(OpenAiCompatProvider::new(base_url, api_key)))
        }
        other => Err(ProviderError::Unsupported(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive::Message;

    fn request_with(messages: Vec<Message>) -> CompletionRequest {
        CompletionRequest {
            messages,
            model: "test-model".into(),
            ..CompletionRequest::default()
        }
    }

    #[test]
    fn wire_messages_cover_all_roles() {
        let mut assistant = Message::assistant_with_tool_calls(
            "thinking",
            vec![ToolCall::new("c1", "lookup", json!({"q": "x"}))],
        );
        assistant.model_id = Some("m".into());
        let wire = OpenAiCompatProvider::wire_messages(&request_with(vec![
            Message::system("sys"),
            Message::user("hi"),
            assistant,
            Message::tool_result("c1", "found"),
        ]));
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[2]["tool_calls"][0]["function"]["name"], "lookup");
        assert_eq!(
            wire[2]["tool_calls"][0]["function"]["arguments"],
            "{\"q\":\"x\"}"
        );
        assert_eq!(wire[3]["role"], "tool");
        assert_eq!(wire[3]["tool_call_id"], "c1");
    }

    #[test]
    fn parse_tool_calls_decodes_argument_strings() {
        let message = json!({
            "tool_calls": [{
                "id": "c9",
                "type": "function",
                "function": { "name": "worker", "arguments": "{\"prompt\":\"go\"}" }
            }]
        });
        let calls = OpenAiCompatProvider::parse_tool_calls(&message);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments["prompt"], "go");
    }

    #[test]
    fn scripted_provider_resolves_without_network() {
        let def = AgentDefinition::builder("a")
            .directory(std::env::temp_dir())
            .provider("scripted")
            .provider_param("scripted_reply", json!("canned"))
            .build()
            .unwrap();
        assert!(resolve_provider(&def).is_ok());
    }

    #[test]
    fn unsupported_provider_is_an_error() {
        let def = AgentDefinition::builder("a")
            .directory(std::env::temp_dir())
            .provider("carrier-pigeon")
            .build()
            .unwrap();
        assert!(matches!(
            resolve_provider(&def),
            Err(ProviderError::Unsupported(_))
        ));
    }
}
