//! Scripted provider: returns canned responses in order.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{ApiShape, CompletionRequest, CompletionResponse, LlmError, Provider};

/// A [`Provider`] that replays a fixed script of responses.
///
/// Each `complete` call pops the next scripted response; when the script is
/// exhausted the last response is repeated (a one-entry script behaves like a
/// constant provider). Received requests are recorded for assertions.
pub struct ScriptedProvider {
    script: Mutex<Vec<CompletionResponse>>,
    received: Mutex<Vec<CompletionRequest>>,
    api_shape: ApiShape,
}

impl ScriptedProvider {
    pub fn new(script: Vec<CompletionResponse>) -> Self {
        Self {
            script: Mutex::new(script),
            received: Mutex::new(Vec::new()),
            api_shape: ApiShape::ChatCompletion,
        }
    }

    /// A provider that always replies with the same text.
    pub fn always(content: impl Into<String>) -> Self {
        Self::new(vec![CompletionResponse::text(content)])
    }

    /// Marks this provider as speaking the stateful responses protocol.
    pub fn stateful(mut self) -> Self {
        self.api_shape = ApiShape::Responses;
        self
    }

    /// Requests seen so far, in call order.
    pub fn received(&self) -> Vec<CompletionRequest> {
        self.received.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of `complete` calls made.
    pub fn call_count(&self) -> usize {
        self.received.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.received
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        if script.is_empty() {
            return Err(LlmError::Api("scripted provider: empty script".into()));
        }
        if script.len() == 1 {
            return Ok(script[0].clone());
        }
        Ok(script.remove(0))
    }

    fn api_shape(&self) -> ApiShape {
        self.api_shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolCall;

    #[tokio::test]
    async fn replays_script_in_order_then_repeats_last() {
        let provider = ScriptedProvider::new(vec![
            CompletionResponse::with_tool_calls(
                "",
                vec![ToolCall::new("1", "lookup", serde_json::json!({}))],
            ),
            CompletionResponse::text("done"),
        ]);
        let first = provider.complete(CompletionRequest::default()).await.unwrap();
        assert_eq!(first.tool_calls.len(), 1);
        let second = provider.complete(CompletionRequest::default()).await.unwrap();
        assert!(second.tool_calls.is_empty());
        let third = provider.complete(CompletionRequest::default()).await.unwrap();
        assert_eq!(third.content.as_text(), "done");
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn records_received_requests() {
        let provider = ScriptedProvider::always("hi");
        let mut req = CompletionRequest::default();
        req.model = "test-model".into();
        provider.complete(req).await.unwrap();
        let received = provider.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].model, "test-model");
    }
}
