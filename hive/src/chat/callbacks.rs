//! Chat event callbacks and around-wrappers.
//!
//! [`ChatCallbacks`] is the per-chat subscription table for the four chat
//! events. The around-wrappers are single installable interceptors for the
//! LLM request and for each tool execution; both receive the call plus an
//! `execute` continuation and may observe, augment, or short-circuit it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::llm::{CompletionResponse, LlmError};
use crate::message::{Message, ToolCall};
use crate::tools::{ToolError, ToolOutcome};

/// Chat-level events exposed to `subscribe`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChatEvent {
    NewMessage,
    EndMessage,
    ToolCall,
    ToolResult,
}

impl ChatEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatEvent::NewMessage => "new_message",
            ChatEvent::EndMessage => "end_message",
            ChatEvent::ToolCall => "tool_call",
            ChatEvent::ToolResult => "tool_result",
        }
    }
}

type ChatCallback = Arc<dyn Fn(&Value) + Send + Sync>;

struct CallbackEntry {
    id: u64,
    event: ChatEvent,
    filter: Option<BTreeMap<String, Value>>,
    #[allow(dead_code)]
    tag: Option<String>,
    callback: ChatCallback,
}

/// Per-chat callback table. Subscriptions fire FIFO per event.
#[derive(Default)]
pub struct ChatCallbacks {
    entries: Mutex<Vec<CallbackEntry>>,
    next_id: AtomicU64,
}

impl ChatCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        self: &Arc<Self>,
        event: ChatEvent,
        filter: Option<BTreeMap<String, Value>>,
        tag: Option<String>,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> CallbackHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(CallbackEntry {
                id,
                event,
                filter,
                tag,
                callback: Arc::new(callback),
            });
        CallbackHandle {
            callbacks: Arc::downgrade(self),
            id,
            active: AtomicBool::new(true),
        }
    }

    fn remove(&self, id: u64) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|e| e.id != id);
    }

    /// Fires all subscriptions for `event` whose filter matches `payload`.
    pub fn fire(&self, event: ChatEvent, payload: &Value) {
        let callbacks: Vec<ChatCallback> = {
            let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries
                .iter()
                .filter(|e| e.event == event)
                .filter(|e| match &e.filter {
                    None => true,
                    Some(filter) => filter.iter().all(|(k, v)| payload.get(k) == Some(v)),
                })
                .map(|e| Arc::clone(&e.callback))
                .collect()
        };
        for callback in callbacks {
            callback(payload);
        }
    }
}

/// Handle returned by `subscribe`; `unsubscribe` is idempotent and
/// thread-safe.
pub struct CallbackHandle {
    callbacks: Weak<ChatCallbacks>,
    id: u64,
    active: AtomicBool,
}

impl CallbackHandle {
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            if let Some(callbacks) = self.callbacks.upgrade() {
                callbacks.remove(self.id);
            }
        }
    }
}

/// Continuation handed to [`AroundLlmRequest::around`]: runs the provider
/// call (with retry) and yields the response.
pub type LlmContinuation = BoxFuture<'static, Result<CompletionResponse, LlmError>>;

/// Single installable wrapper around every LLM request of a chat.
#[async_trait]
pub trait AroundLlmRequest: Send + Sync {
    async fn around(
        &self,
        messages: &[Message],
        execute: LlmContinuation,
    ) -> Result<CompletionResponse, LlmError>;
}

/// Continuation handed to [`AroundToolExecution::around`]: executes the tool
/// body with the given (possibly rewritten) arguments.
pub type ToolContinuation =
    Box<dyn FnOnce(Value) -> BoxFuture<'static, Result<ToolOutcome, ToolError>> + Send>;

/// Single installable wrapper around every tool execution of a chat.
#[async_trait]
pub trait AroundToolExecution: Send + Sync {
    async fn around(
        &self,
        call: &ToolCall,
        execute: ToolContinuation,
    ) -> Result<ToolOutcome, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fires_matching_event_only() {
        let callbacks = Arc::new(ChatCallbacks::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _handle = callbacks.subscribe(ChatEvent::ToolCall, None, None, move |v| {
            sink.lock().unwrap().push(v.clone());
        });

        callbacks.fire(ChatEvent::NewMessage, &json!({"role": "assistant"}));
        callbacks.fire(ChatEvent::ToolCall, &json!({"tool": "bash"}));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["tool"], "bash");
    }

    #[test]
    fn filter_narrows_to_matching_payloads() {
        let callbacks = Arc::new(ChatCallbacks::new());
        let seen = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&seen);
        let filter: BTreeMap<String, Value> = [("tool".to_string(), json!("bash"))]
            .into_iter()
            .collect();
        let _handle =
            callbacks.subscribe(ChatEvent::ToolCall, Some(filter), None, move |_| {
                *sink.lock().unwrap() += 1;
            });

        callbacks.fire(ChatEvent::ToolCall, &json!({"tool": "bash"}));
        callbacks.fire(ChatEvent::ToolCall, &json!({"tool": "read_file"}));
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn unsubscribe_is_idempotent_and_threadsafe() {
        let callbacks = Arc::new(ChatCallbacks::new());
        let seen = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&seen);
        let handle = callbacks.subscribe(ChatEvent::EndMessage, None, None, move |_| {
            *sink.lock().unwrap() += 1;
        });

        let handle = Arc::new(handle);
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let handle = Arc::clone(&handle);
                std::thread::spawn(move || handle.unsubscribe())
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        callbacks.fire(ChatEvent::EndMessage, &json!({}));
        assert_eq!(*seen.lock().unwrap(), 0);
    }
}
