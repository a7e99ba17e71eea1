//! LogStream: structured event fan-out to subscribers.
//!
//! One stream serves one execution scope. Subscriptions hold (filter,
//! callback, id); emission serializes the event, injects the envelope
//! (execution id, scope, sequence number), and delivers to every matching
//! subscription in registration order. Delivery is synchronous and
//! non-blocking: callbacks must not await; async consumers attach a
//! [`LogCollector`] or forward into a channel.
//!
//! Ordering: within one subscription, delivery order equals emission order;
//! across subscriptions, registration order. Callback panics are caught and
//! logged, never propagated to the emitter.
//!
//! The stream for the current execution is carried in task-local storage
//! (set on swarm entry, cleared on exit) so nested swarms inherit parent
//! subscriptions when `inherit_subscriptions` is on; see [`with_stream`] and
//! [`current`].

mod collector;

pub use collector::LogCollector;

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use log_event::{EnvelopeState, LogEvent};
use serde_json::Value;

type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

struct Subscription {
    id: u64,
    filter: Option<BTreeMap<String, Value>>,
    callback: Callback,
}

struct StreamInner {
    subscriptions: Vec<Subscription>,
    envelope: EnvelopeState,
    next_id: u64,
}

/// Fan-out point for one execution.
pub struct LogStream {
    inner: Mutex<StreamInner>,
    /// Serializes deliveries so sequence numbers and callback order agree.
    delivery: Mutex<()>,
}

impl LogStream {
    pub fn new(execution_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(StreamInner {
                subscriptions: Vec::new(),
                envelope: EnvelopeState::new(execution_id.into()),
                next_id: 1,
            }),
            delivery: Mutex::new(()),
        })
    }

    /// Registers a callback. `filter` is a field-equality map matched against
    /// the serialized event (top-level fields, including `type`).
    pub fn subscribe(
        self: &Arc<Self>,
        filter: Option<BTreeMap<String, Value>>,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscriptions.push(Subscription {
            id,
            filter,
            callback: Arc::new(callback),
        });
        SubscriptionHandle {
            stream: Arc::downgrade(self),
            id,
            active: AtomicBool::new(true),
        }
    }

    fn remove(&self, id: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.subscriptions.retain(|s| s.id != id);
    }

    /// Emits an event under the given scope chain (e.g.
    /// `"exec-1/node:plan/worker@lead"`). Returns the enveloped JSON that was
    /// delivered.
    pub fn emit_scoped(&self, event: &LogEvent, scope: &str) -> Value {
        let _delivery = self.delivery.lock().unwrap_or_else(|e| e.into_inner());
        let (value, subscribers) = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.envelope.scope = scope.to_string();
            let value = log_event::to_json(event, &mut inner.envelope)
                .unwrap_or_else(|e| serde_json::json!({"type": "custom", "error": e.to_string()}));
            let subscribers: Vec<(Option<BTreeMap<String, Value>>, Callback)> = inner
                .subscriptions
                .iter()
                .map(|s| (s.filter.clone(), Arc::clone(&s.callback)))
                .collect();
            (value, subscribers)
        };
        for (filter, callback) in subscribers {
            if !matches_filter(filter.as_ref(), &value) {
                continue;
            }
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| callback(&value)));
            if outcome.is_err() {
                tracing::error!(event = %value["type"], "log subscriber panicked");
            }
        }
        value
    }

    /// Emits an event under the bare execution scope.
    pub fn emit(&self, event: &LogEvent) {
        let scope = {
            let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.envelope.execution_id.clone()
        };
        self.emit_scoped(event, &scope);
    }

    pub fn execution_id(&self) -> String {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.envelope.execution_id.clone()
    }

    /// Rebinds the envelope's execution id. Called by the swarm at the start
    /// of each execution so every event of that run carries its id.
    pub fn set_execution_id(&self, id: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.envelope.execution_id = id.into();
    }

    pub fn subscription_count(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.subscriptions.len()
    }
}

fn matches_filter(filter: Option<&BTreeMap<String, Value>>, event: &Value) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    filter.iter().all(|(k, v)| event.get(k) == Some(v))
}

/// Handle returned by [`LogStream::subscribe`]. `unsubscribe` is idempotent
/// and thread-safe; dropping the handle does not unsubscribe.
pub struct SubscriptionHandle {
    stream: Weak<LogStream>,
    id: u64,
    active: AtomicBool,
}

impl SubscriptionHandle {
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            if let Some(stream) = self.stream.upgrade() {
                stream.remove(self.id);
            }
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

tokio::task_local! {
    static CURRENT_STREAM: Arc<LogStream>;
}

/// Runs `fut` with `stream` as the task-local current stream. Set on swarm
/// entry; nested swarms that inherit subscriptions simply reuse the same
/// stream handle.
pub async fn with_stream<F: std::future::Future>(stream: Arc<LogStream>, fut: F) -> F::Output {
    CURRENT_STREAM.scope(stream, fut).await
}

/// The task-local current stream, when inside an execution.
pub fn current() -> Option<Arc<LogStream>> {
    CURRENT_STREAM.try_with(Arc::clone).ok()
}
