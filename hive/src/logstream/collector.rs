//! LogCollector: buffers matching events for later inspection.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use super::{LogStream, SubscriptionHandle};

/// Buffers every event matching a filter. Used by `watch`-style consumers
/// and tests that assert on emission order.
pub struct LogCollector {
    events: Arc<Mutex<Vec<Value>>>,
    handle: SubscriptionHandle,
}

impl LogCollector {
    /// Attaches a collector to `stream`. `filter` has the same field-equality
    /// semantics as [`LogStream::subscribe`].
    pub fn attach(stream: &Arc<LogStream>, filter: Option<BTreeMap<String, Value>>) -> Self {
        let events: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let handle = stream.subscribe(filter, move |event| {
            sink.lock().unwrap_or_else(|e| e.into_inner()).push(event.clone());
        });
        Self { events, handle }
    }

    /// Collects only events of the given `type` tag.
    pub fn attach_for_type(stream: &Arc<LogStream>, type_tag: &str) -> Self {
        let filter = [("type".to_string(), Value::String(type_tag.to_string()))]
            .into_iter()
            .collect();
        Self::attach(stream, Some(filter))
    }

    /// A copy of everything collected so far, in delivery order.
    pub fn events(&self) -> Vec<Value> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Removes and returns everything collected so far.
    pub fn drain(&self) -> Vec<Value> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops collecting. Idempotent.
    pub fn detach(&self) {
        self.handle.unsubscribe();
    }
}

impl Drop for LogCollector {
    fn drop(&mut self) {
        self.handle.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log_event::LogEvent;

    #[test]
    fn collects_matching_events_and_drains() {
        let stream = LogStream::new("exec-1");
        let collector = LogCollector::attach_for_type(&stream, "node_stop");

        stream.emit(&LogEvent::NodeStart { node: "a".into() });
        stream.emit(&LogEvent::NodeStop { node: "a".into() });
        stream.emit(&LogEvent::NodeStop { node: "b".into() });

        assert_eq!(collector.len(), 2);
        let drained = collector.drain();
        assert_eq!(drained[0]["node"], "a");
        assert_eq!(drained[1]["node"], "b");
        assert!(collector.is_empty());
    }

    #[test]
    fn detach_stops_collection() {
        let stream = LogStream::new("exec-1");
        let collector = LogCollector::attach(&stream, None);
        collector.detach();
        stream.emit(&LogEvent::NodeStart { node: "a".into() });
        assert!(collector.is_empty());
    }
}
