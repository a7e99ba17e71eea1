//! Envelope (execution_id, scope, event_id) injected into each event.
//! EnvelopeState tracks the current scope chain and issues sequence numbers.

use crate::event::LogEvent;
use serde_json::Value;

/// Envelope fields attached to every emitted event.
#[derive(Clone, Debug, Default)]
pub struct Envelope {
    /// Execution ID; constant within one `Swarm::execute` run.
    pub execution_id: Option<String>,
    /// Scope chain for the emitting context, e.g.
    /// `"exec-1/node:plan/worker@lead"`. Grows as workflow nodes and
    /// delegations nest.
    pub scope: Option<String>,
    /// Per-event sequence number; monotonically increasing within a stream.
    pub event_id: Option<u64>,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_execution_id(mut self, id: impl Into<String>) -> Self {
        self.execution_id = Some(id.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_event_id(mut self, id: u64) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Merges envelope fields into the given JSON object (top-level only).
    /// Does not overwrite existing keys.
    pub fn inject_into(&self, obj: &mut Value) {
        let Some(obj) = obj.as_object_mut() else {
            return;
        };
        if let Some(ref id) = self.execution_id {
            obj.entry("execution_id")
                .or_insert_with(|| Value::String(id.clone()));
        }
        if let Some(ref scope) = self.scope {
            obj.entry("scope")
                .or_insert_with(|| Value::String(scope.clone()));
        }
        if let Some(id) = self.event_id {
            obj.entry("event_id")
                .or_insert_with(|| Value::Number(serde_json::Number::from(id)));
        }
    }
}

/// Envelope state for one execution: execution_id, current scope, next event_id.
pub struct EnvelopeState {
    pub execution_id: String,
    pub scope: String,
    pub next_event_id: u64,
}

impl EnvelopeState {
    pub fn new(execution_id: String) -> Self {
        let scope = execution_id.clone();
        Self {
            execution_id,
            scope,
            next_event_id: 1,
        }
    }

    /// Pushes a scope segment (e.g. `"node:plan"` or `"worker@lead"`).
    pub fn push_scope(&mut self, segment: &str) {
        self.scope.push('/');
        self.scope.push_str(segment);
    }

    /// Injects the envelope into the event value and advances the sequence.
    pub fn inject_into(&mut self, value: &mut Value) {
        let env = Envelope::new()
            .with_execution_id(&self.execution_id)
            .with_scope(&self.scope)
            .with_event_id(self.next_event_id);
        self.next_event_id += 1;
        env.inject_into(value);
    }
}

/// Converts an event to JSON and injects the envelope using the given state.
/// Returns the final value (type + payload + execution_id, scope, event_id).
pub fn to_json(event: &LogEvent, state: &mut EnvelopeState) -> Result<Value, serde_json::Error> {
    let mut value = event.to_value()?;
    state.inject_into(&mut value);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_inject() {
        let mut obj = serde_json::json!({"type": "node_start", "node": "plan"});
        let env = Envelope::new()
            .with_execution_id("exec-1")
            .with_scope("exec-1/node:plan")
            .with_event_id(1);
        env.inject_into(&mut obj);
        assert_eq!(obj["execution_id"], "exec-1");
        assert_eq!(obj["scope"], "exec-1/node:plan");
        assert_eq!(obj["event_id"], 1);
        assert_eq!(obj["type"], "node_start");
    }

    #[test]
    fn to_json_injects_and_advances_sequence() {
        let ev = LogEvent::NodeStart { node: "plan".into() };
        let mut state = EnvelopeState::new("exec-42".to_string());
        let first = to_json(&ev, &mut state).unwrap();
        let second = to_json(&ev, &mut state).unwrap();
        assert_eq!(first["event_id"], 1);
        assert_eq!(second["event_id"], 2);
        assert_eq!(first["execution_id"], "exec-42");
    }

    #[test]
    fn push_scope_grows_chain() {
        let mut state = EnvelopeState::new("exec-1".to_string());
        state.push_scope("node:build");
        state.push_scope("worker@lead");
        let ev = LogEvent::NodeStop { node: "build".into() };
        let v = to_json(&ev, &mut state).unwrap();
        assert_eq!(v["scope"], "exec-1/node:build/worker@lead");
    }
}
