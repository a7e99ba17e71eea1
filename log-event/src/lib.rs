//! Log event protocol: type + payload + envelope.
//!
//! This crate defines the wire shape of a single orchestration event and the
//! envelope injected into each one (execution id, scope chain, sequence
//! number). It does not depend on hive; hive's `LogStream` serializes
//! [`LogEvent`] into JSON and calls [`to_json`] before fan-out, so every
//! subscriber — in-process collectors, the CLI's NDJSON session log, `watch`
//! tails — sees the same shape.

pub mod envelope;
pub mod event;

pub use envelope::{to_json, Envelope, EnvelopeState};
pub use event::LogEvent;
