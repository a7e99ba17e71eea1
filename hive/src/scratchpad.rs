//! Scratchpad: volatile shared key/value store for inter-agent notes.
//!
//! One scratchpad lives for the lifetime of its swarm. Writes record the
//! writing agent and a timestamp; per-key semantics are last-write-wins.
//! Workflows choose a [`ScratchpadMode`] at construction and the mode cannot
//! change for the swarm's lifetime.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// How a workflow scopes scratchpad storage across nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScratchpadMode {
    /// One store shared by every node.
    #[default]
    Enabled,
    /// A fresh store per node.
    PerNode,
    /// No scratchpad tools at all.
    Disabled,
}

/// One scratchpad entry: value, writer, write time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScratchpadEntry {
    pub value: Value,
    pub agent: String,
    pub ts: DateTime<Utc>,
}

/// Swarm-scoped key/value store. Internally synchronized; handles are shared
/// by `Arc`.
#[derive(Debug, Default)]
pub struct Scratchpad {
    entries: DashMap<String, ScratchpadEntry>,
}

impl Scratchpad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `key`, overwriting any previous entry (last write wins).
    pub fn write(&self, key: impl Into<String>, value: Value, agent: impl Into<String>) {
        self.entries.insert(
            key.into(),
            ScratchpadEntry {
                value,
                agent: agent.into(),
                ts: Utc::now(),
            },
        );
    }

    pub fn read(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|e| e.value.clone())
    }

    pub fn entry(&self, key: &str) -> Option<ScratchpadEntry> {
        self.entries.get(key).map(|e| e.clone())
    }

    /// Sorted list of keys currently present.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Point-in-time copy of all entries, keyed and ordered for snapshots.
    pub fn export(&self) -> BTreeMap<String, ScratchpadEntry> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Replaces the store contents with `entries` (used by restore).
    pub fn import(&self, entries: BTreeMap<String, ScratchpadEntry>) {
        self.entries.clear();
        for (key, entry) in entries {
            self.entries.insert(key, entry);
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
