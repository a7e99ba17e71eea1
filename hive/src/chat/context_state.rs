//! Context-window accounting.
//!
//! After each assistant message the engine computes the remaining budget and
//! emits a `context_warning` at most once per configured threshold. An
//! external compactor that rewrites history sets `compression_applied`,
//! which resets the threshold state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Serialized per-agent context state (snapshot `context_state` shape).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextState {
    #[serde(default)]
    pub warning_thresholds_hit: BTreeSet<u8>,
    #[serde(default)]
    pub compression_applied: bool,
    #[serde(default)]
    pub last_todowrite_message_index: Option<usize>,
    #[serde(default)]
    pub active_skill_path: Option<String>,
}

impl ContextState {
    /// Records that an external compactor rewrote history. Threshold state
    /// resets so warnings can fire again against the compacted window.
    pub fn note_compression(&mut self) {
        self.compression_applied = true;
        self.warning_thresholds_hit.clear();
    }
}

/// Context window size and warning thresholds for one agent.
#[derive(Clone, Debug)]
pub struct ContextBudget {
    /// Total token window of the configured model.
    pub window: u64,
    /// Warning thresholds in percent, ascending.
    pub thresholds: Vec<u8>,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            window: 200_000,
            thresholds: vec![50, 80, 95],
        }
    }
}

impl ContextBudget {
    /// Tokens used so far: the latest assistant message's accounting when
    /// present (its input count covers the whole history), otherwise the sum
    /// over all messages.
    pub fn used_tokens(messages: &[Message]) -> u64 {
        let latest = messages
            .iter()
            .rev()
            .find(|m| m.input_tokens.is_some() || m.output_tokens.is_some());
        match latest {
            Some(m) => m.input_tokens.unwrap_or(0) + m.output_tokens.unwrap_or(0),
            None => 0,
        }
    }

    pub fn remaining(&self, used: u64) -> u64 {
        self.window.saturating_sub(used)
    }

    /// Thresholds newly crossed at `used` tokens, recording them in `state`.
    /// Each threshold fires at most once until compression resets the state.
    pub fn crossed(&self, used: u64, state: &mut ContextState) -> Vec<u8> {
        if self.window == 0 {
            return Vec::new();
        }
        let percent_used = used.saturating_mul(100) / self.window;
        let mut fired = Vec::new();
        for &threshold in &self.thresholds {
            if percent_used >= u64::from(threshold)
                && state.warning_thresholds_hit.insert(threshold)
            {
                fired.push(threshold);
            }
        }
        fired
    }
}
