//! Response continuity for stateful providers.
//!
//! Providers speaking the responses protocol retain conversation state server
//! side and accept a `previous_response_id`. Server retention is bounded, so
//! the client discards ids older than [`RESPONSE_ID_TTL`] and falls back to
//! the stateless form. Two consecutive "not found" errors disable continuity
//! for the remainder of the session.

use std::time::{Duration, Instant};

/// Client-side guard against server-side response expiry.
pub const RESPONSE_ID_TTL: Duration = Duration::from_secs(300);

/// Strikes before continuity is disabled for the session.
const MAX_NOT_FOUND_STRIKES: u8 = 2;

/// Tracks the latest response id, its age, and the not-found strike counter.
#[derive(Debug, Default)]
pub struct ResponseContinuity {
    latest: Option<(String, Instant)>,
    strikes: u8,
    disabled: bool,
}

impl ResponseContinuity {
    pub fn new() -> Self {
        Self::default()
    }

    /// The response id to continue from, if continuity is enabled and the id
    /// is younger than [`RESPONSE_ID_TTL`]. An expired id is discarded.
    pub fn previous_response_id(&mut self) -> Option<String> {
        if self.disabled {
            return None;
        }
        match &self.latest {
            Some((id, recorded)) if recorded.elapsed() < RESPONSE_ID_TTL => Some(id.clone()),
            Some(_) => {
                self.latest = None;
                None
            }
            None => None,
        }
    }

    /// Records a fresh response id and clears the strike counter.
    pub fn record(&mut self, response_id: impl Into<String>) {
        if self.disabled {
            return;
        }
        self.latest = Some((response_id.into(), Instant::now()));
        self.strikes = 0;
    }

    /// Notes a "previous response not found" failure. Returns `true` when
    /// continuity is now disabled for the session.
    pub fn note_not_found(&mut self) -> bool {
        self.latest = None;
        self.strikes = self.strikes.saturating_add(1);
        if self.strikes >= MAX_NOT_FOUND_STRIKES {
            self.disabled = true;
        }
        self.disabled
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    #[cfg(test)]
    fn backdate(&mut self, age: Duration) {
        if let Some((_, recorded)) = &mut self.latest {
            *recorded = Instant::now() - age;
        }
    }
}
