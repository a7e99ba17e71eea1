//! Blocked-command enforcement for bash-style tools.
//!
//! Commands matching any built-in safety pattern are refused before a
//! subprocess is spawned. The pattern set is fixed at compile time and cannot
//! be overridden by configuration.

use once_cell::sync::Lazy;
use regex::Regex;

use super::ToolError;

/// Default timeout for bash tool executions.
pub const BASH_DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Upper bound a caller-supplied bash timeout is clamped to.
pub const BASH_MAX_TIMEOUT_SECS: u64 = 600;

static BLOCKED_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)\brm\s+(-[a-z]*[rf][a-z]*\s+)+(/|~|\$HOME)(\s|$)", "recursive delete of a root directory"),
        (r"(?i)\bmkfs(\.[a-z0-9]+)?\b", "filesystem format"),
        (r"(?i)\bdd\s+[^|;]*of=/dev/(sd|hd|nvme|disk)", "raw write to a block device"),
        (r"(?i)>\s*/dev/(sd|hd|nvme|disk)", "raw write to a block device"),
        (r"(?i)\bchmod\s+(-[a-z]+\s+)*777\s+/\s*$", "world-writable root"),
        (r":\(\)\s*\{\s*:\|:\s*&\s*\}\s*;", "fork bomb"),
        (r"(?i)\bshutdown\b|\breboot\b|\bhalt\s*$", "host shutdown"),
    ]
    .into_iter()
    .filter_map(|(pattern, label)| Regex::new(pattern).ok().map(|re| (re, label)))
    .collect()
});

/// Checks a command line against the blocked-pattern set.
///
/// Returns `Err(ToolError::Blocked)` with a `SECURITY BLOCK` message when the
/// command matches; the caller must not spawn a subprocess in that case.
pub fn check_command(command: &str) -> Result<(), ToolError> {
    for (pattern, label) in BLOCKED_PATTERNS.iter() {
        if pattern.is_match(command) {
            return Err(ToolError::Blocked(format!(
                "SECURITY BLOCK: command refused ({label}). This restriction cannot be disabled."
            )));
        }
    }
    Ok(())
}

/// Clamps a caller-supplied timeout into the allowed bash range.
pub fn clamp_timeout(requested: Option<u64>) -> u64 {
    requested
        .unwrap_or(BASH_DEFAULT_TIMEOUT_SECS)
        .min(BASH_MAX_TIMEOUT_SECS)
}
