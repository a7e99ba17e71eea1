//! `SWARM_HOME` resolution and the session directory layout.
//!
//! Layout under the home directory:
//!
//! ```text
//! ~/.hive/
//!   sessions/<session-id>/state.json      # final snapshot
//!   sessions/<session-id>/events.ndjson   # structured event log
//!   worktrees/<name>/                     # git worktrees created by `start -w`
//! ```

use std::path::PathBuf;

/// Base directory for sessions and worktrees.
///
/// `SWARM_HOME` when set and non-empty, otherwise `~/.hive`. Falls back to
/// `.hive` in the current directory when no home directory can be resolved.
pub fn swarm_home() -> PathBuf {
    if let Ok(home) = std::env::var("SWARM_HOME") {
        if !home.is_empty() {
            return PathBuf::from(home);
        }
    }
    dirs::home_dir()
        .map(|h| h.join(".hive"))
        .unwrap_or_else(|| PathBuf::from(".hive"))
}

/// `$SWARM_HOME/sessions`.
pub fn sessions_dir() -> PathBuf {
    swarm_home().join("sessions")
}

/// `$SWARM_HOME/sessions/<id>`.
pub fn session_dir(id: &str) -> PathBuf {
    sessions_dir().join(id)
}

/// `$SWARM_HOME/worktrees`.
pub fn worktrees_dir() -> PathBuf {
    swarm_home().join("worktrees")
}
