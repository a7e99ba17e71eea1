//! Session store: one directory per execution under `$SWARM_HOME/sessions`.
//!
//! ```text
//! <root>/<session-id>/session.json   # record: swarm, prompt, status, result
//! <root>/<session-id>/state.json     # final snapshot
//! <root>/<session-id>/events.ndjson  # structured event log, one JSON per line
//! ```

use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session {0:?} not found")]
    NotFound(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Metadata for one session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub swarm: String,
    pub config_path: Option<PathBuf>,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
    /// `running`, `done`, or `failed`.
    pub status: String,
    pub result: Option<String>,
}

/// Filesystem-backed session store.
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    /// Opens the store at `root`, defaulting to `$SWARM_HOME/sessions`.
    pub fn open(root: Option<PathBuf>) -> Self {
        Self {
            root: root.unwrap_or_else(config::sessions_dir),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Creates a session directory and its initial record.
    pub fn create(
        &self,
        id: Option<String>,
        swarm: &str,
        config_path: Option<PathBuf>,
        prompt: &str,
    ) -> Result<SessionRecord, SessionError> {
        let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        let record = SessionRecord {
            id: id.clone(),
            swarm: swarm.to_string(),
            config_path,
            prompt: prompt.to_string(),
            created_at: Utc::now(),
            status: "running".to_string(),
            result: None,
        };
        std::fs::create_dir_all(self.dir(&id))?;
        self.write_record(&record)?;
        Ok(record)
    }

    pub fn write_record(&self, record: &SessionRecord) -> Result<(), SessionError> {
        let path = self.dir(&record.id).join("session.json");
        std::fs::write(path, serde_json::to_string_pretty(record)?)?;
        Ok(())
    }

    pub fn read_record(&self, id: &str) -> Result<SessionRecord, SessionError> {
        let path = self.dir(id).join("session.json");
        if !path.exists() {
            return Err(SessionError::NotFound(id.to_string()));
        }
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }

    pub fn write_snapshot(&self, id: &str, snapshot: &hive::Snapshot) -> Result<(), SessionError> {
        let path = self.dir(id).join("state.json");
        std::fs::write(path, serde_json::to_string_pretty(snapshot)?)?;
        Ok(())
    }

    pub fn read_snapshot(&self, id: &str) -> Result<hive::Snapshot, SessionError> {
        let path = self.dir(id).join("state.json");
        if !path.exists() {
            return Err(SessionError::NotFound(id.to_string()));
        }
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }

    /// Appends one event line to the session's NDJSON log.
    pub fn append_event(&self, id: &str, event: &Value) -> Result<(), SessionError> {
        let path = self.dir(id).join("events.ndjson");
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{event}")?;
        Ok(())
    }

    pub fn events_path(&self, id: &str) -> PathBuf {
        self.dir(id).join("events.ndjson")
    }

    /// All session records, newest first.
    pub fn list(&self) -> Result<Vec<SessionRecord>, SessionError> {
        let mut records = Vec::new();
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Ok(records);
        };
        for entry in entries.flatten() {
            let id = entry.file_name().to_string_lossy().to_string();
            if let Ok(record) = self.read_record(&id) {
                records.push(record);
            }
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Removes finished sessions; returns how many were deleted.
    pub fn clean(&self) -> Result<usize, SessionError> {
        let mut removed = 0;
        for record in self.list()? {
            if record.status != "running" {
                std::fs::remove_dir_all(self.dir(&record.id))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(Some(dir.path().to_path_buf()));
        (dir, store)
    }

    #[test]
    fn create_read_update_cycle() {
        let (_dir, store) = store();
        let mut record = store.create(None, "team", None, "hello").unwrap();
        assert_eq!(record.status, "running");

        record.status = "done".to_string();
        record.result = Some("answer".to_string());
        store.write_record(&record).unwrap();

        let read = store.read_record(&record.id).unwrap();
        assert_eq!(read.status, "done");
        assert_eq!(read.result.as_deref(), Some("answer"));
    }

    #[test]
    fn events_append_as_ndjson_lines() {
        let (_dir, store) = store();
        let record = store.create(Some("s1".into()), "team", None, "p").unwrap();
        store
            .append_event(&record.id, &json!({"type": "swarm_start"}))
            .unwrap();
        store
            .append_event(&record.id, &json!({"type": "swarm_stop"}))
            .unwrap();

        let content = std::fs::read_to_string(store.events_path("s1")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("swarm_start"));
    }

    #[test]
    fn clean_removes_only_finished_sessions() {
        let (_dir, store) = store();
        let mut done = store.create(Some("done1".into()), "team", None, "p").unwrap();
        done.status = "done".to_string();
        store.write_record(&done).unwrap();
        store.create(Some("live1".into()), "team", None, "p").unwrap();

        let removed = store.clean().unwrap();
        assert_eq!(removed, 1);
        assert!(store.read_record("live1").is_ok());
        assert!(matches!(
            store.read_record("done1"),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn missing_session_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(
            store.read_record("ghost"),
            Err(SessionError::NotFound(_))
        ));
    }
}
