//! Read tracker: per-agent record of read files, enforcing read-before-edit.
//!
//! File-editing tools must refuse to modify a path the agent has not read in
//! its current form. Each successful read records (resolved path → content
//! digest); the edit-side check compares the digest of the content on disk
//! against the recorded one, so an edit after an external change also fails
//! until the agent re-reads.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use sha2::{Digest, Sha256};

use crate::tools::ToolError;

/// Hex SHA-256 of file content, as stored in the tracker and in snapshots.
pub fn content_digest(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

fn resolve(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Per-agent map of resolved path → content digest. Swarm-scoped; shared by
/// `Arc` handle into every agent's tool context.
#[derive(Debug, Default)]
pub struct ReadTracker {
    agents: DashMap<String, HashMap<PathBuf, String>>,
}

impl ReadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `agent` read `path` with the given content.
    pub fn record_read(&self, agent: &str, path: &Path, content: &[u8]) {
        self.agents
            .entry(agent.to_string())
            .or_default()
            .insert(resolve(path), content_digest(content));
    }

    /// Whether `agent` has read `path` (any version).
    pub fn has_read(&self, agent: &str, path: &Path) -> bool {
        self.agents
            .get(agent)
            .map(|m| m.contains_key(&resolve(path)))
            .unwrap_or(false)
    }

    /// The read-before-edit check. Passes only when `agent` previously read
    /// `path` and the recorded digest matches `current_content`.
    pub fn verify_for_edit(
        &self,
        agent: &str,
        path: &Path,
        current_content: &[u8],
    ) -> Result<(), ToolError> {
        let resolved = resolve(path);
        let recorded = self
            .agents
            .get(agent)
            .and_then(|m| m.get(&resolved).cloned());
        match recorded {
            None => Err(ToolError::ReadRequired(format!(
                "{} has not been read. Use the Read tool on this file before editing it.",
                resolved.display()
            ))),
            Some(digest) if digest != content_digest(current_content) => {
                Err(ToolError::ReadRequired(format!(
                    "{} changed since it was last read. Use the Read tool again before editing.",
                    resolved.display()
                )))
            }
            Some(_) => Ok(()),
        }
    }

    /// Snapshot export: agent → path → digest, fully ordered.
    pub fn export(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        self.agents
            .iter()
            .map(|entry| {
                let paths = entry
                    .value()
                    .iter()
                    .map(|(p, d)| (p.display().to_string(), d.clone()))
                    .collect();
                (entry.key().clone(), paths)
            })
            .collect()
    }

    /// Replaces tracker contents from a snapshot export.
    pub fn import(&self, data: BTreeMap<String, BTreeMap<String, String>>) {
        self.agents.clear();
        for (agent, paths) in data {
            let map = paths
                .into_iter()
                .map(|(p, d)| (PathBuf::from(p), d))
                .collect();
            self.agents.insert(agent, map);
        }
    }

    pub fn clear(&self) {
        self.agents.clear();
    }
}
