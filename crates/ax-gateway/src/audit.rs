//! Append-only security audit log. Distinct from [`ax_domain::trace`]'s
//! structured log events: those are for operators tailing stdout, this is
//! the durable record the `audit_query` IPC action and the admin surface
//! read back from disk.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ax_domain::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<String>,
    pub event: String,
    #[serde(default)]
    pub detail: Value,
}

pub struct AuditLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    pub fn record(&self, session_id: Option<&str>, event: &str, detail: Value) -> Result<()> {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            session_id: session_id.map(str::to_string),
            event: event.to_string(),
            detail,
        };
        let line = serde_json::to_string(&entry)?;

        let _guard = self.write_lock.lock();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(Error::Io)?;
        writeln!(file, "{line}").map_err(Error::Io)?;
        Ok(())
    }

    /// Return the most recent `limit` entries, optionally filtered to one
    /// session, newest first.
    pub fn query(&self, session_id: Option<&str>, limit: usize) -> Result<Vec<AuditEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path).map_err(Error::Io)?;
        let mut matched: Vec<AuditEntry> = raw
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<AuditEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed audit line");
                    None
                }
            })
            .filter(|entry| match session_id {
                Some(sid) => entry.session_id.as_deref() == Some(sid),
                None => true,
            })
            .collect();
        matched.reverse();
        matched.truncate(limit);
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_query_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(&dir.path().join("audit.jsonl")).unwrap();
        log.record(Some("s1"), "session_blocked", serde_json::json!({"reason": "scanner"})).unwrap();
        log.record(Some("s2"), "skill_approved", serde_json::json!({})).unwrap();

        let all = log.query(None, 10).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].event, "skill_approved"); // newest first

        let s1_only = log.query(Some("s1"), 10).unwrap();
        assert_eq!(s1_only.len(), 1);
        assert_eq!(s1_only[0].event, "session_blocked");
    }

    #[test]
    fn query_empty_log_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(&dir.path().join("audit.jsonl")).unwrap();
        assert!(log.query(None, 10).unwrap().is_empty());
    }
}
