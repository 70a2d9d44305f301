//! Per-session append-only conversation turn log (spec §4.4).
//!
//! Each session gets a `<sessionId>.jsonl` file under the conversations
//! directory. `append` is the only writer; `load`/`count` read back; `prune`
//! trims the head of the log down to a tail length.

use std::path::{Path, PathBuf};

use ax_domain::error::{Error, Result};
use ax_domain::trace::TraceEvent;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub session_id: String,
    pub seq: u64,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Append-only conversation store. One append lock per process (simple and
/// correct; a given session is never written concurrently by two turns
/// because the sandbox orchestrator holds the per-session lock for the
/// duration of a turn, so the mutex here is defensive, not the primary
/// serialization point).
pub struct ConversationStore {
    base_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl ConversationStore {
    pub fn new(base_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(base_dir).map_err(Error::Io)?;
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.base_dir.join(format!("{}.jsonl", session_id.replace(':', "__")))
    }

    /// Append a single turn, assigning the next `seq` for this session.
    pub fn append(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
        sender: Option<&str>,
    ) -> Result<ConversationTurn> {
        let _guard = self.write_lock.lock();
        let next_seq = self.count(session_id)? as u64;
        let turn = ConversationTurn {
            session_id: session_id.to_string(),
            seq: next_seq,
            role,
            content: content.to_string(),
            sender: sender.map(str::to_string),
            timestamp: Utc::now(),
        };
        self.append_raw(session_id, &[turn.clone()])?;
        Ok(turn)
    }

    /// Append pre-built turns verbatim (used for thread backfill, where
    /// `seq` has already been assigned by the caller).
    pub fn append_raw(&self, session_id: &str, turns: &[ConversationTurn]) -> Result<()> {
        if turns.is_empty() {
            return Ok(());
        }
        use std::io::Write;
        let path = self.path_for(session_id);
        let mut buf = String::new();
        for turn in turns {
            buf.push_str(&serde_json::to_string(turn)?);
            buf.push('\n');
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(Error::Io)?;
        file.write_all(buf.as_bytes()).map_err(Error::Io)?;

        TraceEvent::ConversationAppend {
            session_id: session_id.to_string(),
            turns: turns.len(),
        }
        .emit();
        Ok(())
    }

    /// Load the most recent `limit` turns, in chronological order.
    pub fn load(&self, session_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        let all = self.load_all(session_id)?;
        let start = all.len().saturating_sub(limit);
        Ok(all[start..].to_vec())
    }

    pub fn count(&self, session_id: &str) -> Result<usize> {
        Ok(self.load_all(session_id)?.len())
    }

    fn load_all(&self, session_id: &str) -> Result<Vec<ConversationTurn>> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        let mut turns = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ConversationTurn>(line) {
                Ok(t) => turns.push(t),
                Err(e) => {
                    tracing::warn!(session_id, error = %e, "skipping malformed conversation line");
                }
            }
        }
        Ok(turns)
    }

    /// Trim the log so only the last `keep_tail` turns remain, re-sequenced
    /// from 0.
    pub fn prune(&self, session_id: &str, keep_tail: usize) -> Result<()> {
        let _guard = self.write_lock.lock();
        let all = self.load_all(session_id)?;
        if all.len() <= keep_tail {
            return Ok(());
        }
        let start = all.len() - keep_tail;
        let kept: Vec<ConversationTurn> = all[start..]
            .iter()
            .enumerate()
            .map(|(i, t)| ConversationTurn {
                seq: i as u64,
                ..t.clone()
            })
            .collect();

        let path = self.path_for(session_id);
        let mut buf = String::new();
        for turn in &kept {
            buf.push_str(&serde_json::to_string(turn)?);
            buf.push('\n');
        }
        std::fs::write(&path, buf).map_err(Error::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_load_chronological() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path()).unwrap();
        store.append("s1", Role::User, "hi", None).unwrap();
        store.append("s1", Role::Assistant, "hello", None).unwrap();
        let turns = store.load("s1", 10).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "hi");
        assert_eq!(turns[1].content, "hello");
        assert_eq!(turns[0].seq, 0);
        assert_eq!(turns[1].seq, 1);
    }

    #[test]
    fn prune_trims_to_exact_tail() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path()).unwrap();
        for i in 0..10 {
            store
                .append("s1", Role::User, &format!("turn{i}"), None)
                .unwrap();
        }
        assert_eq!(store.count("s1").unwrap(), 10);
        store.prune("s1", 3).unwrap();
        let turns = store.load("s1", 100).unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].content, "turn7");
        assert_eq!(turns[2].content, "turn9");
        assert_eq!(turns[0].seq, 0);
    }

    #[test]
    fn load_missing_session_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path()).unwrap();
        assert!(store.load("nope", 5).unwrap().is_empty());
    }
}
