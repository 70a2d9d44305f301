//! Gateway-owned session store.
//!
//! Persists session state in `sessions.json` under the configured state path.
//! Each session key maps to a `SessionEntry` tracking the session ID and
//! origin metadata. A second `last` map (the distinct "Session Store"
//! component) tracks the most recently active channel session per agent, so
//! a scheduled job with no inbound message to anchor to can still resolve
//! where to deliver its output.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use ax_domain::error::{Error, Result};
use ax_domain::trace::TraceEvent;

/// A single session tracked by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub session_key: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub origin: SessionOrigin,
}

/// Origin metadata describing where the session came from.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionOrigin {
    pub channel: Option<String>,
    pub account: Option<String>,
    pub peer: Option<String>,
    pub group: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedState {
    #[serde(default)]
    sessions: HashMap<String, SessionEntry>,
    #[serde(default)]
    last: HashMap<String, String>,
}

/// Gateway-owned session store backed by a JSON file.
pub struct SessionStore {
    sessions_path: PathBuf,
    sessions: RwLock<HashMap<String, SessionEntry>>,
    /// agent_id -> most recently touched session_key for that agent.
    last: RwLock<HashMap<String, String>>,
}

impl SessionStore {
    /// Load or create the session store at `state_path/sessions/sessions.json`.
    pub fn new(state_path: &Path) -> Result<Self> {
        let dir = state_path.join("sessions");
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;

        let sessions_path = dir.join("sessions.json");
        let state: PersistedState = if sessions_path.exists() {
            let raw = std::fs::read_to_string(&sessions_path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            PersistedState::default()
        };

        tracing::info!(
            sessions = state.sessions.len(),
            path = %sessions_path.display(),
            "session store loaded"
        );

        Ok(Self {
            sessions_path,
            sessions: RwLock::new(state.sessions),
            last: RwLock::new(state.last),
        })
    }

    /// Look up a session by its key.
    pub fn get(&self, session_key: &str) -> Option<SessionEntry> {
        self.sessions.read().get(session_key).cloned()
    }

    /// Resolve or create a session for the given key. Returns `(entry, is_new)`.
    pub fn resolve_or_create(
        &self,
        session_key: &str,
        origin: SessionOrigin,
    ) -> (SessionEntry, bool) {
        {
            let sessions = self.sessions.read();
            if let Some(entry) = sessions.get(session_key) {
                return (entry.clone(), false);
            }
        }

        let now = Utc::now();
        let session_id = uuid::Uuid::new_v4().to_string();
        let entry = SessionEntry {
            session_key: session_key.to_owned(),
            session_id: session_id.clone(),
            created_at: now,
            updated_at: now,
            origin,
        };

        let mut sessions = self.sessions.write();
        sessions.insert(session_key.to_owned(), entry.clone());

        TraceEvent::SessionResolved {
            session_key: session_key.to_owned(),
            session_id,
            is_new: true,
        }
        .emit();

        (entry, true)
    }

    /// Record a session reset: mint a new session ID for the same key.
    pub fn reset_session(&self, session_key: &str, reason: &str) -> Option<SessionEntry> {
        let mut sessions = self.sessions.write();
        let entry = sessions.get_mut(session_key)?;

        let old_id = entry.session_id.clone();
        let new_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        entry.session_id = new_id.clone();
        entry.created_at = now;
        entry.updated_at = now;

        TraceEvent::SessionReset {
            session_key: session_key.to_owned(),
            old_session_id: old_id,
            new_session_id: new_id,
            reason: reason.to_owned(),
        }
        .emit();

        Some(entry.clone())
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&self, session_key: &str) {
        let mut sessions = self.sessions.write();
        if let Some(entry) = sessions.get_mut(session_key) {
            entry.updated_at = Utc::now();
        }
    }

    /// List all session entries.
    pub fn list(&self) -> Vec<SessionEntry> {
        self.sessions.read().values().cloned().collect()
    }

    /// Record the most recently active channel session for an agent, for
    /// scheduled-job delivery resolution.
    pub fn set_last(&self, agent_id: &str, session_key: &str) {
        self.last
            .write()
            .insert(agent_id.to_owned(), session_key.to_owned());
    }

    /// Fetch the most recently active channel session for an agent, if any.
    pub fn get_last(&self, agent_id: &str) -> Option<String> {
        self.last.read().get(agent_id).cloned()
    }

    /// Persist the current session state to disk.
    pub fn flush(&self) -> Result<()> {
        let state = PersistedState {
            sessions: self.sessions.read().clone(),
            last: self.last.read().clone(),
        };
        let json = serde_json::to_string_pretty(&state)
            .map_err(|e| Error::Other(format!("serializing sessions: {e}")))?;
        std::fs::write(&self.sessions_path, json).map_err(Error::Io)?;
        Ok(())
    }

    /// Directory in which per-session conversation logs live.
    pub fn conversations_dir(&self) -> PathBuf {
        self.sessions_path
            .parent()
            .unwrap_or(Path::new("."))
            .join("conversations")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_or_create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        let (a, is_new_a) = store.resolve_or_create("k1", SessionOrigin::default());
        assert!(is_new_a);
        let (b, is_new_b) = store.resolve_or_create("k1", SessionOrigin::default());
        assert!(!is_new_b);
        assert_eq!(a.session_id, b.session_id);
    }

    #[test]
    fn reset_session_mints_new_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        let (a, _) = store.resolve_or_create("k1", SessionOrigin::default());
        let reset = store.reset_session("k1", "daily reset").unwrap();
        assert_ne!(a.session_id, reset.session_id);
    }

    #[test]
    fn last_session_tracked_per_agent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        assert!(store.get_last("agent1").is_none());
        store.set_last("agent1", "agent1:discord:main");
        assert_eq!(store.get_last("agent1").unwrap(), "agent1:discord:main");
    }

    #[test]
    fn flush_and_reload_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SessionStore::new(dir.path()).unwrap();
            store.resolve_or_create("k1", SessionOrigin::default());
            store.set_last("agent1", "k1");
            store.flush().unwrap();
        }
        let reloaded = SessionStore::new(dir.path()).unwrap();
        assert!(reloaded.get("k1").is_some());
        assert_eq!(reloaded.get_last("agent1").unwrap(), "k1");
    }
}
