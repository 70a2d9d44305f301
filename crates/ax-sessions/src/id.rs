//! Canonical session identifiers.
//!
//! Two shapes are valid: a bare UUID (ephemeral session) or a colon-separated
//! tuple `agent:channel:scope[:thread]` (persistent session) where every
//! segment matches `[A-Za-z0-9_.-]+`. A session ID maps 1:1 to a filesystem
//! workspace path: colons become the OS path separator for the tuple form.
//! Path-traversal segments (`.`, `..`, or anything containing a path
//! separator) are rejected at parse time.

use std::path::{Path, PathBuf};

use ax_domain::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionId {
    Ephemeral(String),
    Persistent { segments: Vec<String> },
}

impl SessionId {
    /// Parse a session ID string, validating its shape.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::SessionId("session id must not be empty".into()));
        }

        if uuid::Uuid::parse_str(raw).is_ok() {
            return Ok(Self::Ephemeral(raw.to_string()));
        }

        let segments: Vec<String> = raw.split(':').map(str::to_string).collect();
        if segments.len() < 3 || segments.len() > 4 {
            return Err(Error::SessionId(format!(
                "expected 3-4 colon-separated segments (agent:channel:scope[:thread]), got {}",
                segments.len()
            )));
        }
        for seg in &segments {
            Self::validate_segment(seg)?;
        }

        Ok(Self::Persistent { segments })
    }

    /// Compose a persistent session ID from its parts.
    pub fn compose(agent: &str, channel: &str, scope: &str, thread: Option<&str>) -> Result<Self> {
        let mut segments = vec![agent.to_string(), channel.to_string(), scope.to_string()];
        if let Some(t) = thread {
            segments.push(t.to_string());
        }
        for seg in &segments {
            Self::validate_segment(seg)?;
        }
        Ok(Self::Persistent { segments })
    }

    fn validate_segment(seg: &str) -> Result<()> {
        if seg.is_empty() || seg == "." || seg == ".." {
            return Err(Error::SessionId(format!(
                "invalid session id segment: {seg:?}"
            )));
        }
        if !seg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
        {
            return Err(Error::SessionId(format!(
                "session id segment contains disallowed characters: {seg:?}"
            )));
        }
        Ok(())
    }

    /// The canonical string form.
    pub fn as_str(&self) -> String {
        match self {
            Self::Ephemeral(s) => s.clone(),
            Self::Persistent { segments } => segments.join(":"),
        }
    }

    /// The workspace directory for this session, relative to `root`.
    pub fn workspace_path(&self, root: &Path) -> PathBuf {
        match self {
            Self::Ephemeral(s) => root.join(s),
            Self::Persistent { segments } => {
                let mut p = root.to_path_buf();
                for seg in segments {
                    p.push(seg);
                }
                p
            }
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Self::Ephemeral(_))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_uuid() {
        let id = SessionId::parse("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert!(id.is_ephemeral());
    }

    #[test]
    fn parses_tuple_without_thread() {
        let id = SessionId::parse("agent1:slack:dm-alice").unwrap();
        assert_eq!(id.as_str(), "agent1:slack:dm-alice");
    }

    #[test]
    fn parses_tuple_with_thread() {
        let id = SessionId::parse("agent1:slack:thread-t1:999").unwrap();
        assert_eq!(id.as_str(), "agent1:slack:thread-t1:999");
    }

    #[test]
    fn rejects_too_few_segments() {
        assert!(SessionId::parse("agent1:slack").is_err());
    }

    #[test]
    fn rejects_too_many_segments() {
        assert!(SessionId::parse("agent1:slack:dm:alice:extra").is_err());
    }

    #[test]
    fn rejects_path_traversal_segment() {
        assert!(SessionId::parse("agent1:..:dm").is_err());
        assert!(SessionId::parse("agent1:.:dm").is_err());
    }

    #[test]
    fn rejects_path_separator_in_segment() {
        assert!(SessionId::parse("agent1:sl/ack:dm").is_err());
    }

    #[test]
    fn compose_then_parse_round_trips() {
        let id = SessionId::compose("agent1", "slack", "dm-alice", Some("t1")).unwrap();
        let reparsed = SessionId::parse(&id.as_str()).unwrap();
        assert_eq!(id, reparsed);
    }

    #[test]
    fn workspace_path_uses_segments_as_components() {
        let id = SessionId::compose("agent1", "slack", "dm-alice", None).unwrap();
        let path = id.workspace_path(Path::new("/data/workspaces"));
        assert_eq!(path, Path::new("/data/workspaces/agent1/slack/dm-alice"));
    }
}
