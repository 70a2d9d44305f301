//! Per-turn workspace lifecycle: directory materialization, skill snapshot
//! refresh, and the background sweep that reclaims old persistent-session
//! workspaces.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ax_domain::error::{Error, Result};
use ax_sessions::SessionId;

/// Materialize the workspace directory for this turn. Persistent sessions
/// reuse the same directory across turns (keyed by the session address);
/// ephemeral sessions get a fresh directory every call since there is no
/// backing store to make reuse meaningful.
pub fn prepare(root: &Path, session_key: &str) -> Result<(PathBuf, bool)> {
    let parsed = SessionId::parse(session_key)?;
    if parsed.is_ephemeral() {
        let dir = root.join(format!("ephemeral-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;
        Ok((dir, true))
    } else {
        let dir = parsed.workspace_path(root);
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;
        Ok((dir, false))
    }
}

/// Mirror every `.md` file from the host's skills directory into the
/// workspace's own skills subdirectory, removing any file the workspace has
/// that the host no longer does. Runs every turn so a newly approved skill
/// is visible on the agent's very next invocation.
pub fn refresh_skills(host_skills_dir: &Path, workspace: &Path) -> Result<PathBuf> {
    let workspace_skills = workspace.join("skills");
    std::fs::create_dir_all(&workspace_skills).map_err(Error::Io)?;

    let mut host_names = std::collections::HashSet::new();
    if host_skills_dir.exists() {
        for entry in std::fs::read_dir(host_skills_dir).map_err(Error::Io)? {
            let entry = entry.map_err(Error::Io)?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let name = entry.file_name();
            host_names.insert(name.clone());
            std::fs::copy(&path, workspace_skills.join(&name)).map_err(Error::Io)?;
        }
    }

    for entry in std::fs::read_dir(&workspace_skills).map_err(Error::Io)? {
        let entry = entry.map_err(Error::Io)?;
        if !host_names.contains(&entry.file_name()) {
            std::fs::remove_file(entry.path()).map_err(Error::Io)?;
        }
    }

    Ok(workspace_skills)
}

/// Remove an ephemeral workspace outright; leave persistent ones for the
/// background sweep in [`prune_stale`].
pub fn cleanup(path: &Path, ephemeral: bool) {
    if ephemeral {
        if let Err(e) = std::fs::remove_dir_all(path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove ephemeral workspace");
        }
    }
}

/// Remove persistent-session workspace directories whose contents haven't
/// been touched in longer than `max_age`. Returns the count removed.
pub fn prune_stale(root: &Path, max_age: Duration) -> Result<usize> {
    if !root.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    let now = std::time::SystemTime::now();
    for entry in walk_leaf_dirs(root)? {
        let modified = std::fs::metadata(&entry)
            .and_then(|m| m.modified())
            .unwrap_or(now);
        let age = now.duration_since(modified).unwrap_or_default();
        if age > max_age {
            if std::fs::remove_dir_all(&entry).is_ok() {
                removed += 1;
            }
        }
    }
    Ok(removed)
}

/// Depth-first collection of directories with no subdirectories — the leaf
/// session workspaces under the nested `agent/channel/scope` layout.
fn walk_leaf_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut leaves = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let mut has_subdir = false;
        for entry in std::fs::read_dir(&current).map_err(Error::Io)? {
            let entry = entry.map_err(Error::Io)?;
            if entry.file_type().map_err(Error::Io)?.is_dir() {
                has_subdir = true;
                stack.push(entry.path());
            }
        }
        if !has_subdir && current != dir {
            leaves.push(current);
        }
    }
    Ok(leaves)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ephemeral_session_gets_fresh_dir_each_call() {
        let dir = tempfile::tempdir().unwrap();
        let ephemeral_key = uuid::Uuid::new_v4().to_string();
        let (a, is_eph_a) = prepare(dir.path(), &ephemeral_key).unwrap();
        let (b, is_eph_b) = prepare(dir.path(), &ephemeral_key).unwrap();
        assert!(is_eph_a && is_eph_b);
        assert_ne!(a, b);
    }

    #[test]
    fn persistent_session_reuses_dir() {
        let dir = tempfile::tempdir().unwrap();
        let key = "agent1:slack:dm-alice";
        let (a, is_eph_a) = prepare(dir.path(), key).unwrap();
        let (b, is_eph_b) = prepare(dir.path(), key).unwrap();
        assert!(!is_eph_a && !is_eph_b);
        assert_eq!(a, b);
    }

    #[test]
    fn skill_refresh_mirrors_and_prunes() {
        let host = tempfile::tempdir().unwrap();
        let workspace = tempfile::tempdir().unwrap();
        std::fs::write(host.path().join("a.md"), "skill a").unwrap();
        let skills_dir = refresh_skills(host.path(), workspace.path()).unwrap();
        assert!(skills_dir.join("a.md").exists());

        std::fs::remove_file(host.path().join("a.md")).unwrap();
        std::fs::write(host.path().join("b.md"), "skill b").unwrap();
        refresh_skills(host.path(), workspace.path()).unwrap();
        assert!(!skills_dir.join("a.md").exists());
        assert!(skills_dir.join("b.md").exists());
    }
}
