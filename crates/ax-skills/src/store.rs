//! Versioned, revertible skill store.
//!
//! Every applied write (auto-approved or manually approved) snapshots the
//! skill file's prior state into a `.tar.gz` blob under `commits/` before
//! overwriting it, keyed by a monotonic commit id. `revert(commit)` replays
//! that snapshot back onto the skill file, undoing exactly that write.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use ax_domain::error::{Error, Result};
use ax_domain::trace::TraceEvent;

use crate::classifier::{SkillClassifier, Verdict};

fn skill_file_name(skill_name: &str) -> String {
    format!("{skill_name}.md")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitEntry {
    pub commit_id: u64,
    pub skill_name: String,
    pub had_prior_content: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct PendingProposal {
    skill_name: String,
    content: String,
    reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProposeResult {
    pub id: String,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Versioned, revertible skill store rooted at `skills_root`.
pub struct SkillStore {
    skills_root: PathBuf,
    commits_dir: PathBuf,
    classifier: SkillClassifier,
    pending: Mutex<HashMap<String, PendingProposal>>,
    commits: Mutex<Vec<CommitEntry>>,
    next_commit: AtomicU64,
}

impl SkillStore {
    pub fn new(skills_root: &Path) -> Result<Self> {
        std::fs::create_dir_all(skills_root).map_err(Error::Io)?;
        let commits_dir = skills_root.join(".commits");
        std::fs::create_dir_all(&commits_dir).map_err(Error::Io)?;

        Ok(Self {
            skills_root: skills_root.to_path_buf(),
            commits_dir,
            classifier: SkillClassifier::builtin(),
            pending: Mutex::new(HashMap::new()),
            commits: Mutex::new(Vec::new()),
            next_commit: AtomicU64::new(1),
        })
    }

    /// Classify and, depending on verdict, either commit immediately
    /// (`AutoApprove`), queue for human review (`NeedsReview`), or refuse to
    /// write at all (`Reject`).
    pub fn propose(&self, skill_name: &str, content: &str, reason: &str) -> Result<ProposeResult> {
        let verdict = self.classifier.classify(content);

        match verdict {
            Verdict::Reject => {
                TraceEvent::SkillProposalDecided {
                    skill_name: skill_name.to_string(),
                    decision: "reject".into(),
                }
                .emit();
                Ok(ProposeResult {
                    id: skill_name.to_string(),
                    verdict,
                    reason: Some("matched hard-reject pattern".into()),
                })
            }
            Verdict::AutoApprove => {
                let commit_id = self.commit(skill_name, content)?;
                TraceEvent::SkillProposalDecided {
                    skill_name: skill_name.to_string(),
                    decision: "auto_approve".into(),
                }
                .emit();
                Ok(ProposeResult {
                    id: commit_id.to_string(),
                    verdict,
                    reason: None,
                })
            }
            Verdict::NeedsReview => {
                let id = uuid::Uuid::new_v4().to_string();
                self.pending.lock().insert(
                    id.clone(),
                    PendingProposal {
                        skill_name: skill_name.to_string(),
                        content: content.to_string(),
                        reason: reason.to_string(),
                    },
                );
                TraceEvent::SkillProposalDecided {
                    skill_name: skill_name.to_string(),
                    decision: "needs_review".into(),
                }
                .emit();
                Ok(ProposeResult {
                    id,
                    verdict,
                    reason: None,
                })
            }
        }
    }

    /// Commit a pending `NeedsReview` proposal.
    pub fn approve(&self, id: &str) -> Result<u64> {
        let proposal = self
            .pending
            .lock()
            .remove(id)
            .ok_or_else(|| Error::Skill(format!("no pending proposal with id {id}")))?;
        let commit_id = self.commit(&proposal.skill_name, &proposal.content)?;
        TraceEvent::SkillProposalDecided {
            skill_name: proposal.skill_name,
            decision: "approved".into(),
        }
        .emit();
        Ok(commit_id)
    }

    /// Discard a pending `NeedsReview` proposal without writing anything.
    pub fn reject(&self, id: &str) -> Result<()> {
        let proposal = self
            .pending
            .lock()
            .remove(id)
            .ok_or_else(|| Error::Skill(format!("no pending proposal with id {id}")))?;
        TraceEvent::SkillProposalDecided {
            skill_name: proposal.skill_name,
            decision: "rejected".into(),
        }
        .emit();
        Ok(())
    }

    /// Undo an already-applied skill write at commit granularity, restoring
    /// whatever content (or absence) preceded that commit.
    pub fn revert(&self, commit_id: u64) -> Result<()> {
        let entry = {
            let commits = self.commits.lock();
            commits
                .iter()
                .find(|c| c.commit_id == commit_id)
                .cloned()
                .ok_or_else(|| Error::Skill(format!("no such commit {commit_id}")))?
        };

        let target = self.skills_root.join(skill_file_name(&entry.skill_name));
        let snapshot_path = self.snapshot_path(commit_id);

        if !entry.had_prior_content {
            if target.exists() {
                std::fs::remove_file(&target).map_err(Error::Io)?;
            }
            return Ok(());
        }

        let prior = Self::read_snapshot(&snapshot_path, &skill_file_name(&entry.skill_name))?;
        atomic_write(&target, &prior)?;
        Ok(())
    }

    fn commit(&self, skill_name: &str, new_content: &str) -> Result<u64> {
        let target = self.skills_root.join(skill_file_name(skill_name));
        let prior = std::fs::read_to_string(&target).ok();
        let commit_id = self.next_commit.fetch_add(1, Ordering::SeqCst);

        if let Some(prior_content) = &prior {
            self.write_snapshot(commit_id, skill_name, prior_content)?;
        }

        atomic_write(&target, new_content)?;

        self.commits.lock().push(CommitEntry {
            commit_id,
            skill_name: skill_name.to_string(),
            had_prior_content: prior.is_some(),
            timestamp: Utc::now(),
        });

        Ok(commit_id)
    }

    fn snapshot_path(&self, commit_id: u64) -> PathBuf {
        self.commits_dir.join(format!("{commit_id}.tar.gz"))
    }

    fn write_snapshot(&self, commit_id: u64, skill_name: &str, content: &str) -> Result<()> {
        let file = std::fs::File::create(self.snapshot_path(commit_id)).map_err(Error::Io)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, skill_file_name(skill_name), content.as_bytes())
            .map_err(Error::Io)?;
        builder.finish().map_err(Error::Io)?;
        Ok(())
    }

    fn read_snapshot(path: &Path, entry_name: &str) -> Result<String> {
        let file = std::fs::File::open(path).map_err(Error::Io)?;
        let decoder = GzDecoder::new(file);
        let mut archive = tar::Archive::new(decoder);
        for entry in archive.entries().map_err(Error::Io)? {
            let mut entry = entry.map_err(Error::Io)?;
            let path_matches = entry
                .path()
                .map(|p| p.to_string_lossy() == entry_name)
                .unwrap_or(false);
            if path_matches {
                let mut content = String::new();
                entry.read_to_string(&mut content).map_err(Error::Io)?;
                return Ok(content);
            }
        }
        Err(Error::Skill(format!(
            "snapshot {} missing entry {entry_name}",
            path.display()
        )))
    }

    pub fn list_commits(&self) -> Vec<CommitEntry> {
        self.commits.lock().clone()
    }
}

fn atomic_write(target: &Path, content: &str) -> Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(Error::Io)?;
    }
    let tmp = target.with_extension("tmp");
    std::fs::write(&tmp, content).map_err(Error::Io)?;
    std::fs::rename(&tmp, target).map_err(Error::Io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_approve_writes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let store = SkillStore::new(dir.path()).unwrap();
        let result = store
            .propose("summarize", "# Summarize\nRead and summarize.", "initial")
            .unwrap();
        assert_eq!(result.verdict, Verdict::AutoApprove);
        assert!(dir.path().join("summarize.md").exists());
    }

    #[test]
    fn reject_never_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = SkillStore::new(dir.path()).unwrap();
        store
            .propose("danger", "result = eval(x)", "because")
            .unwrap();
        assert!(!dir.path().join("danger.md").exists());
    }

    #[test]
    fn needs_review_queues_until_approved() {
        let dir = tempfile::tempdir().unwrap();
        let store = SkillStore::new(dir.path()).unwrap();
        let result = store
            .propose("fetcher", "requests.get(url)", "needs net")
            .unwrap();
        assert_eq!(result.verdict, Verdict::NeedsReview);
        assert!(!dir.path().join("fetcher.md").exists());

        store.approve(&result.id).unwrap();
        assert!(dir.path().join("fetcher.md").exists());
    }

    #[test]
    fn reject_pending_discards_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let store = SkillStore::new(dir.path()).unwrap();
        let result = store
            .propose("fetcher", "requests.get(url)", "needs net")
            .unwrap();
        store.reject(&result.id).unwrap();
        assert!(!dir.path().join("fetcher.md").exists());
        assert!(store.approve(&result.id).is_err());
    }

    #[test]
    fn revert_restores_prior_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = SkillStore::new(dir.path()).unwrap();
        store.propose("skill", "version one", "v1").unwrap();
        let second = store.propose("skill", "version two", "v2").unwrap();
        let commit_id: u64 = second.id.parse().unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("skill.md")).unwrap(),
            "version two"
        );

        store.revert(commit_id).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("skill.md")).unwrap(),
            "version one"
        );
    }

    #[test]
    fn revert_to_first_commit_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SkillStore::new(dir.path()).unwrap();
        let first = store.propose("skill", "only version", "v1").unwrap();
        let commit_id: u64 = first.id.parse().unwrap();

        store.revert(commit_id).unwrap();
        assert!(!dir.path().join("skill.md").exists());
    }
}
