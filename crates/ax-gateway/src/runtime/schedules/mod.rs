//! Scheduled-delivery store: cron-recurring and one-shot jobs that cause a
//! message to be synthesized and routed through [`crate::router::process_inbound`]
//! at a future time, so a scheduled job enters the trust boundary exactly like
//! any externally-sourced message instead of bypassing it.
//!
//! UTC only — no per-job timezone. A job's `cron` field is a standard 5-field
//! expression (`min hour dom month dow`) evaluated against the wall clock in
//! UTC.

mod cron;

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ax_domain::error::{Error, Result};

pub use cron::{cron_matches, cron_next, validate_cron};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Cron,
    RunAt,
}

/// The explicit address half of a channel delivery target: a specific
/// provider/scope/identifier triple rather than "wherever the agent was
/// last seen".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAddress {
    pub provider: String,
    pub scope: String,
    #[serde(default)]
    pub identifiers: HashMap<String, String>,
}

/// Either the literal target `"last"` (the agent's most recently active
/// channel session) or an explicit address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeliveryTarget {
    Named(String),
    Address(SessionAddress),
}

impl DeliveryTarget {
    pub fn is_last(&self) -> bool {
        matches!(self, DeliveryTarget::Named(s) if s == "last")
    }
}

/// Where a scheduled job's output goes once it fires: a channel session
/// (explicit address or the agent's last seen channel) or an internal log
/// with no outbound delivery at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Delivery {
    Channel { target: DeliveryTarget },
    Log,
}

impl Delivery {
    pub fn last_channel() -> Self {
        Delivery::Channel {
            target: DeliveryTarget::Named("last".to_string()),
        }
    }
}

fn default_delivery() -> Delivery {
    Delivery::last_channel()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: String,
    pub agent_id: String,
    pub kind: JobKind,
    /// Cron expression for [`JobKind::Cron`] jobs, `None` for `RunAt`.
    pub cron: Option<String>,
    /// Fire time for [`JobKind::RunAt`] jobs, `None` for `Cron`.
    pub run_at: Option<DateTime<Utc>>,
    pub task: String,
    #[serde(default = "default_delivery")]
    pub delivery: Delivery,
    pub created_at: DateTime<Utc>,
    pub last_fired_at: Option<DateTime<Utc>>,
    /// `RunAt` jobs are removed from the store once fired; this is set just
    /// before removal so a concurrent `list` doesn't also return it as due.
    #[serde(default)]
    pub consumed: bool,
}

pub struct ScheduleStore {
    jobs: RwLock<HashMap<String, ScheduledJob>>,
    persist_path: PathBuf,
}

impl ScheduleStore {
    pub fn new(state_path: &std::path::Path) -> Result<Self> {
        let persist_path = state_path.join("schedules.json");
        let jobs = if persist_path.exists() {
            let raw = std::fs::read_to_string(&persist_path).map_err(Error::Io)?;
            let list: Vec<ScheduledJob> = serde_json::from_str(&raw).unwrap_or_default();
            list.into_iter().map(|j| (j.id.clone(), j)).collect()
        } else {
            HashMap::new()
        };
        Ok(Self {
            jobs: RwLock::new(jobs),
            persist_path,
        })
    }

    fn persist(&self) -> Result<()> {
        let jobs = self.jobs.read();
        let list: Vec<&ScheduledJob> = jobs.values().collect();
        let json = serde_json::to_string_pretty(&list)?;
        if let Some(parent) = self.persist_path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }
        std::fs::write(&self.persist_path, json).map_err(Error::Io)?;
        Ok(())
    }

    pub fn add_cron(&self, agent_id: &str, cron_expr: &str, task: &str, delivery: Delivery) -> Result<ScheduledJob> {
        validate_cron(cron_expr)?;
        let job = ScheduledJob {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            kind: JobKind::Cron,
            cron: Some(cron_expr.to_string()),
            run_at: None,
            task: task.to_string(),
            delivery,
            created_at: Utc::now(),
            last_fired_at: None,
            consumed: false,
        };
        self.jobs.write().insert(job.id.clone(), job.clone());
        self.persist()?;
        Ok(job)
    }

    pub fn add_run_at(&self, agent_id: &str, run_at: DateTime<Utc>, task: &str, delivery: Delivery) -> Result<ScheduledJob> {
        let job = ScheduledJob {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            kind: JobKind::RunAt,
            cron: None,
            run_at: Some(run_at),
            task: task.to_string(),
            delivery,
            created_at: Utc::now(),
            last_fired_at: None,
            consumed: false,
        };
        self.jobs.write().insert(job.id.clone(), job.clone());
        self.persist()?;
        Ok(job)
    }

    pub fn remove(&self, job_id: &str) -> Result<bool> {
        let removed = self.jobs.write().remove(job_id).is_some();
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn list(&self, agent_id: Option<&str>) -> Vec<ScheduledJob> {
        let jobs = self.jobs.read();
        let mut out: Vec<ScheduledJob> = jobs
            .values()
            .filter(|j| !j.consumed)
            .filter(|j| match agent_id {
                Some(filter) => filter == j.agent_id,
                None => true,
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        out
    }

    /// Jobs due to fire at `now`: cron jobs whose expression matches the
    /// current UTC minute (and haven't already fired this minute) plus
    /// run-at jobs whose fire time has passed. Marks each as fired/consumed
    /// before returning so a caller ticking faster than once a minute can't
    /// double-deliver.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<ScheduledJob> {
        let mut jobs = self.jobs.write();
        let mut due = Vec::new();
        let mut to_remove = Vec::new();

        for job in jobs.values_mut() {
            match job.kind {
                JobKind::Cron => {
                    let Some(cron) = job.cron.as_deref() else { continue };
                    if !cron_matches(cron, &now) {
                        continue;
                    }
                    let already_fired_this_minute = job
                        .last_fired_at
                        .is_some_and(|t| t.format("%Y%m%d%H%M").to_string() == now.format("%Y%m%d%H%M").to_string());
                    if already_fired_this_minute {
                        continue;
                    }
                    job.last_fired_at = Some(now);
                    due.push(job.clone());
                }
                JobKind::RunAt => {
                    let Some(run_at) = job.run_at else { continue };
                    if run_at <= now && !job.consumed {
                        job.consumed = true;
                        due.push(job.clone());
                        to_remove.push(job.id.clone());
                    }
                }
            }
        }
        for id in to_remove {
            jobs.remove(&id);
        }
        drop(jobs);
        if !due.is_empty() {
            let _ = self.persist();
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_list_remove_cron_job() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScheduleStore::new(dir.path()).unwrap();
        let job = store.add_cron("digest-bot", "0 9 * * *", "send morning digest", Delivery::last_channel()).unwrap();
        assert_eq!(store.list(Some("digest-bot")).len(), 1);
        assert!(store.list(Some("other-bot")).is_empty());
        assert!(store.remove(&job.id).unwrap());
        assert!(store.list(None).is_empty());
    }

    #[test]
    fn invalid_cron_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScheduleStore::new(dir.path()).unwrap();
        assert!(store.add_cron("a", "not a cron", "x", Delivery::last_channel()).is_err());
    }

    #[test]
    fn run_at_job_consumed_once_due() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScheduleStore::new(dir.path()).unwrap();
        let past = Utc::now() - chrono::Duration::minutes(1);
        store.add_run_at("a", past, "one-shot task", Delivery::last_channel()).unwrap();
        let due = store.take_due(Utc::now());
        assert_eq!(due.len(), 1);
        assert!(store.list(None).is_empty());
    }

    #[test]
    fn persists_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = ScheduleStore::new(dir.path()).unwrap();
            store.add_cron("a", "*/5 * * * *", "ping", Delivery::last_channel()).unwrap();
        }
        let reloaded = ScheduleStore::new(dir.path()).unwrap();
        assert_eq!(reloaded.list(None).len(), 1);
    }
}
