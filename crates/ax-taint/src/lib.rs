//! Per-session taint accounting and the sensitive-action gate.
//!
//! Taint tracks the fraction of a session's conversation bytes that
//! originated outside the user's direct input. `checkAction` gates a static
//! allowlist of sensitive IPC actions against a profile-derived threshold.

use std::collections::{HashMap, HashSet};

use ax_domain::config::{TaintConfig, TaintProfile};
use ax_domain::trace::TraceEvent;
use parking_lot::Mutex;
use serde::Serialize;

/// Actions gated by the taint budget. Exact names for single actions;
/// `identity_write`/`user_write` both count as identity mutations.
const SENSITIVE_ACTIONS: &[&str] = &[
    "skill_propose",
    "oauth_call",
    "identity_write",
    "user_write",
    "web_fetch",
    "web_search",
    "agent_delegate",
];

pub fn is_sensitive_action(action: &str) -> bool {
    SENSITIVE_ACTIONS.contains(&action) || action.starts_with("browser_")
}

/// Per-session taint counters and the user-granted override set.
#[derive(Debug, Clone, Default)]
struct TaintState {
    total_bytes: u64,
    tainted_bytes: u64,
    overrides: HashSet<String>,
}

impl TaintState {
    fn ratio(&self) -> f64 {
        self.tainted_bytes as f64 / (self.total_bytes.max(1) as f64)
    }
}

/// A snapshot of a session's taint state, for `getState`.
#[derive(Debug, Clone, Serialize)]
pub struct TaintSnapshot {
    pub total_bytes: u64,
    pub tainted_bytes: u64,
    pub taint_ratio: f64,
    pub overrides: Vec<String>,
}

/// The outcome of a `checkAction` call.
#[derive(Debug, Clone, Serialize)]
pub struct ActionCheck {
    pub allowed: bool,
    pub taint_ratio: f64,
    pub threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Process-wide taint budget, keyed by session ID.
pub struct TaintBudget {
    config: TaintConfig,
    sessions: Mutex<HashMap<String, TaintState>>,
}

impl TaintBudget {
    pub fn new(config: TaintConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Record content observed for a session, tagging it tainted or not.
    /// Concurrent calls for the same session serialize on the internal lock.
    pub fn record_content(&self, session_id: &str, content: &str, tainted: bool) {
        let len = content.len() as u64;
        let mut sessions = self.sessions.lock();
        let state = sessions.entry(session_id.to_string()).or_default();
        state.total_bytes += len;
        if tainted {
            state.tainted_bytes += len;
        }

        TraceEvent::TaintUpdated {
            session_id: session_id.to_string(),
            taint_in: state.tainted_bytes,
            taint_out: state.total_bytes,
            level: self.profile_label(),
        }
        .emit();
    }

    /// Check whether `action` is currently permitted for this session.
    pub fn check_action(&self, session_id: &str, action: &str) -> ActionCheck {
        let threshold = self.config.active_threshold();
        let sessions = self.sessions.lock();
        let ratio = sessions.get(session_id).map(TaintState::ratio).unwrap_or(0.0);

        if !is_sensitive_action(action) {
            return ActionCheck {
                allowed: true,
                taint_ratio: ratio,
                threshold,
                reason: None,
            };
        }

        let overridden = sessions
            .get(session_id)
            .map(|s| s.overrides.contains(action))
            .unwrap_or(false);

        if ratio >= threshold && !overridden {
            return ActionCheck {
                allowed: false,
                taint_ratio: ratio,
                threshold,
                reason: Some(format!(
                    "taint ratio {ratio:.3} >= threshold {threshold:.3} for sensitive action {action}"
                )),
            };
        }

        ActionCheck {
            allowed: true,
            taint_ratio: ratio,
            threshold,
            reason: None,
        }
    }

    /// Grant a standing user override for a sensitive action on this session.
    pub fn add_user_override(&self, session_id: &str, action: &str) {
        let mut sessions = self.sessions.lock();
        sessions
            .entry(session_id.to_string())
            .or_default()
            .overrides
            .insert(action.to_string());
    }

    /// Read the current taint state for a session.
    pub fn get_state(&self, session_id: &str) -> TaintSnapshot {
        let sessions = self.sessions.lock();
        match sessions.get(session_id) {
            Some(state) => TaintSnapshot {
                total_bytes: state.total_bytes,
                tainted_bytes: state.tainted_bytes,
                taint_ratio: state.ratio(),
                overrides: state.overrides.iter().cloned().collect(),
            },
            None => TaintSnapshot {
                total_bytes: 0,
                tainted_bytes: 0,
                taint_ratio: 0.0,
                overrides: Vec::new(),
            },
        }
    }

    /// Reset a session's taint counters (invoked alongside a session-lifecycle
    /// reset; the only way `taintedBytes`/`totalBytes` may decrease).
    pub fn reset_session(&self, session_id: &str) {
        self.sessions.lock().remove(session_id);
    }

    /// The profile this budget enforces thresholds for.
    pub fn profile(&self) -> TaintProfile {
        self.config.profile
    }

    fn profile_label(&self) -> String {
        match self.config.profile {
            TaintProfile::Paranoid => "paranoid",
            TaintProfile::Balanced => "balanced",
            TaintProfile::Yolo => "yolo",
        }
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(profile: TaintProfile) -> TaintBudget {
        TaintBudget::new(TaintConfig {
            profile,
            ..Default::default()
        })
    }

    #[test]
    fn non_sensitive_action_always_allowed() {
        let b = budget(TaintProfile::Paranoid);
        b.record_content("s1", &"x".repeat(1000), true);
        let check = b.check_action("s1", "memory_read");
        assert!(check.allowed);
    }

    #[test]
    fn sensitive_action_blocked_above_threshold() {
        let b = budget(TaintProfile::Paranoid);
        b.record_content("s1", &"x".repeat(1000), true);
        let check = b.check_action("s1", "web_fetch");
        assert!(!check.allowed);
        assert!(check.reason.is_some());
    }

    #[test]
    fn sensitive_action_allowed_below_threshold() {
        let b = budget(TaintProfile::Yolo);
        b.record_content("s1", &"x".repeat(10), true);
        b.record_content("s1", &"y".repeat(1000), false);
        let check = b.check_action("s1", "web_fetch");
        assert!(check.allowed);
    }

    #[test]
    fn override_unblocks_sensitive_action() {
        let b = budget(TaintProfile::Paranoid);
        b.record_content("s1", &"x".repeat(1000), true);
        assert!(!b.check_action("s1", "web_fetch").allowed);
        b.add_user_override("s1", "web_fetch");
        assert!(b.check_action("s1", "web_fetch").allowed);
    }

    #[test]
    fn record_content_never_decreases_counters() {
        let b = budget(TaintProfile::Balanced);
        b.record_content("s1", "abc", true);
        let before = b.get_state("s1");
        b.record_content("s1", "x", false);
        let after = b.get_state("s1");
        assert!(after.total_bytes >= before.total_bytes);
        assert!(after.tainted_bytes >= before.tainted_bytes);
    }

    #[test]
    fn reset_clears_counters() {
        let b = budget(TaintProfile::Balanced);
        b.record_content("s1", "abc", true);
        b.reset_session("s1");
        let state = b.get_state("s1");
        assert_eq!(state.total_bytes, 0);
        assert_eq!(state.tainted_bytes, 0);
    }

    #[test]
    fn browser_prefix_is_sensitive() {
        assert!(is_sensitive_action("browser_click"));
        assert!(!is_sensitive_action("memory_query"));
    }
}
