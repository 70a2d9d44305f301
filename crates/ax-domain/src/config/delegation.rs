use serde::{Deserialize, Serialize};

/// Per-agent delegation bounds (spec §4.11, P9): caps on concurrent and
/// nested `agent_delegate` calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationConfig {
    #[serde(default = "d_max_concurrent")]
    pub max_concurrent: u32,
    #[serde(default = "d_max_depth")]
    pub max_depth: u32,
    #[serde(default = "d_max_duration_ms")]
    pub max_duration_ms: u64,
    #[serde(default)]
    pub tool_policy: ToolPolicy,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            max_concurrent: d_max_concurrent(),
            max_depth: d_max_depth(),
            max_duration_ms: d_max_duration_ms(),
            tool_policy: ToolPolicy::default(),
        }
    }
}

fn d_max_concurrent() -> u32 {
    5
}
fn d_max_depth() -> u32 {
    3
}
fn d_max_duration_ms() -> u64 {
    30_000
}

/// Allow/deny list for IPC actions, prefix-matched on `.` separators with
/// `*` as a trailing wildcard. Deny takes precedence over allow.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolPolicy {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
}

impl ToolPolicy {
    pub fn allows(&self, action: &str) -> bool {
        let action = action.to_ascii_lowercase();
        if self.deny.iter().any(|p| Self::matches(p, &action)) {
            return false;
        }
        if self.allow.is_empty() {
            return true;
        }
        self.allow.iter().any(|p| Self::matches(p, &action))
    }

    fn matches(pattern: &str, action: &str) -> bool {
        let pattern = pattern.to_ascii_lowercase();
        if let Some(prefix) = pattern.strip_suffix('*') {
            action.starts_with(prefix)
        } else {
            action == pattern
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_allow_list_allows_everything_not_denied() {
        let policy = ToolPolicy::default();
        assert!(policy.allows("web_fetch"));
    }

    #[test]
    fn deny_takes_precedence_over_allow() {
        let policy = ToolPolicy {
            allow: vec!["web_*".into()],
            deny: vec!["web_fetch".into()],
        };
        assert!(!policy.allows("web_fetch"));
        assert!(policy.allows("web_search"));
    }

    #[test]
    fn wildcard_prefix_match() {
        let policy = ToolPolicy {
            allow: vec!["memory_*".into()],
            deny: vec![],
        };
        assert!(policy.allows("memory_write"));
        assert!(!policy.allows("skill_propose"));
    }
}
