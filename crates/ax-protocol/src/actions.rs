//! The static `VALID_ACTIONS` allowlist enforced at envelope validation.

const FIXED_ACTIONS: &[&str] = &[
    "llm_call",
    "memory_write",
    "memory_query",
    "memory_read",
    "memory_delete",
    "memory_list",
    "web_fetch",
    "web_search",
    "skill_propose",
    "identity_write",
    "user_write",
    "agent_delegate",
    "scheduler_add_cron",
    "scheduler_run_at",
    "scheduler_remove_cron",
    "scheduler_list_jobs",
    "audit_query",
];

/// `true` if `action` is in the static allowlist. `browser_*` is an open
/// prefix family (the browser provider owns its own sub-action names), so
/// it is checked separately rather than enumerated exhaustively.
pub fn is_valid_action(action: &str) -> bool {
    FIXED_ACTIONS.contains(&action) || action.starts_with("browser_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_actions_are_valid() {
        assert!(is_valid_action("llm_call"));
        assert!(is_valid_action("memory_write"));
        assert!(is_valid_action("browser_click"));
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(!is_valid_action("drop_table"));
        assert!(!is_valid_action(""));
    }
}
