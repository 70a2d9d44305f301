//! Strict per-action payload schemas.
//!
//! [`validate_payload`] models the action set as a closed family of variant
//! types, one struct per action, each `#[serde(deny_unknown_fields)]`. An
//! unrecognized field is rejected the same as a missing required one — the
//! wire contract has no room for a client to smuggle extra state past the
//! gateway by attaching fields a handler happens to ignore.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct LlmCall {
    session_id: String,
    messages: Value,
    provider: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<u64>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct MemoryWrite {
    session_id: String,
    scope: String,
    content: String,
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct MemoryQuery {
    session_id: String,
    scope: String,
    query: Option<String>,
    limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct MemoryRead {
    session_id: String,
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct MemoryDelete {
    session_id: String,
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct MemoryList {
    session_id: String,
    scope: String,
    limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct WebFetch {
    session_id: String,
    url: String,
    #[serde(rename = "extractText")]
    extract_text: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct WebSearch {
    session_id: String,
    query: String,
    limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct SkillPropose {
    session_id: String,
    #[serde(rename = "skillName")]
    skill_name: String,
    content: String,
    reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct IdentityWrite {
    session_id: String,
    file: String,
    content: String,
    reason: String,
    origin: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct UserWrite {
    session_id: String,
    #[serde(rename = "userId")]
    user_id: String,
    content: String,
    reason: String,
    origin: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct AgentDelegate {
    session_id: String,
    #[serde(rename = "targetAgent")]
    target_agent: String,
    task: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct SchedulerAddCron {
    session_id: String,
    #[serde(rename = "agentId")]
    agent_id: String,
    cron: String,
    task: String,
    delivery: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct SchedulerRunAt {
    session_id: String,
    #[serde(rename = "agentId")]
    agent_id: String,
    #[serde(rename = "runAt")]
    run_at: String,
    task: String,
    delivery: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct SchedulerRemoveCron {
    session_id: String,
    #[serde(rename = "jobId")]
    job_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct SchedulerListJobs {
    session_id: String,
    #[serde(rename = "agentId")]
    agent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct AuditQuery {
    session_id: String,
    #[serde(rename = "sessionId")]
    query_session_id: Option<String>,
    limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct BrowserOpen {
    session_id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct BrowserNavigate {
    session_id: String,
    #[serde(rename = "browserSession")]
    browser_session: String,
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct BrowserClick {
    session_id: String,
    #[serde(rename = "browserSession")]
    browser_session: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct BrowserType {
    session_id: String,
    #[serde(rename = "browserSession")]
    browser_session: String,
    reference: String,
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct BrowserSnapshot {
    session_id: String,
    #[serde(rename = "browserSession")]
    browser_session: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct BrowserClose {
    session_id: String,
    #[serde(rename = "browserSession")]
    browser_session: String,
}

/// Validate `payload` against the schema for `action`, rejecting missing
/// required fields and any field the action's schema does not declare.
///
/// `browser_*` sub-actions outside the known set fall through unvalidated
/// here — the browser provider owns that namespace and the handler itself
/// rejects an unrecognized sub-action name.
pub fn validate_payload(action: &str, payload: &Value) -> std::result::Result<(), String> {
    fn check<T: for<'de> Deserialize<'de>>(payload: &Value) -> std::result::Result<(), String> {
        serde_json::from_value::<T>(payload.clone())
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    match action {
        "llm_call" => check::<LlmCall>(payload),
        "memory_write" => check::<MemoryWrite>(payload),
        "memory_query" => check::<MemoryQuery>(payload),
        "memory_read" => check::<MemoryRead>(payload),
        "memory_delete" => check::<MemoryDelete>(payload),
        "memory_list" => check::<MemoryList>(payload),
        "web_fetch" => check::<WebFetch>(payload),
        "web_search" => check::<WebSearch>(payload),
        "skill_propose" => check::<SkillPropose>(payload),
        "identity_write" => check::<IdentityWrite>(payload),
        "user_write" => check::<UserWrite>(payload),
        "agent_delegate" => check::<AgentDelegate>(payload),
        "scheduler_add_cron" => check::<SchedulerAddCron>(payload),
        "scheduler_run_at" => check::<SchedulerRunAt>(payload),
        "scheduler_remove_cron" => check::<SchedulerRemoveCron>(payload),
        "scheduler_list_jobs" => check::<SchedulerListJobs>(payload),
        "audit_query" => check::<AuditQuery>(payload),
        "browser_open" => check::<BrowserOpen>(payload),
        "browser_navigate" => check::<BrowserNavigate>(payload),
        "browser_click" => check::<BrowserClick>(payload),
        "browser_type" => check::<BrowserType>(payload),
        "browser_snapshot" => check::<BrowserSnapshot>(payload),
        "browser_close" => check::<BrowserClose>(payload),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_unknown_field() {
        let payload = json!({"session_id": "s1", "scope": "notes", "content": "hi", "extra": "nope"});
        assert!(validate_payload("memory_write", &payload).is_err());
    }

    #[test]
    fn rejects_missing_required_field() {
        let payload = json!({"session_id": "s1", "scope": "notes"});
        assert!(validate_payload("memory_write", &payload).is_err());
    }

    #[test]
    fn accepts_well_formed_payload() {
        let payload = json!({"session_id": "s1", "scope": "notes", "content": "hi", "tags": ["a"]});
        assert!(validate_payload("memory_write", &payload).is_ok());
    }

    #[test]
    fn accepts_optional_fields_omitted() {
        let payload = json!({"session_id": "s1", "url": "https://example.com"});
        assert!(validate_payload("web_fetch", &payload).is_ok());
    }

    #[test]
    fn identity_write_matches_file_content_reason_origin_shape() {
        let payload = json!({
            "session_id": "s1",
            "file": "SOUL.md",
            "content": "...",
            "reason": "self-improvement",
            "origin": "agent_initiated",
        });
        assert!(validate_payload("identity_write", &payload).is_ok());

        let legacy_shape = json!({"session_id": "s1", "agentName": "a", "field": "f", "value": "v"});
        assert!(validate_payload("identity_write", &legacy_shape).is_err());
    }

    #[test]
    fn unrecognized_action_passes_through() {
        let payload = json!({"anything": "goes"});
        assert!(validate_payload("browser_scroll", &payload).is_ok());
    }
}
