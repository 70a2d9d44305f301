//! One function per IPC action. [`dispatch`] is the single entry point: it
//! validates the action name, enforces the taint budget for sensitive
//! actions, applies a per-action timeout, and routes to the handler.

use std::time::Duration;

use ax_domain::error::{Error, Result};
use ax_domain::tool::Message;
use ax_protocol::{is_valid_action, validate_payload, IpcRequest, IpcResponse};
use ax_providers::ChatRequest;
use ax_taint::is_sensitive_action;
use serde_json::{json, Value};

use crate::state::AppState;

/// Validate, taint-check, timeout and route a single request.
pub async fn dispatch(state: &AppState, req: IpcRequest) -> IpcResponse {
    if !is_valid_action(&req.action) {
        let _ = state.audit.record(
            None,
            "ipc_unknown_action",
            json!({"action": req.action}),
        );
        return IpcResponse::err(format!("unknown action: {}", req.action));
    }

    let session_id = match req.payload.get("session_id").and_then(|v| v.as_str()) {
        Some(s) => s.to_string(),
        None => return IpcResponse::err("missing required field: session_id"),
    };

    if let Err(reason) = validate_payload(&req.action, &req.payload) {
        let _ = state.audit.record(
            Some(&session_id),
            "ipc_validation_failure",
            json!({"action": req.action, "reason": reason}),
        );
        return IpcResponse::err(format!("invalid payload for '{}': {reason}", req.action));
    }

    // identity_write/user_write have their own bespoke queuing state machine
    // (which performs its own taint check as one branch of that decision);
    // gating them here too would short-circuit the queue outcome and turn
    // every paranoid-profile identity write into an outright block.
    let has_bespoke_taint_handling = matches!(req.action.as_str(), "identity_write" | "user_write");
    if is_sensitive_action(&req.action) && !has_bespoke_taint_handling {
        let check = state.taint.check_action(&session_id, &req.action);
        if !check.allowed {
            let reason = check
                .reason
                .unwrap_or_else(|| "taint budget exceeded".to_string());
            let _ = state.audit.record(
                Some(&session_id),
                "ipc_taint_blocked",
                json!({"action": req.action, "reason": reason}),
            );
            return IpcResponse::taint_blocked(reason);
        }
    }

    let timeout_ms = if req.action == "llm_call" {
        state.config.ipc.llm_timeout_ms_resolved()
    } else {
        state.config.ipc.action_timeout_ms
    };

    let started = std::time::Instant::now();
    let outcome = tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        route(state, &session_id, &req.action, &req.payload),
    )
    .await;
    let duration_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(Ok(result)) => {
            let _ = state.audit.record(
                Some(&session_id),
                "ipc_dispatch",
                json!({"action": req.action, "duration_ms": duration_ms, "result": "ok"}),
            );
            IpcResponse::ok(result)
        }
        Ok(Err(e)) => {
            let _ = state.audit.record(
                Some(&session_id),
                "ipc_handler_error",
                json!({"action": req.action, "duration_ms": duration_ms, "error": e.to_string()}),
            );
            IpcResponse::err(e.to_string())
        }
        Err(_) => {
            let _ = state.audit.record(
                Some(&session_id),
                "ipc_handler_error",
                json!({"action": req.action, "duration_ms": duration_ms, "error": "timeout"}),
            );
            IpcResponse::err(format!(
                "action '{}' timed out after {timeout_ms}ms",
                req.action
            ))
        }
    }
}

async fn route(state: &AppState, session_id: &str, action: &str, payload: &Value) -> Result<Value> {
    match action {
        "llm_call" => handle_llm_call(state, session_id, payload).await,
        "memory_write" => handle_memory_write(state, payload).await,
        "memory_query" => handle_memory_query(state, payload).await,
        "memory_read" => handle_memory_read(state, payload).await,
        "memory_delete" => handle_memory_delete(state, payload).await,
        "memory_list" => handle_memory_list(state, payload).await,
        "web_fetch" => handle_web_fetch(state, payload).await,
        "web_search" => handle_web_search(state, payload).await,
        "skill_propose" => handle_skill_propose(state, payload).await,
        "identity_write" => handle_identity_write(state, session_id, payload).await,
        "user_write" => handle_user_write(state, session_id, payload).await,
        "agent_delegate" => handle_agent_delegate(state, session_id, payload).await,
        "scheduler_add_cron" => handle_scheduler_add_cron(state, payload).await,
        "scheduler_run_at" => handle_scheduler_run_at(state, payload).await,
        "scheduler_remove_cron" => handle_scheduler_remove_cron(state, payload).await,
        "scheduler_list_jobs" => handle_scheduler_list_jobs(state, payload).await,
        "audit_query" => handle_audit_query(state, payload).await,
        other if other.starts_with("browser_") => handle_browser_action(state, other, payload).await,
        other => Err(Error::Ipc(format!("no handler registered for {other}"))),
    }
}

fn require_str<'a>(payload: &'a Value, field: &str) -> Result<&'a str> {
    payload
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Ipc(format!("missing required field: {field}")))
}

// ── llm_call ─────────────────────────────────────────────────────────

async fn handle_llm_call(state: &AppState, session_id: &str, payload: &Value) -> Result<Value> {
    let provider_id = payload.get("provider").and_then(|v| v.as_str());
    let provider = state
        .llm
        .resolve(provider_id)
        .ok_or_else(|| Error::Provider {
            provider: provider_id.unwrap_or("default").to_string(),
            message: "no LLM provider configured".to_string(),
        })?;

    let messages: Vec<Message> = serde_json::from_value(
        payload
            .get("messages")
            .cloned()
            .ok_or_else(|| Error::Ipc("missing required field: messages".to_string()))?,
    )
    .map_err(Error::Json)?;

    let req = ChatRequest {
        messages,
        tools: Vec::new(),
        temperature: payload.get("temperature").and_then(|v| v.as_f64()).map(|f| f as f32),
        max_tokens: payload.get("max_tokens").and_then(|v| v.as_u64()).map(|n| n as u32),
        model: payload.get("model").and_then(|v| v.as_str()).map(str::to_string),
    };

    let resp = provider.chat(req).await?;

    // LLM output is external-model-generated content, not agent-trusted
    // input, but it is not attacker-controlled either; the router's taint
    // accounting is reserved for inbound channel content, so llm_call
    // responses are handed back untaxed.
    let _ = session_id;

    Ok(json!({
        "content": resp.content,
        "toolCalls": resp.tool_calls,
        "usage": resp.usage,
        "model": resp.model,
        "finishReason": resp.finish_reason,
    }))
}

// ── memory_* ─────────────────────────────────────────────────────────

async fn handle_memory_write(state: &AppState, payload: &Value) -> Result<Value> {
    let scope = require_str(payload, "scope")?.to_string();
    let content = require_str(payload, "content")?.to_string();
    let tags: Vec<String> = payload
        .get("tags")
        .and_then(|v| v.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let entry = state.memory.write(&scope, &content, tags).await?;
    Ok(serde_json::to_value(entry)?)
}

async fn handle_memory_query(state: &AppState, payload: &Value) -> Result<Value> {
    let scope = require_str(payload, "scope")?.to_string();
    let query = payload.get("query").and_then(|v| v.as_str());
    let limit = payload.get("limit").and_then(|v| v.as_u64()).map(|n| n as usize);
    let entries = state.memory.query(&scope, query, limit).await?;
    Ok(json!({ "entries": entries }))
}

async fn handle_memory_read(state: &AppState, payload: &Value) -> Result<Value> {
    let id = require_str(payload, "id")?;
    let entry = state.memory.read(id).await?;
    Ok(serde_json::to_value(entry)?)
}

async fn handle_memory_delete(state: &AppState, payload: &Value) -> Result<Value> {
    let id = require_str(payload, "id")?;
    state.memory.delete(id).await?;
    Ok(json!({ "deleted": true }))
}

async fn handle_memory_list(state: &AppState, payload: &Value) -> Result<Value> {
    let scope = require_str(payload, "scope")?.to_string();
    let limit = payload.get("limit").and_then(|v| v.as_u64()).map(|n| n as usize);
    let entries = state.memory.list(&scope, limit).await?;
    Ok(json!({ "entries": entries }))
}

// ── web_fetch / web_search ──────────────────────────────────────────

async fn handle_web_fetch(state: &AppState, payload: &Value) -> Result<Value> {
    let url = require_str(payload, "url")?;
    let extract_text = payload.get("extractText").and_then(|v| v.as_bool()).unwrap_or(true);
    let result = state.web.fetch(url, extract_text).await?;
    Ok(serde_json::to_value(result)?)
}

async fn handle_web_search(state: &AppState, payload: &Value) -> Result<Value> {
    let query = require_str(payload, "query")?;
    let limit = payload.get("limit").and_then(|v| v.as_u64()).map(|n| n as usize).unwrap_or(5);
    let hits = state.web.search(query, limit).await?;
    Ok(json!({ "results": hits }))
}

async fn handle_browser_action(state: &AppState, action: &str, payload: &Value) -> Result<Value> {
    let browser = state
        .browser
        .as_ref()
        .ok_or_else(|| Error::Sandbox("no browser provider configured".to_string()))?;
    let sub = action.strip_prefix("browser_").unwrap_or(action);
    match sub {
        "open" => {
            let url = require_str(payload, "url")?;
            let session = browser.open(url).await?;
            Ok(json!({ "browserSession": session }))
        }
        "navigate" => {
            let session = require_str(payload, "browserSession")?;
            let url = require_str(payload, "url")?;
            browser.navigate(session, url).await?;
            Ok(json!({ "navigated": true }))
        }
        "click" => {
            let session = require_str(payload, "browserSession")?;
            let reference = require_str(payload, "reference")?;
            browser.click(session, reference).await?;
            Ok(json!({ "clicked": true }))
        }
        "type" => {
            let session = require_str(payload, "browserSession")?;
            let reference = require_str(payload, "reference")?;
            let text = require_str(payload, "text")?;
            browser.type_text(session, reference, text).await?;
            Ok(json!({ "typed": true }))
        }
        "snapshot" => {
            let session = require_str(payload, "browserSession")?;
            let snap = browser.snapshot(session).await?;
            Ok(serde_json::to_value(snap)?)
        }
        "close" => {
            let session = require_str(payload, "browserSession")?;
            browser.close(session).await?;
            Ok(json!({ "closed": true }))
        }
        other => Err(Error::Ipc(format!("unknown browser action: {other}"))),
    }
}

// ── skill_propose ────────────────────────────────────────────────────

async fn handle_skill_propose(state: &AppState, payload: &Value) -> Result<Value> {
    let skill_name = require_str(payload, "skillName")?;
    let content = require_str(payload, "content")?;
    let reason = require_str(payload, "reason")?;
    let result = state.skills.propose(skill_name, content, reason)?;
    Ok(serde_json::to_value(result)?)
}

// ── identity_write / user_write ─────────────────────────────────────

fn identity_outcome_to_json(outcome: crate::identity::IdentityWriteOutcome) -> Value {
    match outcome {
        crate::identity::IdentityWriteOutcome::Applied { file } => json!({"applied": true, "file": file}),
        crate::identity::IdentityWriteOutcome::Queued { file } => json!({"queued": true, "file": file}),
    }
}

async fn handle_identity_write(state: &AppState, session_id: &str, payload: &Value) -> Result<Value> {
    let agent_name = &state.config.sessions.agent_id;
    let file = require_str(payload, "file")?;
    let content = require_str(payload, "content")?;
    let reason = require_str(payload, "reason")?;
    let origin = require_str(payload, "origin")?;
    let outcome = state.agents.propose_identity_write(
        session_id,
        agent_name,
        file,
        content,
        reason,
        origin,
        &state.taint,
        &state.scanner,
        &state.audit,
    )?;
    Ok(identity_outcome_to_json(outcome))
}

async fn handle_user_write(state: &AppState, session_id: &str, payload: &Value) -> Result<Value> {
    let user_id = require_str(payload, "userId")?;
    let content = require_str(payload, "content")?;
    let reason = require_str(payload, "reason")?;
    let origin = require_str(payload, "origin")?;
    // Analogous to identity_write, but the target file is always USER.md
    // under the requesting agent's own directory, annotated with the user
    // this write is about rather than addressed by filename.
    let annotated_reason = format!("{reason} (user: {user_id})");
    let outcome = state.agents.propose_identity_write(
        session_id,
        &state.config.sessions.agent_id,
        "USER.md",
        content,
        &annotated_reason,
        origin,
        &state.taint,
        &state.scanner,
        &state.audit,
    )?;
    Ok(identity_outcome_to_json(outcome))
}

// ── agent_delegate ───────────────────────────────────────────────────

async fn handle_agent_delegate(state: &AppState, session_id: &str, payload: &Value) -> Result<Value> {
    let target_agent = require_str(payload, "targetAgent")?;
    let task = require_str(payload, "task")?;
    let record = state.agents.delegate(session_id, target_agent, task)?;
    Ok(serde_json::to_value(record)?)
}

// ── scheduler_* ──────────────────────────────────────────────────────

fn parse_delivery(payload: &Value) -> Result<crate::runtime::schedules::Delivery> {
    match payload.get("delivery") {
        None => Ok(crate::runtime::schedules::Delivery::last_channel()),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| Error::Ipc(format!("invalid delivery: {e}"))),
    }
}

async fn handle_scheduler_add_cron(state: &AppState, payload: &Value) -> Result<Value> {
    let agent_id = require_str(payload, "agentId")?;
    let cron_expr = require_str(payload, "cron")?;
    let task = require_str(payload, "task")?;
    let delivery = parse_delivery(payload)?;
    let job = state.schedules.add_cron(agent_id, cron_expr, task, delivery)?;
    Ok(serde_json::to_value(job)?)
}

async fn handle_scheduler_run_at(state: &AppState, payload: &Value) -> Result<Value> {
    let agent_id = require_str(payload, "agentId")?;
    let run_at = require_str(payload, "runAt")?;
    let task = require_str(payload, "task")?;
    let run_at = chrono::DateTime::parse_from_rfc3339(run_at)
        .map_err(|e| Error::Ipc(format!("runAt must be RFC3339: {e}")))?
        .with_timezone(&chrono::Utc);
    let delivery = parse_delivery(payload)?;
    let job = state.schedules.add_run_at(agent_id, run_at, task, delivery)?;
    Ok(serde_json::to_value(job)?)
}

async fn handle_scheduler_remove_cron(state: &AppState, payload: &Value) -> Result<Value> {
    let job_id = require_str(payload, "jobId")?;
    let removed = state.schedules.remove(job_id)?;
    Ok(json!({ "removed": removed }))
}

async fn handle_scheduler_list_jobs(state: &AppState, payload: &Value) -> Result<Value> {
    let agent_id = payload.get("agentId").and_then(|v| v.as_str());
    let jobs = state.schedules.list(agent_id);
    Ok(json!({ "jobs": jobs }))
}

// ── audit_query ──────────────────────────────────────────────────────

async fn handle_audit_query(state: &AppState, payload: &Value) -> Result<Value> {
    let session_id = payload.get("sessionId").and_then(|v| v.as_str());
    let limit = payload.get("limit").and_then(|v| v.as_u64()).map(|n| n as usize).unwrap_or(100);
    let entries = state.audit.query(session_id, limit)?;
    Ok(json!({ "entries": entries }))
}
