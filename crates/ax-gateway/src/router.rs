//! The trust boundary's core pipeline.
//!
//! `process_inbound` runs an externally-sourced message through session
//! resolution, the lifecycle reset check, the content scanner and the taint
//! ledger before it is allowed to reach the sandboxed agent. `process_outbound`
//! runs the agent's reply back through the canary leak check and the output
//! scanner before it is allowed to leave the host. Every other entry point
//! (HTTP channel ingestion, the chat-completions surface, scheduled-job
//! delivery) funnels through these two functions so the boundary is enforced
//! exactly once, in exactly one place.

use ax_domain::config::InboundMetadata;
use ax_domain::error::{Error, Result};
use ax_queue::NewMessage;
use ax_scanner::canary::check_canary;
use ax_scanner::verdict::Verdict;
use ax_sessions::conversation::Role;
use ax_sessions::store::SessionOrigin;
use ax_sessions::{compute_session_key, SessionEntry};

use crate::state::AppState;

/// A message arriving from a channel, the HTTP surface, or a scheduled job
/// re-delivery, not yet attributed to a resolved session.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub meta: InboundMetadata,
    pub sender: String,
    pub content: String,
}

/// Result of successfully routing an inbound message: the resolved session
/// and the queue id the sandbox orchestrator will pick up to process it.
#[derive(Debug, Clone)]
pub struct RoutedInbound {
    pub session: SessionEntry,
    pub canary: String,
    pub queued_id: u64,
}

/// Run an inbound message through the full pipeline: resolve session,
/// evaluate lifecycle reset, scan for prompt-injection content, record
/// taint, append to the conversation log, mint a canary for this turn and
/// enqueue for sandboxed processing.
///
/// Returns `Err(Error::ScanBlocked(_))` without enqueueing anything if the
/// input scanner escalates to [`Verdict::Block`].
pub async fn process_inbound(state: &AppState, msg: InboundMessage) -> Result<RoutedInbound> {
    let session_key = compute_session_key(
        &state.config.sessions.agent_id,
        state.config.sessions.dm_scope.clone(),
        &msg.meta,
    )
    .as_str();

    let origin = SessionOrigin {
        channel: msg.meta.channel.clone(),
        account: msg.meta.account_id.clone(),
        peer: msg.meta.peer_id.clone(),
        group: msg.meta.group_id.clone(),
    };
    let (mut entry, is_new) = state.sessions.resolve_or_create(&session_key, origin);

    if !is_new {
        if let Some(reason) = state
            .lifecycle
            .should_reset(&entry, &msg.meta, chrono::Utc::now())
        {
            tracing::info!(session_key = %entry.session_key, reason = %reason, "session lifecycle reset");
            if let Some(reset) = state.sessions.reset_session(&entry.session_key, &reason.to_string()) {
                entry = reset;
            }
        }
    }
    state.sessions.touch(&entry.session_key);
    state
        .sessions
        .set_last(&state.config.sessions.agent_id, &entry.session_key);

    let scan = state.scanner.scan_input(&msg.content);
    if scan.verdict == Verdict::Block {
        let reason = scan
            .reason
            .clone()
            .unwrap_or_else(|| "input rejected by scanner".to_string());
        tracing::warn!(session_id = %entry.session_id, patterns = ?scan.patterns, "inbound message blocked");
        let _ = state.audit.record(
            Some(&entry.session_id),
            "scan_inbound",
            serde_json::json!({"verdict": "blocked", "reason": reason, "patterns": scan.patterns}),
        );
        return Err(Error::ScanBlocked(reason));
    }

    // A direct message has exactly one possible sender, the session's own
    // counterpart, so it counts as the user's direct input. Anything else
    // (group/channel messages) may come from a third party sharing the
    // session and accrues toward the sensitive-action budget.
    let tainted = !msg.meta.is_direct;
    state.taint.record_content(&entry.session_id, &msg.content, tainted);

    state
        .conversations
        .append(&entry.session_id, Role::User, &msg.content, Some(&msg.sender))?;

    let canary = state.canaries.mint(&entry.session_id);

    let queued_id = state.queue.enqueue(NewMessage {
        session_id: entry.session_id.clone(),
        session_key: entry.session_key.clone(),
        sender: msg.sender.clone(),
        channel: msg.meta.channel.clone().unwrap_or_else(|| "unknown".to_string()),
        content: msg.content.clone(),
    })?;

    Ok(RoutedInbound {
        session: entry,
        canary,
        queued_id,
    })
}

/// Outcome of routing a reply generated by the sandboxed agent back out.
pub enum OutboundOutcome {
    /// Safe to deliver to the original channel.
    Deliver(String),
    /// The scanner or canary check vetoed delivery; the reply is logged but
    /// never handed to a channel.
    Suppressed { reason: String },
}

/// Run an agent-produced reply through the canary leak check and the output
/// scanner before it is allowed to leave the host.
pub fn process_outbound(state: &AppState, session_id: &str, content: &str) -> Result<OutboundOutcome> {
    // Assistant content is always trusted for taint accounting, regardless
    // of whether the canary or output scanner below ends up suppressing it.
    state.taint.record_content(session_id, content, false);

    if let Some(token) = state.canaries.get(session_id) {
        if check_canary(content, &token) {
            tracing::warn!(session_id, "canary token leaked in agent output, suppressing reply");
            let _ = state
                .audit
                .record(Some(session_id), "canary_leaked", serde_json::json!({}));
            state
                .conversations
                .append(session_id, Role::Assistant, "[reply suppressed: canary leak detected]", None)?;
            state.canaries.clear(session_id);
            return Ok(OutboundOutcome::Suppressed {
                reason: "canary leak detected".to_string(),
            });
        }
    }

    let scan = state.scanner.scan_output(content);
    if scan.verdict == Verdict::Block {
        let reason = scan
            .reason
            .clone()
            .unwrap_or_else(|| "output rejected by scanner".to_string());
        tracing::warn!(session_id, patterns = ?scan.patterns, "outbound reply blocked");
        let _ = state.audit.record(
            Some(session_id),
            "scan_outbound",
            serde_json::json!({"verdict": "blocked", "reason": reason, "patterns": scan.patterns}),
        );
        state
            .conversations
            .append(session_id, Role::Assistant, &format!("[reply suppressed: {reason}]"), None)?;
        state.canaries.clear(session_id);
        return Ok(OutboundOutcome::Suppressed { reason });
    }

    state.conversations.append(session_id, Role::Assistant, content, None)?;
    state.canaries.clear(session_id);
    Ok(OutboundOutcome::Deliver(content.to_string()))
}
