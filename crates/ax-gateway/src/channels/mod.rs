//! Channel ingestion: the normalized envelope that external connectors
//! (Discord, Slack, a CLI, a webhook relay) post, run through the full
//! ingestion pipeline before it reaches [`crate::router::process_inbound`]
//! — filter, dedup, thread gate, thread backfill, bootstrap gate, reaction
//! acknowledgement, processing, and last-seen tracking.

pub mod http;
pub mod provider;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Deserialize;

use ax_domain::config::InboundMetadata;
use ax_domain::error::Result;
use ax_domain::trace::TraceEvent;
use ax_sessions::conversation::{ConversationTurn, Role};
use ax_sessions::store::SessionOrigin;
use ax_sessions::{compute_session_key, SessionEntry};

pub use provider::ChannelProvider;

use crate::reply_waiter::ReplyResult;
use crate::router::{process_inbound, InboundMessage, RoutedInbound};
use crate::state::AppState;

/// Normalized envelope a channel connector posts to the ingestion endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelEnvelope {
    pub channel: String,
    pub peer_id: String,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub is_direct: bool,
    pub text: String,
    /// Connector-assigned idempotency key, e.g. `"{channel}:{message_id}"`.
    /// Retried deliveries (webhook redelivery, reconnect replay) carry the
    /// same key and are silently dropped the second time.
    #[serde(default)]
    pub event_id: Option<String>,
    /// Whether the message explicitly mentioned the agent (a `@bot` tag, a
    /// reply to the bot's own message). Gates the thread reply rule below.
    #[serde(default)]
    pub is_mention: bool,
}

/// In-memory idempotency tracker. Holds recently-seen `event_id`s for a TTL
/// window so a connector's at-least-once redelivery semantics don't cause a
/// message to be routed (and billed against the taint budget) twice.
pub struct ChannelDedup {
    seen: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
    cap: usize,
}

impl ChannelDedup {
    pub fn new(ttl: Duration, cap: usize) -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
            ttl,
            cap,
        }
    }

    /// Returns `true` if `event_id` was already seen within the TTL window.
    pub fn check_and_insert(&self, event_id: &str) -> bool {
        let mut seen = self.seen.lock();
        let now = Instant::now();

        if seen.len() > self.cap {
            seen.retain(|_, ts| now.duration_since(*ts) < self.ttl);
        }

        if let Some(ts) = seen.get(event_id) {
            if now.duration_since(*ts) < self.ttl {
                return true;
            }
        }
        seen.insert(event_id.to_string(), now);
        false
    }
}

#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Routed(RoutedInbound),
    /// Dropped by the connector-provided filter step before dedup even ran.
    Filtered,
    Deduped,
    /// A thread message with no explicit mention and no prior turn in that
    /// thread — dropped rather than starting an unsolicited conversation.
    ThreadGated,
    /// A bootstrap-mode agent replied with its fixed bootstrap message
    /// instead of being routed to the sandbox.
    Bootstrapped,
}

const ACK_REACTION: &str = "eyes";
const BOOTSTRAP_REPLY: &str =
    "This agent hasn't been set up yet. An admin needs to complete its bootstrap before it can talk.";

/// Entry point for every channel connector — the full ingestion pipeline
/// (spec §4.10): filter, dedup, thread gate, thread backfill, bootstrap
/// gate, reaction acknowledgement, process, track.
pub async fn ingest(state: &AppState, envelope: ChannelEnvelope) -> Result<IngestOutcome> {
    if !state.channel_provider.should_respond(&envelope).await {
        return Ok(IngestOutcome::Filtered);
    }

    if let Some(event_id) = envelope.event_id.as_deref() {
        if state.channel_dedup.check_and_insert(event_id) {
            tracing::debug!(event_id, channel = %envelope.channel, "dropping duplicate channel delivery");
            return Ok(IngestOutcome::Deduped);
        }
    }

    let meta = InboundMetadata {
        channel: Some(envelope.channel.clone()),
        account_id: envelope.account_id.clone(),
        peer_id: Some(envelope.peer_id.clone()),
        group_id: envelope.group_id.clone(),
        channel_id: None,
        thread_id: envelope.thread_id.clone(),
        is_direct: envelope.is_direct,
    };

    let entry = resolve_session(state, &meta);
    let is_thread = meta.thread_id.is_some();
    let existing_turns = state.conversations.count(&entry.session_id)?;

    if is_thread && !envelope.is_mention && existing_turns == 0 {
        tracing::debug!(session_id = %entry.session_id, "thread message without a mention and no prior turn, dropping");
        let _ = state.audit.record(Some(&entry.session_id), "thread_gated", serde_json::json!({"channel": envelope.channel}));
        return Ok(IngestOutcome::ThreadGated);
    }

    if is_thread && envelope.is_mention && existing_turns == 0 {
        backfill_thread(state, &entry, &envelope, meta.thread_id.as_deref().unwrap()).await?;
    }

    let agent_id = &state.config.sessions.agent_id;
    if state.agents.is_bootstrap_mode(agent_id) && !state.agents.is_admin(agent_id, &envelope.peer_id) {
        let _ = state.channel_provider.send(&entry.session_id, BOOTSTRAP_REPLY).await;
        let _ = state.audit.record(Some(&entry.session_id), "bootstrap_gated", serde_json::json!({"sender": envelope.peer_id}));
        return Ok(IngestOutcome::Bootstrapped);
    }

    let ack_id = envelope.event_id.clone();
    if let Some(id) = &ack_id {
        let _ = state.channel_provider.add_reaction(&entry.session_id, id, ACK_REACTION).await;
    }

    let outcome = process_and_reply(state, &envelope, meta).await;

    if let Some(id) = &ack_id {
        let _ = state.channel_provider.remove_reaction(&entry.session_id, id, ACK_REACTION).await;
    }

    let routed = outcome?;

    TraceEvent::ChannelMessageIngested {
        channel: envelope.channel,
        session_id: routed.session.session_id.clone(),
        deduped: false,
    }
    .emit();

    Ok(IngestOutcome::Routed(routed))
}

/// Resolve (or create) the session an envelope maps to without yet
/// appending anything — needed ahead of [`process_inbound`] so the thread
/// gate and backfill steps can inspect the conversation log first.
fn resolve_session(state: &AppState, meta: &InboundMetadata) -> SessionEntry {
    let session_key = compute_session_key(&state.config.sessions.agent_id, state.config.sessions.dm_scope.clone(), meta);
    let origin = SessionOrigin {
        channel: meta.channel.clone(),
        account: meta.account_id.clone(),
        peer: meta.peer_id.clone(),
        group: meta.group_id.clone(),
    };
    state.sessions.resolve_or_create(&session_key.as_str(), origin).0
}

/// First mention in a thread with no turns recorded yet: fetch prior thread
/// messages through the provider and append them as user turns, in order,
/// excluding the message that triggered the fetch.
async fn backfill_thread(
    state: &AppState,
    entry: &SessionEntry,
    envelope: &ChannelEnvelope,
    thread_id: &str,
) -> Result<()> {
    let limit = state.config.channels.thread_backfill_limit;
    let Some(history) = state
        .channel_provider
        .fetch_thread_history(&envelope.channel, thread_id, limit)
        .await?
    else {
        return Ok(());
    };

    let mut seq = state.conversations.count(&entry.session_id)? as u64;
    let turns: Vec<ConversationTurn> = history
        .into_iter()
        .filter(|m| m.event_id != envelope.event_id)
        .map(|m| {
            let turn = ConversationTurn {
                session_id: entry.session_id.clone(),
                seq,
                role: Role::User,
                content: m.text,
                sender: Some(m.peer_id),
                timestamp: chrono::Utc::now(),
            };
            seq += 1;
            turn
        })
        .collect();

    if !turns.is_empty() {
        tracing::info!(session_id = %entry.session_id, count = turns.len(), "backfilled thread history");
        state.conversations.append_raw(&entry.session_id, &turns)?;
    }
    Ok(())
}

/// Route the message and, if the sandbox produces a reply before the wait
/// times out, hand it to the provider for delivery. A non-mention message
/// that the agent abstains from answering (suppressed/failed outcome) is
/// not treated as an error — only a mention is guaranteed a reply attempt.
async fn process_and_reply(
    state: &AppState,
    envelope: &ChannelEnvelope,
    meta: InboundMetadata,
) -> Result<RoutedInbound> {
    let msg = InboundMessage {
        meta,
        sender: envelope.peer_id.clone(),
        content: envelope.text.clone(),
    };
    let routed = process_inbound(state, msg).await?;

    let rx = state.reply_waiter.register(routed.queued_id);
    let timeout = Duration::from_secs(state.config.sandbox.timeout_sec + 10);
    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(ReplyResult::Delivered(content))) => {
            if let Err(e) = state.channel_provider.send(&routed.session.session_id, &content).await {
                tracing::warn!(session_id = %routed.session.session_id, error = %e, "failed to deliver channel reply");
            }
        }
        Ok(Ok(ReplyResult::Suppressed { reason })) => {
            tracing::info!(session_id = %routed.session.session_id, reason, "reply suppressed, nothing delivered to channel");
        }
        Ok(Ok(ReplyResult::Failed { diagnosis })) => {
            tracing::warn!(session_id = %routed.session.session_id, diagnosis, "turn failed, nothing delivered to channel");
        }
        Ok(Err(_)) => {
            state.reply_waiter.cancel(routed.queued_id);
            tracing::warn!(session_id = %routed.session.session_id, "reply channel closed before a result arrived");
        }
        Err(_) => {
            state.reply_waiter.cancel(routed.queued_id);
            tracing::warn!(session_id = %routed.session.session_id, "turn timed out, nothing delivered to channel");
        }
    }

    Ok(routed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_blocks_repeat_event_id_within_ttl() {
        let dedup = ChannelDedup::new(Duration::from_secs(60), 1_000);
        assert!(!dedup.check_and_insert("evt-1"));
        assert!(dedup.check_and_insert("evt-1"));
    }

    #[test]
    fn dedup_allows_distinct_event_ids() {
        let dedup = ChannelDedup::new(Duration::from_secs(60), 1_000);
        assert!(!dedup.check_and_insert("evt-1"));
        assert!(!dedup.check_and_insert("evt-2"));
    }

    #[test]
    fn dedup_prunes_once_past_cap() {
        let dedup = ChannelDedup::new(Duration::from_millis(10), 2);
        assert!(!dedup.check_and_insert("evt-1"));
        assert!(!dedup.check_and_insert("evt-2"));
        std::thread::sleep(Duration::from_millis(20));
        // Past cap, the next insert prunes expired entries first.
        assert!(!dedup.check_and_insert("evt-3"));
        assert!(!dedup.check_and_insert("evt-1"));
    }
}
