//! The channel provider contract: whatever actually owns a connection to an
//! external chat surface (a webhook relay, a Slack/Discord client running
//! out of process, a CLI bridge). The ingestion pipeline only depends on
//! this trait, so any of those is a drop-in replacement for
//! [`HttpChannelProvider`].
//!
//! Connect/disconnect mirror the callback interface's lifecycle hooks;
//! `onMessage` has no method here because this host is push-driven — the
//! HTTP ingestion endpoint *is* the message callback, invoking the pipeline
//! directly instead of a provider registering a handler for it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use ax_domain::error::Result;

use super::ChannelEnvelope;

/// A reply queued for a polling relay to deliver. Only providers with no
/// direct outbound transport of their own (the reference HTTP provider)
/// populate this; a provider with a live platform client delivers directly
/// from [`ChannelProvider::send`] and leaves [`ChannelProvider::poll_outbox`]
/// at its default empty implementation.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundDelivery {
    pub session_id: String,
    pub content: String,
    pub enqueued_at: DateTime<Utc>,
}

#[async_trait]
pub trait ChannelProvider: Send + Sync {
    /// The provider's identifier, e.g. `"http"`, `"slack"`.
    fn name(&self) -> &str;

    /// Called once at startup. Providers that own a persistent connection
    /// (a websocket, a long-poll loop) establish it here.
    async fn connect(&self) -> Result<()>;

    /// Called during graceful shutdown.
    async fn disconnect(&self) -> Result<()>;

    /// The filter step of ingestion: whether this message should be
    /// processed at all. The default passes everything through; a provider
    /// that knows about bot-loop prevention, rate limits, or muted channels
    /// overrides it.
    async fn should_respond(&self, _msg: &ChannelEnvelope) -> bool {
        true
    }

    /// Deliver a reply to the channel session identified by `session_id`.
    async fn send(&self, session_id: &str, content: &str) -> Result<()>;

    /// Add a reaction to the message `message_id` was assigned to, as an
    /// acknowledgement that the host is working on a reply. Providers that
    /// don't support reactions accept the default no-op.
    async fn add_reaction(&self, _session_id: &str, _message_id: &str, _reaction: &str) -> Result<()> {
        Ok(())
    }

    /// Remove a previously-added reaction. Always called in a `finally`
    /// position by the pipeline, regardless of how processing ended.
    async fn remove_reaction(&self, _session_id: &str, _message_id: &str, _reaction: &str) -> Result<()> {
        Ok(())
    }

    /// Fetch up to `limit` prior messages in a thread, oldest first,
    /// excluding whatever message triggered the fetch. `None` means the
    /// provider doesn't support thread history (backfill is skipped, not
    /// treated as an error).
    async fn fetch_thread_history(
        &self,
        _channel: &str,
        _thread_id: &str,
        _limit: usize,
    ) -> Result<Option<Vec<ChannelEnvelope>>> {
        Ok(None)
    }

    /// Drain up to `limit` pending poll-relay deliveries, oldest first.
    /// Providers that deliver directly from `send` leave this empty.
    fn poll_outbox(&self, _limit: usize) -> Vec<OutboundDelivery> {
        Vec::new()
    }
}
