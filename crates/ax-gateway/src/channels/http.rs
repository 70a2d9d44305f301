//! Reference [`ChannelProvider`] implementation: a generic webhook channel.
//!
//! Inbound messages already arrive by connectors `POST`ing to
//! `/v1/channel/ingest`; this provider's half of the contract is outbound —
//! `send` doesn't call out to anywhere (a generic webhook relay has no fixed
//! callback URL to call back into), it appends to an in-memory outbox that
//! `GET /v1/channel/outbox` drains. The relay polls that endpoint and is
//! responsible for actually delivering the reply to Slack/Discord/whatever
//! it fronts.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use ax_domain::error::Result;

use super::provider::{ChannelProvider, OutboundDelivery};
use super::ChannelEnvelope;

const MAX_OUTBOX: usize = 1_000;

pub struct HttpChannelProvider {
    outbox: Mutex<VecDeque<OutboundDelivery>>,
}

impl HttpChannelProvider {
    pub fn new() -> Self {
        Self {
            outbox: Mutex::new(VecDeque::new()),
        }
    }

    /// Pop up to `limit` pending deliveries, oldest first, for a polling
    /// relay to pick up and hand to the real transport.
    pub fn drain_outbox(&self, limit: usize) -> Vec<OutboundDelivery> {
        let mut outbox = self.outbox.lock();
        let n = limit.min(outbox.len());
        outbox.drain(..n).collect()
    }
}

impl Default for HttpChannelProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelProvider for HttpChannelProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn connect(&self) -> Result<()> {
        tracing::info!("http channel provider ready (poll /v1/channel/outbox for deliveries)");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn send(&self, session_id: &str, content: &str) -> Result<()> {
        let mut outbox = self.outbox.lock();
        if outbox.len() >= MAX_OUTBOX {
            outbox.pop_front();
            tracing::warn!("channel outbox at capacity, dropping oldest undelivered reply");
        }
        outbox.push_back(OutboundDelivery {
            session_id: session_id.to_string(),
            content: content.to_string(),
            enqueued_at: Utc::now(),
        });
        Ok(())
    }

    fn poll_outbox(&self, limit: usize) -> Vec<OutboundDelivery> {
        self.drain_outbox(limit)
    }

    // add_reaction / remove_reaction / fetch_thread_history keep their
    // trait defaults: a generic webhook relay has no reaction API and no
    // history to fetch — those belong to a provider that knows a real
    // platform (e.g. an in-tree Slack/Discord provider, out of scope here).
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_enqueues_for_later_drain() {
        let provider = HttpChannelProvider::new();
        provider.send("s1", "hello").await.unwrap();
        provider.send("s1", "world").await.unwrap();
        let drained = provider.drain_outbox(10);
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].content, "hello");
        assert_eq!(drained[1].content, "world");
        assert!(provider.drain_outbox(10).is_empty());
    }

    #[tokio::test]
    async fn drain_respects_limit_and_leaves_remainder() {
        let provider = HttpChannelProvider::new();
        for i in 0..5 {
            provider.send("s1", &format!("msg-{i}")).await.unwrap();
        }
        let first = provider.drain_outbox(2);
        assert_eq!(first.len(), 2);
        let rest = provider.drain_outbox(10);
        assert_eq!(rest.len(), 3);
    }

    #[tokio::test]
    async fn default_should_respond_passes_everything() {
        let provider = HttpChannelProvider::new();
        let msg = ChannelEnvelope {
            channel: "webhook".to_string(),
            peer_id: "u1".to_string(),
            account_id: None,
            group_id: None,
            thread_id: None,
            is_direct: true,
            text: "hi".to_string(),
            event_id: None,
            is_mention: false,
        };
        assert!(provider.should_respond(&msg).await);
    }
}
