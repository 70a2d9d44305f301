//! Synchronous bridge between the HTTP surface and the durable queue.
//!
//! A request that wants to wait for a reply (`POST /v1/chat/completions`,
//! the channel-ingestion endpoint) registers the queued message id here and
//! awaits the returned receiver. The sandbox orchestrator calls [`notify`]
//! once [`crate::sandbox::run_turn`] (via [`run_next`]) has produced an
//! outcome for that id. A caller that gives up (client disconnect, timeout)
//! simply drops the receiver; [`notify`] on a dropped receiver is a no-op.
//!
//! [`run_next`]: crate::sandbox::run_next

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// What a waiting HTTP handler receives once its turn finishes.
#[derive(Debug, Clone)]
pub enum ReplyResult {
    Delivered(String),
    Suppressed { reason: String },
    Failed { diagnosis: String },
}

#[derive(Default)]
pub struct ReplyWaiter {
    pending: Mutex<HashMap<u64, oneshot::Sender<ReplyResult>>>,
}

impl ReplyWaiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `queued_id`'s outcome. Must be called before the
    /// orchestrator can possibly process that id, which in practice means
    /// immediately after `state.queue.enqueue(..)` returns it.
    pub fn register(&self, queued_id: u64) -> oneshot::Receiver<ReplyResult> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(queued_id, tx);
        rx
    }

    /// Deliver an outcome to whoever is waiting on `queued_id`, if anyone.
    pub fn notify(&self, queued_id: u64, result: ReplyResult) {
        if let Some(tx) = self.pending.lock().remove(&queued_id) {
            let _ = tx.send(result);
        }
    }

    /// Drop a stale registration (caller gave up before the turn finished).
    pub fn cancel(&self, queued_id: u64) {
        self.pending.lock().remove(&queued_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notify_delivers_to_registered_waiter() {
        let waiter = ReplyWaiter::new();
        let rx = waiter.register(1);
        waiter.notify(1, ReplyResult::Delivered("hi".to_string()));
        match rx.await.unwrap() {
            ReplyResult::Delivered(text) => assert_eq!(text, "hi"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn notify_on_unregistered_id_is_noop() {
        let waiter = ReplyWaiter::new();
        waiter.notify(42, ReplyResult::Failed { diagnosis: "x".into() });
    }
}
