//! The durable queue's row shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status transitions form `Queued -> InFlight -> (Complete | Failed)`, no
/// backward edges. At most one `InFlight` row per `session_id` at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Queued,
    InFlight,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub id: u64,
    pub session_id: String,
    /// The session's routing address (`compute_session_key`'s output), kept
    /// alongside the internal `session_id` so a consumer can resolve the
    /// on-disk workspace without a reverse lookup through the session store.
    pub session_key: String,
    pub sender: String,
    pub channel: String,
    pub content: String,
    pub status: MessageStatus,
    pub enqueued_at: DateTime<Utc>,
}

/// Fields supplied by the caller when enqueuing; `id`/`status`/`enqueued_at`
/// are assigned by the queue.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub session_id: String,
    pub session_key: String,
    pub sender: String,
    pub channel: String,
    pub content: String,
}
