//! Memory entry model for the `memory_{write,query,read,delete,list}` IPC
//! actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single stored memory, scoped to an agent/session namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub scope: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// `memory_write` request payload.
#[derive(Debug, Clone, Deserialize)]
pub struct WriteRequest {
    pub scope: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// `memory_query` request payload. `query` is matched as a substring against
/// entry content and tags; omitting it returns the scope's most recent
/// entries, newest first.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub scope: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// `memory_list` request payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ListRequest {
    pub scope: String,
    #[serde(default)]
    pub limit: Option<usize>,
}
