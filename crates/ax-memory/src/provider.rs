//! The `MemoryProvider` trait defines the interface every memory backend
//! (file-backed, hosted, mock/test) implements for the gateway's
//! `memory_{write,query,read,delete,list}` IPC actions.

use async_trait::async_trait;
use ax_domain::error::Result;

use crate::types::MemoryEntry;

/// Abstraction over a scoped memory store. A "scope" is an opaque namespace
/// string (typically derived from the session key) that partitions entries
/// between agents/sessions; it is never interpreted by the provider.
#[async_trait]
pub trait MemoryProvider: Send + Sync {
    /// Store a new entry under `scope`, returning the persisted entry
    /// (including its assigned id).
    async fn write(&self, scope: &str, content: &str, tags: Vec<String>) -> Result<MemoryEntry>;

    /// Search `scope` for entries whose content or tags match `query`
    /// (substring match), newest first, capped at `limit` (provider default
    /// if `None`). `query` of `None` returns the scope's most recent entries.
    async fn query(
        &self,
        scope: &str,
        query: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<MemoryEntry>>;

    /// Fetch a single entry by id.
    async fn read(&self, id: &str) -> Result<MemoryEntry>;

    /// Delete an entry by id. Deleting a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    /// List `scope`'s entries newest first, capped at `limit`.
    async fn list(&self, scope: &str, limit: Option<usize>) -> Result<Vec<MemoryEntry>>;
}
