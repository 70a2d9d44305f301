//! `ax-memory` — the `MemoryProvider` trait used by the gateway's
//! `memory_{write,query,read,delete,list}` IPC actions, plus a file-backed
//! reference implementation.
//!
//! Hosted or vector-search backends are external collaborators behind the
//! same trait and out of scope for this crate.

pub mod file_store;
pub mod provider;
pub mod types;

pub use file_store::FileMemoryProvider;
pub use provider::MemoryProvider;
pub use types::{ListRequest, MemoryEntry, QueryRequest, WriteRequest};
