//! External collaborator contracts for the `web_fetch`/`web_search` and
//! `browser_*` IPC actions. Like [`ax_providers::LlmProvider`] and
//! [`ax_memory::MemoryProvider`], these traits are the seam: the `llm_call`
//! handler's siblings call through `dyn WebProvider`/`dyn BrowserProvider`
//! and never see a concrete vendor integration.

use ax_domain::error::Result;
use async_trait::async_trait;

/// Result of a `web_fetch` call.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FetchResult {
    pub url: String,
    pub status: u16,
    pub content_type: String,
    pub bytes: usize,
    pub text: String,
}

/// A single `web_search` hit.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// The `web_fetch`/`web_search` provider contract. SSRF protection against
/// the fetched URL is the implementation's duty, per spec — the IPC handler
/// only audits the call and forwards the provider's result.
#[async_trait]
pub trait WebProvider: Send + Sync {
    async fn fetch(&self, url: &str, extract_text: bool) -> Result<FetchResult>;
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;
}

/// A snapshot of the current page, in the mode the caller asked for.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub text: String,
}

/// The `browser_*` provider contract. Every operation is scoped to a
/// `session` id so that multiple agent turns can drive independent browser
/// sessions concurrently; the provider owns the mapping from session id to
/// whatever underlying browser handle it manages.
#[async_trait]
pub trait BrowserProvider: Send + Sync {
    /// Open a new session and navigate it to `url`, returning the session id.
    async fn open(&self, url: &str) -> Result<String>;

    /// Navigate an existing session to `url`.
    async fn navigate(&self, session: &str, url: &str) -> Result<()>;

    /// Click the element matching `reference` (a CSS selector).
    async fn click(&self, session: &str, reference: &str) -> Result<()>;

    /// Type `text` into the element matching `reference`.
    async fn type_text(&self, session: &str, reference: &str, text: &str) -> Result<()>;

    /// Capture the session's current URL, title, and visible text.
    async fn snapshot(&self, session: &str) -> Result<PageSnapshot>;

    /// Tear down a session and release its resources.
    async fn close(&self, session: &str) -> Result<()>;
}
