//! External collaborator implementations for the host's `web_fetch`,
//! `web_search`, and `browser_*` IPC actions.
//!
//! The IPC gateway depends only on the traits in [`traits`]; `web` and
//! `browser` are reference implementations an embedder wires up at startup.

pub mod traits;
pub mod web;

#[cfg(feature = "browser")]
pub mod browser;

pub use traits::{BrowserProvider, FetchResult, PageSnapshot, SearchHit, WebProvider};
pub use web::HttpWebProvider;

#[cfg(feature = "browser")]
pub use browser::ChromiumBrowserProvider;
