//! `ChromiumBrowserProvider` — a [`BrowserProvider`] backed by a headless
//! Chromium instance via `chromiumoxide`.
//!
//! Gated behind the `browser` feature: driving a real browser is a heavyweight
//! dependency most deployments of this host won't need, so it's opt-in the
//! same way it is upstream in the pack this module borrows its CDP usage
//! from. One `Browser` process is shared across sessions; each `open()` call
//! gets its own `Page` tracked under a generated session id so concurrent
//! agent turns don't step on each other's navigation state.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ax_domain::error::{Error, Result};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures_util::StreamExt;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::traits::{BrowserProvider, PageSnapshot};

pub struct ChromiumBrowserProvider {
    browser: Mutex<Browser>,
    pages: RwLock<HashMap<String, Arc<Page>>>,
    _handler: JoinHandle<()>,
}

impl ChromiumBrowserProvider {
    pub async fn launch() -> Result<Self> {
        let config = BrowserConfig::builder()
            .build()
            .map_err(|e| Error::Other(format!("browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::Other(format!("launch chromium: {e}")))?;

        let _handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        Ok(Self {
            browser: Mutex::new(browser),
            pages: RwLock::new(HashMap::new()),
            _handler,
        })
    }

    async fn page(&self, session: &str) -> Result<Arc<Page>> {
        self.pages
            .read()
            .await
            .get(session)
            .cloned()
            .ok_or_else(|| Error::Other(format!("unknown browser session: {session}")))
    }
}

#[async_trait]
impl BrowserProvider for ChromiumBrowserProvider {
    async fn open(&self, url: &str) -> Result<String> {
        let page = self
            .browser
            .lock()
            .await
            .new_page(url)
            .await
            .map_err(|e| Error::Other(format!("open page: {e}")))?;

        let session = uuid::Uuid::new_v4().to_string();
        self.pages
            .write()
            .await
            .insert(session.clone(), Arc::new(page));
        Ok(session)
    }

    async fn navigate(&self, session: &str, url: &str) -> Result<()> {
        self.page(session)
            .await?
            .goto(url)
            .await
            .map_err(|e| Error::Other(format!("navigate: {e}")))?;
        Ok(())
    }

    async fn click(&self, session: &str, reference: &str) -> Result<()> {
        let page = self.page(session).await?;
        let elem = page
            .find_element(reference)
            .await
            .map_err(|e| Error::Other(format!("find element {reference}: {e}")))?;
        elem.click()
            .await
            .map_err(|e| Error::Other(format!("click {reference}: {e}")))?;
        Ok(())
    }

    async fn type_text(&self, session: &str, reference: &str, text: &str) -> Result<()> {
        let page = self.page(session).await?;
        let elem = page
            .find_element(reference)
            .await
            .map_err(|e| Error::Other(format!("find element {reference}: {e}")))?;
        elem.click()
            .await
            .map_err(|e| Error::Other(format!("focus {reference}: {e}")))?;
        elem.type_str(text)
            .await
            .map_err(|e| Error::Other(format!("type into {reference}: {e}")))?;
        Ok(())
    }

    async fn snapshot(&self, session: &str) -> Result<PageSnapshot> {
        let page = self.page(session).await?;

        let url = page
            .url()
            .await
            .map_err(|e| Error::Other(format!("read url: {e}")))?
            .unwrap_or_default();
        let title = page
            .get_title()
            .await
            .map_err(|e| Error::Other(format!("read title: {e}")))?
            .unwrap_or_default();
        let text = page
            .evaluate("document.body ? document.body.innerText : ''")
            .await
            .map_err(|e| Error::Other(format!("read text: {e}")))?
            .into_value::<String>()
            .map_err(|e| Error::Other(format!("decode text: {e}")))?;

        Ok(PageSnapshot { url, title, text })
    }

    async fn close(&self, session: &str) -> Result<()> {
        let page = self
            .pages
            .write()
            .await
            .remove(session)
            .ok_or_else(|| Error::Other(format!("unknown browser session: {session}")))?;
        page.close()
            .await
            .map_err(|e| Error::Other(format!("close session {session}: {e}")))?;
        Ok(())
    }
}
