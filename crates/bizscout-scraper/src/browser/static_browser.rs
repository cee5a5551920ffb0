use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{BrowserLauncher, BrowserSession, PageSnapshot};
use crate::error::ScraperError;

/// Launcher that serves fixed HTML per URL.
///
/// Unknown URLs fail navigation with status 404. Waiting for an element never
/// blocks: it succeeds if the element is in the page and times out otherwise.
/// Every navigation is recorded, and open sessions are counted so callers can
/// assert that sessions were released.
#[derive(Debug, Clone, Default)]
pub struct StaticBrowser {
    pages: Arc<HashMap<String, String>>,
    navigations: Arc<Mutex<Vec<String>>>,
    open_sessions: Arc<AtomicUsize>,
    unavailable: bool,
}

impl StaticBrowser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.pages).insert(url.into(), html.into());
        self
    }

    /// Every launch fails with [`ScraperError::CapabilityUnavailable`].
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// URLs navigated so far, across all sessions, in order.
    #[must_use]
    pub fn navigations(&self) -> Vec<String> {
        self.navigations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for StaticBrowser {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, ScraperError> {
        if self.unavailable {
            return Err(ScraperError::CapabilityUnavailable {
                reason: "static browser configured as unavailable".to_string(),
            });
        }
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StaticSession {
            browser: self.clone(),
            page: PageSnapshot::default(),
        }))
    }
}

struct StaticSession {
    browser: StaticBrowser,
    page: PageSnapshot,
}

#[async_trait]
impl BrowserSession for StaticSession {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<(), ScraperError> {
        self.browser
            .navigations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());

        let html = self
            .browser
            .pages
            .get(url)
            .ok_or_else(|| ScraperError::Navigation {
                url: url.to_string(),
                status: 404,
            })?;
        self.page = PageSnapshot::new(url, html.clone());
        Ok(())
    }

    async fn wait_for_element(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), ScraperError> {
        if self.page.exists(selector)? {
            Ok(())
        } else {
            Err(ScraperError::Timeout {
                target: format!("selector \"{selector}\""),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })
        }
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.browser.open_sessions.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn abandon(&mut self) {
        self.browser.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }

    fn page(&self) -> &PageSnapshot {
        &self.page
    }
}
