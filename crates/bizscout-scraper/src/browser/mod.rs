//! Browsing-automation capability.
//!
//! A [`BrowserLauncher`] opens one [`BrowserSession`] per run. Sessions render a
//! page and then answer typed DOM queries against the rendered document.

mod browserless;
mod snapshot;
mod static_browser;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ScraperError;

pub use browserless::{BrowserlessLauncher, BrowserlessSession};
pub use snapshot::PageSnapshot;
pub use static_browser::StaticBrowser;

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Open a session.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::CapabilityUnavailable`] when no session can be started.
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, ScraperError>;
}

/// One browsing session. Reads run against the most recently rendered page;
/// before the first navigation they see an empty document.
#[async_trait]
pub trait BrowserSession: Send {
    /// Load `url`, waiting until the network is idle or `timeout` elapses.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), ScraperError>;

    /// Wait until `selector` matches on the current page.
    ///
    /// Returns [`ScraperError::Timeout`] when it does not appear in time.
    async fn wait_for_element(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), ScraperError>;

    /// Release the session once the owner is done with it. The session is not
    /// used again afterwards.
    async fn close(&mut self) -> Result<(), ScraperError>;

    /// Release without awaiting. Called instead of [`BrowserSession::close`]
    /// when the owner is dropped first, e.g. because its run was cancelled.
    fn abandon(&mut self) {}

    fn page(&self) -> &PageSnapshot;

    fn current_url(&self) -> Option<&str> {
        self.page().url()
    }

    fn exists(&self, selector: &str) -> Result<bool, ScraperError> {
        self.page().exists(selector)
    }

    fn read_attribute(&self, selector: &str, name: &str) -> Result<Option<String>, ScraperError> {
        self.page().attribute(selector, name)
    }

    fn read_all_attributes(&self, selector: &str, name: &str) -> Result<Vec<String>, ScraperError> {
        self.page().all_attributes(selector, name)
    }

    fn read_text(&self, selector: &str) -> Result<Option<String>, ScraperError> {
        self.page().text(selector)
    }

    fn read_all_text(&self, selector: &str) -> Result<Vec<String>, ScraperError> {
        self.page().all_text(selector)
    }
}
