//! Session backed by a Browserless `/content` endpoint.
//!
//! Browserless renders the page in headless Chrome and returns the final HTML.
//! Each navigation is one render; waiting for an element that the current
//! render lacks re-renders the same URL with `waitForSelector`.

use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::Client;
use serde_json::json;

use bizscout_core::AppConfig;

use super::{BrowserLauncher, BrowserSession, PageSnapshot};
use crate::error::ScraperError;

/// Extra time granted to the HTTP request beyond the render timeout, so the
/// backend reports its own timeout before the client gives up.
const REQUEST_SLACK: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct BrowserlessLauncher {
    client: Client,
    base_url: String,
    token: Option<String>,
    user_agent: String,
}

impl BrowserlessLauncher {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(base_url: &str, token: Option<&str>, user_agent: &str) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(str::to_string),
            user_agent: user_agent.to_string(),
        })
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be constructed.
    pub fn from_config(config: &AppConfig) -> Result<Self, ScraperError> {
        Self::new(
            &config.browserless_url,
            config.browserless_token.as_deref(),
            &config.scraper_user_agent,
        )
    }

    fn endpoint(&self, path: &str) -> String {
        let mut endpoint = format!("{}{path}", self.base_url);
        if let Some(token) = &self.token {
            endpoint.push_str("?token=");
            endpoint.extend(utf8_percent_encode(token, NON_ALPHANUMERIC));
        }
        endpoint
    }
}

#[async_trait]
impl BrowserLauncher for BrowserlessLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, ScraperError> {
        let version = self
            .client
            .get(self.endpoint("/json/version"))
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| ScraperError::CapabilityUnavailable {
                reason: format!("rendering backend unreachable: {e}"),
            })?;

        let status = version.status();
        if !status.is_success() {
            return Err(ScraperError::CapabilityUnavailable {
                reason: format!("rendering backend version check returned {status}"),
            });
        }

        tracing::debug!(backend = %self.base_url, "browser: session opened");
        Ok(Box::new(BrowserlessSession {
            client: self.client.clone(),
            content_endpoint: self.endpoint("/content"),
            user_agent: self.user_agent.clone(),
            page: PageSnapshot::default(),
        }))
    }
}

#[derive(Debug)]
pub struct BrowserlessSession {
    client: Client,
    content_endpoint: String,
    user_agent: String,
    page: PageSnapshot,
}

impl BrowserlessSession {
    async fn render(
        &self,
        url: &str,
        wait_selector: Option<&str>,
        timeout: Duration,
    ) -> Result<String, ScraperError> {
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let mut body = json!({
            "url": url,
            "userAgent": self.user_agent,
            "gotoOptions": { "waitUntil": "networkidle2", "timeout": timeout_ms },
        });
        if let Some(selector) = wait_selector {
            body["waitForSelector"] = json!({ "selector": selector, "timeout": timeout_ms });
        }

        let target = wait_selector.map_or_else(|| url.to_string(), |s| format!("selector \"{s}\""));
        let response = self
            .client
            .post(&self.content_endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .timeout(timeout + REQUEST_SLACK)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScraperError::Timeout {
                        target: target.clone(),
                        timeout_ms,
                    }
                } else {
                    ScraperError::Http(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.text().await?);
        }

        let message = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::REQUEST_TIMEOUT
            || message.to_ascii_lowercase().contains("timeout")
        {
            return Err(ScraperError::Timeout { target, timeout_ms });
        }
        if wait_selector.is_none() && status.is_client_error() {
            return Err(ScraperError::Navigation {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Err(ScraperError::Backend {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl BrowserSession for BrowserlessSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), ScraperError> {
        let html = self.render(url, None, timeout).await?;
        self.page = PageSnapshot::new(url, html);
        Ok(())
    }

    async fn wait_for_element(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), ScraperError> {
        if self.page.exists(selector)? {
            return Ok(());
        }
        let Some(url) = self.page.url().map(str::to_string) else {
            return Err(ScraperError::NoPage {
                selector: selector.to_string(),
            });
        };

        let html = self.render(&url, Some(selector), timeout).await?;
        self.page = PageSnapshot::new(url, html);
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
        // /content renders are stateless on the backend; nothing to release remotely.
        tracing::debug!("browser: session closed");
        Ok(())
    }

    fn abandon(&mut self) {
        tracing::debug!(url = ?self.page.url(), "browser: session abandoned");
    }

    fn page(&self) -> &PageSnapshot {
        &self.page
    }
}
