use std::time::Duration;

use bizscout_core::AppConfig;

/// Page addresses and time budgets for one [`crate::Extractor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorConfig {
    /// Platform origin without a trailing slash, e.g. `https://www.instagram.com`.
    pub base_url: String,
    /// Hashtag and keyword-search page loads.
    pub navigation_timeout: Duration,
    /// Post and account page loads.
    pub item_timeout: Duration,
    /// Waiting for a page's content container to render.
    pub content_timeout: Duration,
    /// Overall budget for a single run; checked before every navigation.
    pub run_deadline: Duration,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.instagram.com".to_string(),
            navigation_timeout: Duration::from_secs(60),
            item_timeout: Duration::from_secs(30),
            content_timeout: Duration::from_secs(10),
            run_deadline: Duration::from_secs(1800),
        }
    }
}

impl ExtractorConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            base_url: config.source_base_url.trim_end_matches('/').to_string(),
            navigation_timeout: Duration::from_secs(config.scraper_navigation_timeout_secs),
            item_timeout: Duration::from_secs(config.scraper_item_timeout_secs),
            content_timeout: Duration::from_secs(config.scraper_content_timeout_secs),
            run_deadline: Duration::from_secs(config.run_deadline_secs),
        }
    }
}
