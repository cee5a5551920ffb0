use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub browserless_url: String,
    pub browserless_token: Option<String>,
    pub source_base_url: String,
    pub scraper_user_agent: String,
    pub scraper_navigation_timeout_secs: u64,
    pub scraper_item_timeout_secs: u64,
    pub scraper_content_timeout_secs: u64,
    pub run_deadline_secs: u64,
    pub classifier_min_followers: i64,
    /// `None` means the built-in keyword list.
    pub classifier_keywords: Option<Vec<String>>,
    pub default_search_cron: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("browserless_url", &self.browserless_url)
            .field(
                "browserless_token",
                &self.browserless_token.as_ref().map(|_| "[redacted]"),
            )
            .field("source_base_url", &self.source_base_url)
            .field("scraper_user_agent", &self.scraper_user_agent)
            .field(
                "scraper_navigation_timeout_secs",
                &self.scraper_navigation_timeout_secs,
            )
            .field("scraper_item_timeout_secs", &self.scraper_item_timeout_secs)
            .field(
                "scraper_content_timeout_secs",
                &self.scraper_content_timeout_secs,
            )
            .field("run_deadline_secs", &self.run_deadline_secs)
            .field("classifier_min_followers", &self.classifier_min_followers)
            .field("classifier_keywords", &self.classifier_keywords)
            .field("default_search_cron", &self.default_search_cron)
            .finish()
    }
}
