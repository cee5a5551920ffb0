use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("browsing capability unavailable: {reason}")]
    CapabilityUnavailable { reason: String },

    #[error("timed out after {timeout_ms}ms waiting for {target}")]
    Timeout { target: String, timeout_ms: u64 },

    #[error("navigation to {url} failed with status {status}")]
    Navigation { url: String, status: u16 },

    #[error("no page loaded; navigate before waiting for \"{selector}\"")]
    NoPage { selector: String },

    #[error("invalid CSS selector \"{selector}\": {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("rendering backend returned {status}: {message}")]
    Backend { status: u16, message: String },
}

impl ScraperError {
    /// Whether the error means the whole capability is gone rather than one page failing.
    #[must_use]
    pub fn is_capability_failure(&self) -> bool {
        matches!(self, Self::CapabilityUnavailable { .. })
    }
}
