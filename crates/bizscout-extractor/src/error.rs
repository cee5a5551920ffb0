use thiserror::Error;

use bizscout_scraper::ScraperError;

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No browsing session could be started; the whole run is abandoned.
    #[error("browsing capability unavailable: {0}")]
    CapabilityUnavailable(#[source] ScraperError),

    #[error("extraction failed: {0}")]
    Extraction(#[source] ScraperError),

    #[error("profile store error: {0}")]
    Store(#[from] bizscout_db::DbError),
}
