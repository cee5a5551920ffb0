//! Extraction pipeline: seed pages to classified, persisted business profiles.

pub mod config;
pub mod error;
pub mod pipeline;

pub use config::ExtractorConfig;
pub use error::ExtractorError;
pub use pipeline::{Extractor, RunOutcome};
