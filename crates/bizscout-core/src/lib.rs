//! Domain types, configuration, and pure decision logic shared by every
//! bizscout crate.

pub mod app_config;
pub mod classify;
pub mod config;
pub mod profiles;
pub mod settings;
pub mod tasks;

pub use app_config::{AppConfig, Environment};
pub use classify::{Classifier, DEFAULT_BUSINESS_KEYWORDS, DEFAULT_MIN_FOLLOWERS};
pub use config::{load_app_config, load_app_config_from_env};
pub use profiles::{
    Candidate, CompanyProfile, InstagramProfile, ProfileListQuery, ProfilePage, INSTAGRAM_SOURCE,
};
pub use settings::{SearchSeed, SearchSettings};
pub use tasks::{validate_cron_shape, RunStats, Task, TaskDraft, TaskFilter, TaskPatch};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid cron expression \"{expression}\": {reason}")]
    InvalidCron { expression: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
