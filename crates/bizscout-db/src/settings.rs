//! The single-row `search_settings` record read by the default-search job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bizscout_core::SearchSettings;

use crate::store::SettingsStore;
use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SearchSettingsRow {
    pub enabled: bool,
    pub keywords: Vec<String>,
    pub hashtags: Vec<String>,
    pub search_limit: i32,
    pub updated_at: DateTime<Utc>,
}

impl From<SearchSettingsRow> for SearchSettings {
    fn from(row: SearchSettingsRow) -> Self {
        Self {
            enabled: row.enabled,
            keywords: row.keywords,
            hashtags: row.hashtags,
            limit: row.search_limit,
        }
    }
}

/// Insert `defaults` unless the record already exists, then return what is stored.
///
/// An existing record is never overwritten.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert or read fails.
pub async fn ensure_search_settings(
    pool: &PgPool,
    defaults: &SearchSettings,
) -> Result<SearchSettings, DbError> {
    sqlx::query(
        "INSERT INTO search_settings (id, enabled, keywords, hashtags, search_limit) \
         VALUES (1, $1, $2, $3, $4) \
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(defaults.enabled)
    .bind(&defaults.keywords)
    .bind(&defaults.hashtags)
    .bind(defaults.limit)
    .execute(pool)
    .await?;

    get_search_settings(pool).await
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if the record was never initialized, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_search_settings(pool: &PgPool) -> Result<SearchSettings, DbError> {
    sqlx::query_as::<_, SearchSettingsRow>(
        "SELECT enabled, keywords, hashtags, search_limit, updated_at \
         FROM search_settings WHERE id = 1",
    )
    .fetch_optional(pool)
    .await?
    .map(SearchSettings::from)
    .ok_or(DbError::NotFound)
}

#[derive(Debug, Clone)]
pub struct PgSettingsStore {
    pool: PgPool,
}

impl PgSettingsStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for PgSettingsStore {
    async fn ensure_search_settings(
        &self,
        defaults: &SearchSettings,
    ) -> Result<SearchSettings, DbError> {
        ensure_search_settings(&self.pool, defaults).await
    }

    async fn get_search_settings(&self) -> Result<SearchSettings, DbError> {
        get_search_settings(&self.pool).await
    }
}
