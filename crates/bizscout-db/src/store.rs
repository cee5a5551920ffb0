//! Persistence seams consumed by the extractor and scheduler.
//!
//! Each trait has a Postgres implementation (`Pg*Store`) and an in-memory one
//! (`Memory*Store`) for tests and offline runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use bizscout_core::{
    Candidate, CompanyProfile, ProfileListQuery, ProfilePage, RunStats, SearchSettings, Task,
    TaskDraft, TaskFilter, TaskPatch,
};

use crate::{DbError, RunClaim};

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, DbError>;

    /// Returns [`DbError::NotFound`] when `id` does not exist.
    async fn get_task(&self, id: i64) -> Result<Task, DbError>;

    /// Assigns `id` and a fresh `correlation_id`; `profiles_collected` starts at 0.
    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, DbError>;

    /// Applies the present fields of `patch`. [`DbError::NotFound`] when absent.
    async fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<Task, DbError>;

    /// [`DbError::NotFound`] when absent.
    async fn delete_task(&self, id: i64) -> Result<(), DbError>;

    /// Write run statistics. A `None` `next_run` leaves the stored value alone.
    async fn record_run(&self, id: i64, stats: &RunStats) -> Result<(), DbError>;

    async fn set_next_run(&self, id: i64, next_run: DateTime<Utc>) -> Result<(), DbError>;

    /// Take the execution claim for the task with `correlation_id`.
    ///
    /// `None` means another run of the same task, possibly in another process,
    /// holds it. The claim lasts until the returned value is released or dropped.
    async fn try_claim_run(&self, correlation_id: Uuid) -> Result<Option<RunClaim>, DbError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Create or merge-update the company profile keyed by `candidate.username`.
    async fn upsert_instagram_profile(&self, candidate: &Candidate)
        -> Result<CompanyProfile, DbError>;

    async fn list_company_profiles(&self, query: &ProfileListQuery)
        -> Result<ProfilePage, DbError>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Insert `defaults` if no settings record exists, then return the stored record.
    async fn ensure_search_settings(
        &self,
        defaults: &SearchSettings,
    ) -> Result<SearchSettings, DbError>;

    /// [`DbError::NotFound`] before [`SettingsStore::ensure_search_settings`] ran.
    async fn get_search_settings(&self) -> Result<SearchSettings, DbError>;
}
