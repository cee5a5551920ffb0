//! Database operations for `search_tasks`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use bizscout_core::{RunStats, Task, TaskDraft, TaskFilter, TaskPatch};

use crate::store::TaskStore;
use crate::{claim, DbError, RunClaim};

const TASK_COLUMNS: &str = "id, name, keywords, hashtags, search_limit, schedule, active, \
     correlation_id, last_run, next_run, profiles_collected, created_at, updated_at";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `search_tasks` table.
///
/// `search_limit` maps to [`Task::limit`]; `limit` is reserved in SQL.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskRow {
    pub id: i64,
    pub name: String,
    pub keywords: Vec<String>,
    pub hashtags: Vec<String>,
    pub search_limit: i32,
    pub schedule: String,
    pub active: bool,
    pub correlation_id: Uuid,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub profiles_collected: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            keywords: row.keywords,
            hashtags: row.hashtags,
            limit: row.search_limit,
            schedule: row.schedule,
            active: row.active,
            correlation_id: row.correlation_id,
            last_run: row.last_run,
            next_run: row.next_run,
            profiles_collected: row.profiles_collected,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// search_tasks operations
// ---------------------------------------------------------------------------

/// List tasks ordered by `id`, optionally restricted by the `active` flag.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_tasks(pool: &PgPool, filter: TaskFilter) -> Result<Vec<TaskRow>, DbError> {
    let rows = sqlx::query_as::<_, TaskRow>(&format!(
        "SELECT {TASK_COLUMNS} FROM search_tasks \
         WHERE ($1::boolean IS NULL OR active = $1) \
         ORDER BY id"
    ))
    .bind(filter.active)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no task has this `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_task(pool: &PgPool, id: i64) -> Result<TaskRow, DbError> {
    sqlx::query_as::<_, TaskRow>(&format!(
        "SELECT {TASK_COLUMNS} FROM search_tasks WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Insert a new task with a freshly generated correlation id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_task(pool: &PgPool, draft: &TaskDraft) -> Result<TaskRow, DbError> {
    let row = sqlx::query_as::<_, TaskRow>(&format!(
        "INSERT INTO search_tasks \
           (name, keywords, hashtags, search_limit, schedule, active, correlation_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {TASK_COLUMNS}"
    ))
    .bind(&draft.name)
    .bind(&draft.keywords)
    .bind(&draft.hashtags)
    .bind(draft.limit)
    .bind(&draft.schedule)
    .bind(draft.active)
    .bind(Uuid::new_v4())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Apply the present fields of `patch`; absent fields keep their stored value.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no task has this `id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_task(pool: &PgPool, id: i64, patch: &TaskPatch) -> Result<TaskRow, DbError> {
    sqlx::query_as::<_, TaskRow>(&format!(
        "UPDATE search_tasks SET \
           name = COALESCE($2, name), \
           keywords = COALESCE($3::text[], keywords), \
           hashtags = COALESCE($4::text[], hashtags), \
           search_limit = COALESCE($5, search_limit), \
           schedule = COALESCE($6, schedule), \
           active = COALESCE($7, active), \
           updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {TASK_COLUMNS}"
    ))
    .bind(id)
    .bind(patch.name.as_deref())
    .bind(patch.keywords.as_deref())
    .bind(patch.hashtags.as_deref())
    .bind(patch.limit)
    .bind(patch.schedule.as_deref())
    .bind(patch.active)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no task has this `id`, or
/// [`DbError::Sqlx`] if the delete fails.
pub async fn delete_task(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM search_tasks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Write the statistics of a finished run.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the task was deleted meanwhile, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn record_task_run(pool: &PgPool, id: i64, stats: &RunStats) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE search_tasks \
         SET last_run = $2, next_run = COALESCE($3, next_run), profiles_collected = $4, \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(stats.last_run)
    .bind(stats.next_run)
    .bind(stats.profiles_collected)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no task has this `id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn set_task_next_run(
    pool: &PgPool,
    id: i64,
    next_run: DateTime<Utc>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE search_tasks SET next_run = $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(next_run)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// TaskStore adapter
// ---------------------------------------------------------------------------

/// [`TaskStore`] backed by the `search_tasks` table.
#[derive(Debug, Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, DbError> {
        let rows = list_tasks(&self.pool, filter).await?;
        Ok(rows.into_iter().map(Task::from).collect())
    }

    async fn get_task(&self, id: i64) -> Result<Task, DbError> {
        get_task(&self.pool, id).await.map(Task::from)
    }

    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, DbError> {
        create_task(&self.pool, draft).await.map(Task::from)
    }

    async fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<Task, DbError> {
        update_task(&self.pool, id, patch).await.map(Task::from)
    }

    async fn delete_task(&self, id: i64) -> Result<(), DbError> {
        delete_task(&self.pool, id).await
    }

    async fn record_run(&self, id: i64, stats: &RunStats) -> Result<(), DbError> {
        record_task_run(&self.pool, id, stats).await
    }

    async fn set_next_run(&self, id: i64, next_run: DateTime<Utc>) -> Result<(), DbError> {
        set_task_next_run(&self.pool, id, next_run).await
    }

    async fn try_claim_run(&self, correlation_id: Uuid) -> Result<Option<RunClaim>, DbError> {
        claim::try_claim_run(&self.pool, correlation_id).await
    }
}
