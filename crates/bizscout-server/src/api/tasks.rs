//! Task CRUD and run-now handlers. Writes go through the scheduler so live
//! jobs stay in step with stored tasks.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use bizscout_core::{CompanyProfile, Task, TaskDraft, TaskFilter, TaskPatch};

use crate::middleware::RequestId;

use super::{map_db_error, map_scheduler_error, ok, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct TaskListQuery {
    pub active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(super) struct TaskRunResponse {
    task_id: i64,
    profiles_collected: i32,
    failed_persists: usize,
    profiles: Vec<CompanyProfile>,
}

/// GET /api/v1/tasks
pub(super) async fn list_tasks(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<ApiResponse<Vec<Task>>>, ApiError> {
    let tasks = state
        .scheduler
        .tasks()
        .list_tasks(TaskFilter {
            active: query.active,
        })
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(ok(req_id, tasks))
}

/// GET /api/v1/tasks/{id}
pub(super) async fn get_task(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Task>>, ApiError> {
    let task = state
        .scheduler
        .tasks()
        .get_task(id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(ok(req_id, task))
}

/// POST /api/v1/tasks
pub(super) async fn create_task(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<TaskDraft>,
) -> Result<(StatusCode, Json<ApiResponse<Task>>), ApiError> {
    let task = state
        .scheduler
        .create(body)
        .await
        .map_err(|e| map_scheduler_error(req_id.0.clone(), &e))?;
    Ok((StatusCode::CREATED, ok(req_id, task)))
}

/// PUT /api/v1/tasks/{id}
pub(super) async fn update_task(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<TaskPatch>,
) -> Result<Json<ApiResponse<Task>>, ApiError> {
    let task = state
        .scheduler
        .update(id, body)
        .await
        .map_err(|e| map_scheduler_error(req_id.0.clone(), &e))?;
    Ok(ok(req_id, task))
}

/// DELETE /api/v1/tasks/{id}
pub(super) async fn delete_task(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .scheduler
        .delete(id)
        .await
        .map_err(|e| map_scheduler_error(req_id.0, &e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/tasks/{id}/run
pub(super) async fn run_task(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<TaskRunResponse>>, ApiError> {
    let outcome = state
        .scheduler
        .run_now(id)
        .await
        .map_err(|e| map_scheduler_error(req_id.0.clone(), &e))?;
    Ok(ok(
        req_id,
        TaskRunResponse {
            task_id: id,
            profiles_collected: outcome.profiles_collected(),
            failed_persists: outcome.failed_persists,
            profiles: outcome.persisted,
        },
    ))
}
