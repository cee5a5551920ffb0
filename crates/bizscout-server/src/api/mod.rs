mod profiles;
mod search;
mod tasks;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use bizscout_db::{DbError, ProfileStore};
use bizscout_extractor::{Extractor, ExtractorError};

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
    REQUEST_ID_HEADER,
};
use crate::scheduler::{SchedulerError, TaskScheduler};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub scheduler: Arc<TaskScheduler>,
    pub extractor: Arc<Extractor>,
    pub profiles: Arc<dyn ProfileStore>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
    live_jobs: usize,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "capability_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), Json(self)).into_response()
    }
}

pub(super) fn ok<T: Serialize>(req_id: RequestId, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    })
}

pub(super) fn map_db_error(request_id: String, error: &DbError) -> ApiError {
    if matches!(error, DbError::NotFound) {
        return ApiError::new(request_id, "not_found", "record not found");
    }
    tracing::error!(error = %error, "database query failed");
    ApiError::new(
        request_id,
        "internal_error",
        format!("database query failed: {error}"),
    )
}

pub(super) fn map_extractor_error(request_id: String, error: &ExtractorError) -> ApiError {
    match error {
        ExtractorError::InvalidInput(message) => {
            ApiError::new(request_id, "validation_error", message.clone())
        }
        ExtractorError::CapabilityUnavailable(source) => {
            tracing::error!(error = %source, "browsing capability unavailable");
            ApiError::new(request_id, "capability_unavailable", error.to_string())
        }
        ExtractorError::Extraction(source) => {
            tracing::warn!(error = %source, "extraction failed");
            ApiError::new(request_id, "extraction_failed", error.to_string())
        }
        ExtractorError::Store(db) => map_db_error(request_id, db),
    }
}

pub(super) fn map_scheduler_error(request_id: String, error: &SchedulerError) -> ApiError {
    match error {
        SchedulerError::NotFound { .. } => ApiError::new(request_id, "not_found", error.to_string()),
        SchedulerError::InvalidInput(_) | SchedulerError::InvalidSchedule { .. } => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
        SchedulerError::AlreadyRunning { .. } => {
            ApiError::new(request_id, "conflict", error.to_string())
        }
        SchedulerError::Extraction(inner) => map_extractor_error(request_id, inner),
        SchedulerError::Store(db) => map_db_error(request_id, db),
        SchedulerError::Scheduler(e) => {
            tracing::error!(error = %e, "job scheduler failed");
            ApiError::new(request_id, "internal_error", error.to_string())
        }
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            REQUEST_ID_HEADER,
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/search-profiles", post(search::search_profiles))
        .route(
            "/api/v1/sync-profile/{username}",
            get(profiles::sync_profile),
        )
        .route(
            "/api/v1/company-profiles",
            get(profiles::list_company_profiles),
        )
        .route(
            "/api/v1/tasks",
            get(tasks::list_tasks).post(tasks::create_task),
        )
        .route(
            "/api/v1/tasks/{id}",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/api/v1/tasks/{id}/run", post(tasks::run_task))
        // Auth is the outer layer: only accepted tokens reach the limiter.
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

/// GET /api/v1/health. Unauthenticated; 503 while the database is unreachable.
async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> (StatusCode, Json<ApiResponse<HealthData>>) {
    let live_jobs = state.scheduler.live_job_count().await;
    let (status, data) = match bizscout_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            HealthData {
                status: "ok",
                database: "ok",
                live_jobs,
            },
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                HealthData {
                    status: "degraded",
                    database: "unavailable",
                    live_jobs,
                },
            )
        }
    };
    (status, ok(req_id, data))
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}
