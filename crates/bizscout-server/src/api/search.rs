use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};

use bizscout_core::{Candidate, SearchSeed};

use crate::middleware::RequestId;

use super::{map_extractor_error, ok, ApiError, ApiResponse, AppState};

const DEFAULT_SEARCH_LIMIT: i64 = 10;

#[derive(Debug, Deserialize)]
pub(super) struct SearchProfilesRequest {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct SearchProfilesResponse {
    profiles: Vec<Candidate>,
    persisted: usize,
    failed_persists: usize,
}

/// POST /api/v1/search-profiles. Runs one ad-hoc extraction pass.
pub(super) async fn search_profiles(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<SearchProfilesRequest>,
) -> Result<Json<ApiResponse<SearchProfilesResponse>>, ApiError> {
    let seed = SearchSeed::new(
        body.keywords,
        body.hashtags,
        body.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
    )
    .map_err(|e| ApiError::new(req_id.0.clone(), "validation_error", e.to_string()))?;

    let outcome = state
        .extractor
        .run(&seed)
        .await
        .map_err(|e| map_extractor_error(req_id.0.clone(), &e))?;
    Ok(ok(
        req_id,
        SearchProfilesResponse {
            persisted: outcome.persisted.len(),
            failed_persists: outcome.failed_persists,
            profiles: outcome.candidates,
        },
    ))
}
