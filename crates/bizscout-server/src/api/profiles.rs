use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use bizscout_core::{CompanyProfile, ProfileListQuery, ProfilePage};

use crate::middleware::RequestId;

use super::{map_db_error, map_extractor_error, ok, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct CompanyProfileQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub source: Option<String>,
}

/// GET /api/v1/company-profiles
pub(super) async fn list_company_profiles(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<CompanyProfileQuery>,
) -> Result<Json<ApiResponse<ProfilePage>>, ApiError> {
    let query = ProfileListQuery::new(query.page, query.page_size, query.source);
    let page = state
        .profiles
        .list_company_profiles(&query)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(ok(req_id, page))
}

/// GET /api/v1/sync-profile/{username}
///
/// Fetches the account now and persists it whether or not it classifies as a business.
pub(super) async fn sync_profile(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(username): Path<String>,
) -> Result<Json<ApiResponse<CompanyProfile>>, ApiError> {
    let profile = state
        .extractor
        .sync_username(&username)
        .await
        .map_err(|e| map_extractor_error(req_id.0.clone(), &e))?;
    Ok(ok(req_id, profile))
}
