use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use kindred_shared::errors::AppResult;
use kindred_shared::middleware::OptionalAuthUser;
use kindred_shared::types::ApiResponse;

use crate::models::Candidate;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct DiscoverQuery {
    pub limit: Option<usize>,
}

pub async fn discover(
    auth: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<DiscoverQuery>,
) -> AppResult<Json<ApiResponse<Vec<Candidate>>>> {
    let candidates = state.core.discover(&auth, query.limit)?;
    Ok(Json(ApiResponse::ok(candidates)))
}
