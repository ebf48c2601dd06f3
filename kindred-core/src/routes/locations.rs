use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use kindred_shared::errors::{AppError, AppResult, ErrorCode};
use kindred_shared::middleware::OptionalAuthUser;
use kindred_shared::types::ApiResponse;

use crate::collaborators::PlaceCandidate;
use crate::geo::valid_coordinates;
use crate::models::{NewLocation, SavedLocation};
use crate::services::require_identity;

use super::AppState;

const DEFAULT_RADIUS_M: u32 = 1_000;
const MAX_RADIUS_M: u32 = 50_000;

pub async fn list_locations(
    auth: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<SavedLocation>>>> {
    let locations = state.core.list_locations(&auth)?;
    Ok(Json(ApiResponse::ok(locations)))
}

pub async fn save_location(
    auth: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Json(input): Json<NewLocation>,
) -> AppResult<Json<ApiResponse<SavedLocation>>> {
    let location = state.core.save_location(&auth, input)?;
    Ok(Json(ApiResponse::ok(location)))
}

pub async fn remove_location(
    auth: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Path(location_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.core.remove_location(&auth, location_id)?;
    Ok(Json(ApiResponse::ok_with_message((), "location removed")))
}

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    pub radius_m: Option<u32>,
}

/// GET /places/nearby: suggestions for the "save a place" flow.
pub async fn nearby_places(
    auth: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<NearbyQuery>,
) -> AppResult<Json<ApiResponse<Vec<PlaceCandidate>>>> {
    require_identity(&auth)?;
    if !valid_coordinates(query.lat, query.lng) {
        return Err(AppError::new(ErrorCode::InvalidCoordinates, "invalid coordinates"));
    }
    let places = state
        .places
        .as_ref()
        .ok_or_else(|| AppError::new(ErrorCode::ServiceUnavailable, "places lookup is not configured"))?;

    let radius = query.radius_m.unwrap_or(DEFAULT_RADIUS_M).clamp(1, MAX_RADIUS_M);
    let found = places.nearby(query.lat, query.lng, radius).await.map_err(|e| {
        tracing::warn!(error = %e, "places lookup failed");
        AppError::new(ErrorCode::ServiceUnavailable, "places lookup failed")
    })?;
    Ok(Json(ApiResponse::ok(found)))
}
