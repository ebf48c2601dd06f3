use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use kindred_shared::errors::{AppError, AppResult, ErrorCode};
use kindred_shared::middleware::OptionalAuthUser;
use kindred_shared::types::ApiResponse;

use crate::models::{Profile, ProfilePatch, ProfileView};

use super::AppState;

#[derive(Debug, Serialize)]
pub struct UpsertResponse {
    pub profile_id: Uuid,
}

pub async fn get_me(
    auth: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Option<Profile>>>> {
    let profile = state.core.get_profile(&auth)?;
    Ok(Json(ApiResponse::ok(profile)))
}

pub async fn upsert_me(
    auth: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Json(patch): Json<ProfilePatch>,
) -> AppResult<Json<ApiResponse<UpsertResponse>>> {
    let profile_id = state.core.upsert_profile(&auth, patch)?;
    Ok(Json(ApiResponse::ok(UpsertResponse { profile_id })))
}

pub async fn delete_me(
    auth: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.core.delete_account(&auth)?;
    Ok(Json(ApiResponse::ok_with_message((), "account deleted")))
}

pub async fn get_profile(
    auth: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Path(profile_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ProfileView>>> {
    let view = state.core.get_visible_profile(&auth, profile_id)?;
    Ok(Json(ApiResponse::ok(view)))
}

fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

/// POST /me/photos: stores the image first, then records its URL on the
/// profile. The upload never runs inside a store transaction.
pub async fn upload_photo(
    auth: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let profile = state
        .core
        .get_profile(&auth)?
        .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))?;

    let max_photos = state.core.settings().max_photos;
    if profile.photos.len() >= max_photos {
        return Err(AppError::new(
            ErrorCode::TooManyPhotos,
            format!("a profile can hold at most {max_photos} photos"),
        ));
    }

    let field = multipart
        .next_field()
        .await
        .map_err(|e| AppError::new(ErrorCode::PhotoUploadFailed, format!("failed to read multipart: {e}")))?
        .ok_or_else(|| AppError::new(ErrorCode::PhotoUploadFailed, "no file provided"))?;

    let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
    let ext = image_extension(&content_type).ok_or_else(|| {
        AppError::new(
            ErrorCode::PhotoUploadFailed,
            "unsupported image format, accepted: jpeg, png, webp, heic",
        )
    })?;

    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::new(ErrorCode::PhotoUploadFailed, format!("failed to read file data: {e}")))?;

    let key = format!("profiles/{}/{}.{}", profile.id, Uuid::now_v7(), ext);
    let url = state
        .storage
        .upload(&key, data.to_vec(), &content_type)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, key = %key, "photo upload failed");
            AppError::new(ErrorCode::PhotoUploadFailed, "photo upload failed")
        })?;

    let profile = state.core.append_photo(&auth, &url)?;
    Ok(Json(ApiResponse::ok(profile)))
}
