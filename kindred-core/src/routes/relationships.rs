use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use kindred_shared::errors::AppResult;
use kindred_shared::middleware::OptionalAuthUser;
use kindred_shared::types::ApiResponse;

use crate::models::{IncomingLike, LikeOutcome, MatchSummary, ProfileId, ReportOutcome};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct TargetRequest {
    pub target_id: ProfileId,
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub target_id: ProfileId,
    pub reason: String,
    pub description: Option<String>,
}

// --- POST /likes ---

pub async fn like(
    auth: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<TargetRequest>,
) -> AppResult<Json<ApiResponse<LikeOutcome>>> {
    let outcome = state.core.like(&auth, req.target_id)?;
    Ok(Json(ApiResponse::ok(outcome)))
}

pub async fn incoming_likes(
    auth: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<IncomingLike>>>> {
    let likes = state.core.incoming_likes(&auth)?;
    Ok(Json(ApiResponse::ok(likes)))
}

// --- POST /passes ---

pub async fn pass(
    auth: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<TargetRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.core.pass(&auth, req.target_id)?;
    Ok(Json(ApiResponse::ok(())))
}

// --- matches ---

pub async fn list_matches(
    auth: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<MatchSummary>>>> {
    let matches = state.core.list_matches(&auth)?;
    Ok(Json(ApiResponse::ok(matches)))
}

pub async fn unmatch(
    auth: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.core.unmatch(&auth, match_id)?;
    Ok(Json(ApiResponse::ok_with_message((), "unmatched")))
}

// --- safety ---

pub async fn block(
    auth: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<TargetRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.core.block(&auth, req.target_id)?;
    Ok(Json(ApiResponse::ok_with_message((), "user blocked")))
}

pub async fn report(
    auth: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReportRequest>,
) -> AppResult<Json<ApiResponse<ReportOutcome>>> {
    let outcome = state
        .core
        .report(&auth, req.target_id, &req.reason, req.description.as_deref())?;
    Ok(Json(ApiResponse::ok(outcome)))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::testing::app;

    #[tokio::test]
    async fn mutual_likes_match_and_unmatch() {
        let t = app();
        let ana = t.h.onboard("auth0|ana", "woman", "man");
        let ben = t.h.onboard("auth0|ben", "man", "woman");

        let (status, body) = t
            .send("POST", "/likes", Some("auth0|ana"), Some(json!({"target_id": ben})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "pending");

        let (_, body) = t.send("GET", "/likes/incoming", Some("auth0|ben"), None).await;
        assert_eq!(body["data"][0]["profile"]["id"], ana.to_string());

        let (_, body) = t
            .send("POST", "/likes", Some("auth0|ben"), Some(json!({"target_id": ana})))
            .await;
        assert_eq!(body["data"]["status"], "matched");
        let match_id = body["data"]["match_id"].as_str().unwrap().to_string();

        let (_, body) = t.send("GET", "/matches", Some("auth0|ana"), None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, _) = t
            .send("DELETE", &format!("/matches/{match_id}"), Some("auth0|ben"), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = t.send("GET", "/conversations", Some("auth0|ana"), None).await;
        assert!(body["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn self_targeting_and_blocked_likes_fail() {
        let t = app();
        let me = t.h.onboard("auth0|solo", "woman", "man");
        let other = t.h.onboard("auth0|rude", "man", "woman");

        let (status, body) = t
            .send("POST", "/likes", Some("auth0|solo"), Some(json!({"target_id": me})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "E2001");

        let (status, _) = t
            .send("POST", "/blocks", Some("auth0|rude"), Some(json!({"target_id": me})))
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = t
            .send("POST", "/likes", Some("auth0|solo"), Some(json!({"target_id": other})))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "E2004");
    }

    #[tokio::test]
    async fn report_blocks_and_pass_hides() {
        let t = app();
        t.h.onboard("auth0|mod", "woman", "everyone");
        let spammer = t.h.onboard("auth0|spam", "man", "everyone");
        let boring = t.h.onboard("auth0|meh", "man", "everyone");

        let (status, body) = t
            .send(
                "POST",
                "/reports",
                Some("auth0|mod"),
                Some(json!({"target_id": spammer, "reason": "spam", "description": "links"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["blocked"], true);

        t.send("POST", "/passes", Some("auth0|mod"), Some(json!({"target_id": boring})))
            .await;
        let (_, body) = t.send("GET", "/discover", Some("auth0|mod"), None).await;
        assert!(body["data"].as_array().unwrap().is_empty());

        let (status, _) = t
            .send("POST", "/reports", Some("auth0|mod"), Some(json!({"target_id": boring, "reason": ""})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
