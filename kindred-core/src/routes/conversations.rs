use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use kindred_shared::errors::AppResult;
use kindred_shared::middleware::OptionalAuthUser;
use kindred_shared::types::pagination::{Paginated, PaginationParams};
use kindred_shared::types::ApiResponse;

use crate::models::{InboxEntry, Message, MessageType};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
}

pub async fn inbox(
    auth: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<InboxEntry>>>> {
    let entries = state.core.inbox(&auth)?;
    Ok(Json(ApiResponse::ok(entries)))
}

pub async fn list_messages(
    auth: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<Message>>>> {
    let page = state.core.list_messages(&auth, conversation_id, &params)?;
    Ok(Json(ApiResponse::ok(page)))
}

pub async fn send_message(
    auth: OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<Json<ApiResponse<Message>>> {
    let message = state
        .core
        .send_message(&auth, conversation_id, &req.content, req.message_type)?;
    Ok(Json(ApiResponse::ok(message)))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::models::LikeOutcome;
    use crate::routes::testing::app;

    #[tokio::test]
    async fn matched_pair_can_chat() {
        let t = app();
        let kim = t.h.onboard("auth0|kim", "woman", "man");
        let lee = t.h.onboard("auth0|lee", "man", "woman");
        t.h.core.like(&"auth0|kim".to_string(), lee).unwrap();
        let LikeOutcome::Matched { conversation_id, .. } = t.h.core.like(&"auth0|lee".to_string(), kim).unwrap() else {
            panic!("expected match");
        };
        let uri = format!("/conversations/{conversation_id}/messages");

        let (status, body) = t
            .send("POST", &uri, Some("auth0|kim"), Some(json!({"content": "hey lee"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["message_type"], "text");
        t.h.clock.advance(chrono::Duration::seconds(1));

        let (status, body) = t
            .send(
                "POST",
                &uri,
                Some("auth0|lee"),
                Some(json!({"content": "https://cdn.test/wave.gif", "message_type": "image"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["message_type"], "image");

        let (_, body) = t.send("GET", &format!("{uri}?per_page=1&page=2"), Some("auth0|kim"), None).await;
        assert_eq!(body["data"]["total"], 2);
        assert_eq!(body["data"]["items"][0]["content"], "https://cdn.test/wave.gif");

        let (_, body) = t.send("GET", "/conversations", Some("auth0|kim"), None).await;
        assert_eq!(body["data"][0]["peer"]["name"], "lee");
        assert_eq!(body["data"][0]["conversation"]["last_message"]["message_type"], "image");
    }

    #[tokio::test]
    async fn out_of_range_page_reads_empty() {
        let t = app();
        let kim = t.h.onboard("auth0|kim", "woman", "man");
        let lee = t.h.onboard("auth0|lee", "man", "woman");
        t.h.core.like(&"auth0|kim".to_string(), lee).unwrap();
        let LikeOutcome::Matched { conversation_id, .. } = t.h.core.like(&"auth0|lee".to_string(), kim).unwrap() else {
            panic!("expected match");
        };
        let uri = format!("/conversations/{conversation_id}/messages");
        t.send("POST", &uri, Some("auth0|kim"), Some(json!({"content": "hey"}))).await;

        let (status, body) = t
            .send("GET", &format!("{uri}?page={}&per_page=200", u64::MAX), Some("auth0|lee"), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total"], 1);
        assert_eq!(body["data"]["items"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn strangers_cannot_read_or_write() {
        let t = app();
        let a = t.h.onboard("auth0|x", "woman", "man");
        let b = t.h.onboard("auth0|y", "man", "woman");
        t.h.onboard("auth0|z", "man", "woman");
        t.h.core.like(&"auth0|x".to_string(), b).unwrap();
        let LikeOutcome::Matched { conversation_id, .. } = t.h.core.like(&"auth0|y".to_string(), a).unwrap() else {
            panic!("expected match");
        };
        let uri = format!("/conversations/{conversation_id}/messages");

        let (status, body) = t.send("GET", &uri, Some("auth0|z"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "E3002");

        let (status, _) = t
            .send("POST", &uri, Some("auth0|z"), Some(json!({"content": "hi"})))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
