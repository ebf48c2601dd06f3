use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use kindred_shared::middleware::JwtSecretSource;

use crate::collaborators::{ObjectStorage, PlacesLookup};
use crate::services::Core;

pub mod conversations;
pub mod discovery;
pub mod health;
pub mod locations;
pub mod profile;
pub mod relationships;

/// Photos are capped at 10 MiB per upload.
const PHOTO_BODY_LIMIT: usize = 10 * 1024 * 1024;

pub struct AppState {
    pub core: Core,
    pub storage: Arc<dyn ObjectStorage>,
    pub places: Option<Arc<dyn PlacesLookup>>,
    pub jwt_secret: String,
}

impl JwtSecretSource for AppState {
    fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/me",
            get(profile::get_me).put(profile::upsert_me).delete(profile::delete_me),
        )
        .route(
            "/me/photos",
            post(profile::upload_photo).layer(DefaultBodyLimit::max(PHOTO_BODY_LIMIT)),
        )
        .route("/profiles/:id", get(profile::get_profile))
        .route("/locations", get(locations::list_locations).post(locations::save_location))
        .route("/locations/:id", delete(locations::remove_location))
        .route("/places/nearby", get(locations::nearby_places))
        .route("/discover", get(discovery::discover))
        .route("/likes", post(relationships::like))
        .route("/likes/incoming", get(relationships::incoming_likes))
        .route("/passes", post(relationships::pass))
        .route("/matches", get(relationships::list_matches))
        .route("/matches/:id", delete(relationships::unmatch))
        .route("/blocks", post(relationships::block))
        .route("/reports", post(relationships::report))
        .route("/conversations", get(conversations::inbox))
        .route(
            "/conversations/:id/messages",
            get(conversations::list_messages).post(conversations::send_message),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
