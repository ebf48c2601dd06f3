use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use kindred_shared::types::api::{HealthCheck, HealthResponse, HealthStatus};

use super::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let health = HealthResponse::healthy("kindred-core", env!("CARGO_PKG_VERSION"))
        .with_checks(vec![HealthCheck::from_result("store", state.core.store_health())]);

    let status = match health.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (status, Json(health))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::routes::testing::app;

    #[tokio::test]
    async fn reports_store_check() {
        let t = app();
        let (status, body) = t.send("GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["checks"][0]["name"], "store");
    }
}
