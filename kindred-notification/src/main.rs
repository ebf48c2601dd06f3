use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod config;
mod events;
mod routes;
mod schema;
mod services;

use crate::config::AppConfig;
use kindred_shared::clients::db::create_pool;
use kindred_shared::clients::push::PushClient;
use kindred_shared::clients::rabbitmq::RabbitMQClient;
use services::delivery::{PushSender, TokenDirectory};

pub struct AppState {
    pub config: AppConfig,
    pub rabbitmq: RabbitMQClient,
    pub tokens: Arc<dyn TokenDirectory>,
    pub sender: Arc<dyn PushSender>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kindred_shared::middleware::init_tracing("kindred-notification");

    let config = AppConfig::load()?;
    let port = config.port;

    let db = create_pool(&config.database_url, config.db_pool_size)?;
    let rabbitmq = RabbitMQClient::connect_with_retry(&config.rabbitmq_url, 10, Duration::from_secs(3)).await?;
    let sender = PushClient::new(&config.push_endpoint, config.push_access_token.clone());

    let state = Arc::new(AppState {
        config,
        rabbitmq,
        tokens: Arc::new(db),
        sender: Arc::new(sender),
    });

    let push_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = events::subscriber::listen_push_requests(push_state).await {
            tracing::error!(error = %e, "push request subscriber failed");
        }
    });

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "kindred-notification starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
