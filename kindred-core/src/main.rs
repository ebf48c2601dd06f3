use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;

use kindred_core::clock::SystemClock;
use kindred_core::collaborators::{HttpPlacesLookup, ObjectStorage, PlacesLookup};
use kindred_core::config::{AppConfig, StoreBackend};
use kindred_core::notify::{LogDispatcher, NotificationDispatcher, RabbitDispatcher};
use kindred_core::routes::{self, AppState};
use kindred_core::store::{MemoryStore, PgStore, Store};
use kindred_core::Core;
use kindred_shared::clients::db::create_pool;
use kindred_shared::clients::minio::MinioClient;
use kindred_shared::clients::rabbitmq::RabbitMQClient;
use kindred_shared::middleware::{init_metrics, init_tracing, metrics_middleware};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("kindred-core");

    let config = AppConfig::load()?;
    let port = config.port;
    if config.uses_default_secret() {
        tracing::warn!("JWT secret is the development default");
    }

    let metrics_handle = init_metrics()?;

    let store: Arc<dyn Store> = match config.store {
        StoreBackend::Postgres => {
            let pool = create_pool(&config.database_url, config.db_pool_size)?;
            Arc::new(PgStore::new(pool, config.tx_max_attempts))
        }
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let notifier: Arc<dyn NotificationDispatcher> =
        match RabbitMQClient::connect_with_retry(&config.rabbitmq_url, 5, Duration::from_secs(2)).await {
            Ok(rabbitmq) => Arc::new(RabbitDispatcher::new(rabbitmq, tokio::runtime::Handle::current())),
            Err(e) => {
                tracing::error!(error = %e, "RabbitMQ unavailable, push notifications disabled");
                Arc::new(LogDispatcher)
            }
        };

    let storage: Arc<dyn ObjectStorage> = Arc::new(
        MinioClient::new(
            &config.minio_endpoint,
            &config.minio_access_key,
            &config.minio_secret_key,
            &config.minio_bucket,
            &config.minio_public_url,
        )
        .await?,
    );

    let places = config.places_endpoint.as_deref().map(|endpoint| {
        Arc::new(HttpPlacesLookup::new(endpoint, config.places_api_key.clone())) as Arc<dyn PlacesLookup>
    });

    let core = Core::new(store, notifier, Arc::new(SystemClock), config.core_settings());
    let state = Arc::new(AppState {
        core,
        storage,
        places,
        jwt_secret: config.jwt_secret.clone(),
    });

    let app = routes::router(state)
        .merge(Router::new().route(
            "/metrics",
            get(move || {
                let handle = metrics_handle.clone();
                async move { handle.render() }
            }),
        ))
        .layer(axum::middleware::from_fn(metrics_middleware));

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "kindred-core starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
