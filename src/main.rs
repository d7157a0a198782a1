//! kermesse-api server entry point.
//!
//! Loads configuration, opens the store, and serves the REST API.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use kermesse_api::api;
use kermesse_api::app_state::AppState;
use kermesse_api::config::{AppConfig, LogFormat, StorageBackend};
use kermesse_api::persistence::Store;
use kermesse_api::persistence::memory::MemoryStore;
use kermesse_api::persistence::postgres::PostgresStore;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, backend = ?config.storage_backend, "starting kermesse-api");

    // Open the store
    let store: Arc<dyn Store> = match config.storage_backend {
        StorageBackend::Postgres => {
            let store = PostgresStore::connect(&config).await?;
            if config.run_migrations {
                store.run_migrations().await?;
                tracing::info!("database migrations applied");
            }
            Arc::new(store)
        }
        StorageBackend::Memory => {
            tracing::warn!("using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Build application state
    let webhook_enabled = config.webhook_secret.is_some();
    if !webhook_enabled {
        tracing::info!("WEBHOOK_SECRET not set; payment webhook disabled");
    }
    let app_state = AppState::new(store, config.webhook_secret.clone());

    // Build router
    let app = Router::new()
        .merge(api::build_router(webhook_enabled))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
