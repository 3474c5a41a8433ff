pub mod api;
pub mod config;
pub mod logging;
pub mod logic;
pub mod model;
pub mod store;

use std::sync::Arc;

use axum::serve;
use tokio::net::TcpListener;

// Export API types
pub use api::handlers;
pub use api::routes;

pub use config::AppConfig;

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, PersistenceStore, PostgresStore, Repository};

use crate::api::handlers::AppState;
use crate::config::StorageBackend;

/// Serve the API with the configured store until the listener fails.
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.server_address()).await?;
    log::info!("Hendry template server running on http://{}", listener.local_addr()?);
    if config.environment.is_development() {
        log::info!(
            "API documentation available at http://{}/docs",
            listener.local_addr()?
        );
    }

    match config.storage {
        StorageBackend::Postgres => {
            log::info!("Connecting to PostgreSQL...");
            let store = PostgresStore::new(&config.database_url(), config.max_connections()).await?;
            log::info!("Running database migrations...");
            store.migrate().await?;
            serve_with_store(listener, Arc::new(store), &config).await
        }
        StorageBackend::Memory => {
            log::warn!("Using the in-memory store; data is lost on shutdown");
            serve_with_store(listener, Arc::new(MemoryStore::new()), &config).await
        }
    }
}

/// Serve the API over an already bound listener.
pub async fn serve_with_store<S: PersistenceStore>(
    listener: TcpListener,
    store: Arc<S>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let state = AppState::new(store, config.environment, config.pipeline);
    let app = routes::create_router::<S>(config.environment)
        .layer(config.cors.layer()?)
        .with_state(state);

    serve(listener, app).await?;

    Ok(())
}
