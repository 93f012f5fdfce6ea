//! `memory-api` binary: resolves configuration from the environment, opens
//! the storage backend, starts the embedding worker pool, and serves the
//! HTTP API.

use std::sync::Arc;

use memory_api::build_router;
use memory_api::state::AppState;
use memory_core::encoder::HashEncoder;
use memory_core::retrieval::RetrievalEngine;
use memory_core::worker::{WorkerPool, WorkerPoolConfig};
use memory_core::Config;
use memory_storage_libsql::LibsqlStorage;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    let storage = LibsqlStorage::connect(
        &config.storage.db_url,
        config.storage.db_auth_token.as_deref().unwrap_or(""),
    )
    .await
    .unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to connect to storage");
        std::process::exit(1);
    });
    storage.initialize_schema().await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to initialize schema");
        std::process::exit(1);
    });
    let storage: Arc<dyn memory_core::storage::StorageBackend> = Arc::new(storage);

    let encoder = Arc::new(HashEncoder::new(config.worker.encoder_id.clone()));

    let retrieval = RetrievalEngine::new(
        Arc::clone(&storage),
        Arc::clone(&encoder) as Arc<dyn memory_core::encoder::TextEncoder>,
        config.cache.max_entries,
        config.cache.ttl,
    );

    let worker_pool = Arc::new(WorkerPool::new(
        WorkerPoolConfig {
            worker_count: 4,
            batch_size: config.worker.batch_size,
            poll_interval: config.worker.poll_interval,
            max_retries: config.worker.max_retries,
            reaper_timeout: config.worker.reaper_timeout,
        },
        Arc::clone(&storage),
        Arc::clone(&encoder) as Arc<dyn memory_core::encoder::TextEncoder>,
    ));
    worker_pool.start();

    let port = config.api.port;
    let state = Arc::new(AppState::new(storage, retrieval, worker_pool, config));
    let app = build_router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr, "memory-api listening");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to bind"); std::process::exit(1);
    });
    axum::serve(listener, app).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "server error");
    });
}
