//! Operational entry point for the episodic memory service: serve the HTTP
//! API, run the embedding worker pool standalone, trigger a consolidation
//! pass for a given day, or print queue/episode stats — all against the
//! same storage backend and configuration the server uses.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use chrono::NaiveDate;
use memory_core::config::Config;
use memory_core::consolidation::run_consolidation;
use memory_core::encoder::{HashEncoder, TextEncoder};
use memory_core::retrieval::RetrievalEngine;
use memory_core::storage::StorageBackend;
use memory_core::worker::{WorkerPool, WorkerPoolConfig};
use memory_storage_libsql::LibsqlStorage;

#[derive(Parser)]
#[command(name = "memory-cli")]
#[command(about = "Operational CLI for the episodic memory service")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API.
    Serve,
    /// Run the embedding worker pool without serving HTTP.
    Worker,
    /// Run one consolidation pass over a day's episodes.
    Consolidate {
        /// Date to consolidate, in YYYY-MM-DD form. Defaults to yesterday (UTC).
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Print storage and worker-pool statistics.
    Stats,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

async fn connect_storage(config: &Config) -> anyhow::Result<Arc<dyn StorageBackend>> {
    let storage = LibsqlStorage::connect(
        &config.storage.db_url,
        config.storage.db_auth_token.as_deref().unwrap_or(""),
    )
    .await?;
    storage.initialize_schema().await?;
    Ok(Arc::new(storage))
}

async fn run(command: Commands, config: Config) -> anyhow::Result<()> {
    match command {
        Commands::Serve => {
            let storage = connect_storage(&config).await?;
            let encoder: Arc<dyn TextEncoder> = Arc::new(HashEncoder::new(config.worker.encoder_id.clone()));

            let retrieval = RetrievalEngine::new(
                Arc::clone(&storage),
                Arc::clone(&encoder),
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
                Arc::clone(&encoder),
            ));
            worker_pool.start();

            let port = config.api.port;
            let state = Arc::new(memory_api::state::AppState::new(storage, retrieval, worker_pool, config));
            let app = memory_api::build_router(state);

            let addr = format!("0.0.0.0:{port}");
            tracing::info!(addr, "memory-cli serve: listening");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, app).await?;
            Ok(())
        }
        Commands::Worker => {
            let storage = connect_storage(&config).await?;
            let encoder: Arc<dyn TextEncoder> = Arc::new(HashEncoder::new(config.worker.encoder_id.clone()));

            let worker_pool = WorkerPool::new(
                WorkerPoolConfig {
                    worker_count: 4,
                    batch_size: config.worker.batch_size,
                    poll_interval: config.worker.poll_interval,
                    max_retries: config.worker.max_retries,
                    reaper_timeout: config.worker.reaper_timeout,
                },
                Arc::clone(&storage),
                encoder,
            );
            worker_pool.start();

            tracing::info!("memory-cli worker: running, press Ctrl+C to stop");
            tokio::signal::ctrl_c().await?;
            Ok(())
        }
        Commands::Consolidate { date } => {
            let storage = connect_storage(&config).await?;
            let now = chrono::Utc::now();
            let target_date = date.unwrap_or_else(|| (now - chrono::Duration::days(1)).date_naive());

            let report = run_consolidation(&storage, target_date, now).await?;
            let json = serde_json::to_string_pretty(&report)?;
            println!("{json}");
            Ok(())
        }
        Commands::Stats => {
            let storage = connect_storage(&config).await?;
            let stats = storage.stats().await?;
            let json = serde_json::to_string_pretty(&stats)?;
            println!("{json}");
            Ok(())
        }
    }
}
