//! `GET /stats` and `GET /metrics`.

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;

use crate::dto::StatsResponse;
use crate::error::ApiError;
use crate::state::SharedState;

pub async fn stats(State(state): State<SharedState>) -> Result<Json<StatsResponse>, ApiError> {
    let storage_stats = state.storage.stats().await?;
    let worker_stats = state.worker_stats().await;

    Ok(Json(StatsResponse {
        total_episodes: storage_stats.total_episodes,
        pending_jobs: storage_stats.pending_jobs,
        processing_jobs: storage_stats.processing_jobs,
        done_jobs: storage_stats.done_jobs,
        dead_jobs: storage_stats.dead_jobs,
        workers_claimed: worker_stats.total_claimed,
        workers_done: worker_stats.total_done,
        workers_dead: worker_stats.total_dead,
    }))
}

pub async fn metrics(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let storage_stats = state.storage.stats().await?;
    let worker_stats = state.worker_stats().await;
    let body = state.metrics.export_metrics(worker_stats, storage_stats);

    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
