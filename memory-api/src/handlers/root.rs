//! `GET /` and `GET /health`.

use axum::extract::State;
use axum::Json;

use crate::dto::{HealthResponse, ServiceIdentity};
use crate::state::SharedState;

const QUEUE_DEPTH_DEGRADED_THRESHOLD: u64 = 1000;

pub async fn identity() -> Json<ServiceIdentity> {
    Json(ServiceIdentity {
        name: "memory-api",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Liveness probe. Always answers `200`; the body's `status` field carries
/// `healthy`/`degraded`/`unhealthy` per spec so callers can distinguish a
/// down dependency from a merely backed-up queue without a status-code
/// branch in their health-check logic.
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    match state.storage.ping().await {
        Ok(()) => {
            let stats = state.storage.stats().await.unwrap_or_default();
            let status = if stats.pending_jobs > QUEUE_DEPTH_DEGRADED_THRESHOLD {
                "degraded"
            } else {
                "healthy"
            };
            Json(HealthResponse {
                status,
                storage_ok: true,
                pending_jobs: stats.pending_jobs,
            })
        }
        Err(_) => Json(HealthResponse {
            status: "unhealthy",
            storage_ok: false,
            pending_jobs: 0,
        }),
    }
}
