//! Request-timing middleware: records a counter/latency sample per endpoint
//! against [`memory_core::MetricsRegistry`] and folds in the
//! recent-episodes cache's hit/miss snapshot, the way the teacher's
//! `monitoring` module is fed from request handling rather than polled.

use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::state::SharedState;

pub async fn record_metrics(State(state): State<SharedState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let latency_ms = started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64;
    let is_error = response.status().is_client_error() || response.status().is_server_error();
    state.metrics.record_request(&path, is_error, latency_ms);

    response
}
