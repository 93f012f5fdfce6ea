//! # Memory API
//!
//! `axum` HTTP surface for the episodic memory service: every operation in
//! `memory_core` exposed as a typed JSON endpoint, grounded on the shape of
//! a real multi-route `axum` server (state behind `Arc`, a handler per
//! route, `(StatusCode, String)`-style error mapping, `CorsLayer`).
//!
//! Cross-cutting concerns per §4.G: request metrics middleware, a
//! read-through cache in front of `recent` (owned by
//! [`memory_core::retrieval::RetrievalEngine`], not this crate), and a
//! `/metrics` endpoint in Prometheus text format.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use state::SharedState;

/// Assemble the full router over `state`. Split out from `main` so
/// integration tests can build and drive the router without binding a
/// socket.
#[must_use]
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(handlers::root::identity))
        .route("/health", get(handlers::root::health))
        .route("/memory/action", post(handlers::ingestion::ingest))
        .route("/memory/episodic/recent", get(handlers::retrieval::recent))
        .route("/memory/search", post(handlers::retrieval::search))
        .route("/memory/temporal/before", post(handlers::retrieval::temporal_before))
        .route("/memory/temporal/after", post(handlers::retrieval::temporal_after))
        .route("/memory/temporal/range", post(handlers::retrieval::temporal_range))
        .route("/memory/temporal/related", post(handlers::retrieval::temporal_related))
        .route("/memory/temporal/link", post(handlers::retrieval::temporal_link))
        .route("/memory/consciousness/update", post(handlers::consciousness::update))
        .route("/memory/facts", post(handlers::facts::facts))
        .route("/memory/hybrid", post(handlers::facts::hybrid))
        .route("/memory/analysis/decay-scores", post(handlers::decay::analyze))
        .route("/memory/pruning/preview", post(handlers::decay::preview))
        .route("/memory/pruning/execute", post(handlers::decay::execute))
        .route("/stats", get(handlers::stats::stats))
        .route("/metrics", get(handlers::stats::metrics))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::record_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
