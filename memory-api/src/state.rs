//! Shared server state, assembled once at startup and cloned (behind `Arc`)
//! into every request handler — mirrors the teacher's `ServerState` shape in
//! `akh-medu-server`, generalized from "one engine per workspace" to "one
//! storage backend and retrieval engine for the whole process".

use std::sync::Arc;

use memory_core::retrieval::RetrievalEngine;
use memory_core::storage::StorageBackend;
use memory_core::worker::{WorkerPool, WorkerPoolStats};
use memory_core::{Config, MetricsRegistry};

/// Everything a handler needs: storage, the retrieval engine built on top of
/// it, the worker pool (for its stats, not for direct job dispatch), the
/// metrics registry, and the resolved configuration.
pub struct AppState {
    pub storage: Arc<dyn StorageBackend>,
    pub retrieval: RetrievalEngine,
    pub worker_pool: Arc<WorkerPool>,
    pub metrics: MetricsRegistry,
    pub config: Config,
}

impl AppState {
    #[must_use]
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        retrieval: RetrievalEngine,
        worker_pool: Arc<WorkerPool>,
        config: Config,
    ) -> Self {
        Self {
            storage,
            retrieval,
            worker_pool,
            metrics: MetricsRegistry::new(),
            config,
        }
    }

    pub async fn worker_stats(&self) -> WorkerPoolStats {
        self.worker_pool.stats().await
    }
}

pub type SharedState = Arc<AppState>;
