//! Prometheus metrics registry exposed at `/metrics`.
//!
//! Adapted from the teacher's unified `monitoring::metrics::MetricsRegistry`
//! (which exports redb cache and Turso storage metrics side by side): this
//! service has one storage backend and one cache, so the registry collapses
//! to per-operation request counters/latencies, the recent-episodes cache's
//! hit/miss counters, and worker-pool/queue gauges polled at export time.

#![allow(clippy::cast_precision_loss)]

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::retrieval::cache::CacheMetrics;
use crate::storage::StorageStats;
use crate::worker::WorkerPoolStats;

/// Running count and simple moving-average percentiles for one operation's
/// latency, in milliseconds. Mirrors the teacher's lightweight
/// `OperationLatency` — not a true histogram, but cheap enough to update on
/// every request without a dependency on a separate metrics crate.
#[derive(Debug, Clone, Default)]
struct OperationLatency {
    count: u64,
    total_ms: u64,
    p50: u64,
    p95: u64,
    p99: u64,
}

impl OperationLatency {
    fn record(&mut self, latency_ms: u64) {
        self.count += 1;
        self.total_ms += latency_ms;
        if self.count == 1 {
            self.p50 = latency_ms;
            self.p95 = latency_ms;
            self.p99 = latency_ms;
        } else {
            self.p50 = self.p50 * 7 / 10 + latency_ms * 3 / 10;
            self.p95 = self.p95 * 9 / 10 + latency_ms / 10;
            self.p99 = self.p99.max(latency_ms);
        }
    }

    fn avg_ms(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.total_ms / self.count
        }
    }
}

/// Request counters and latency tracking, keyed by endpoint name
/// (`"ingest"`, `"search"`, `"recent"`, `"facts"`, `"hybrid"`, ...).
#[derive(Debug, Default)]
struct EndpointMetrics {
    requests: AtomicU64,
    errors: AtomicU64,
    latency: RwLock<OperationLatency>,
}

/// Unified metrics registry for the episodic memory service: request
/// counters/latencies per endpoint, the recent-episodes cache's hit/miss
/// counters, and the most recent snapshot of worker-pool and storage gauges.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    endpoints: RwLock<HashMap<String, EndpointMetrics>>,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_invalidations: AtomicU64,
}

impl MetricsRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one request against `endpoint`, with its outcome and latency.
    pub fn record_request(&self, endpoint: &str, is_error: bool, latency_ms: u64) {
        let endpoints = self.endpoints.read();
        if let Some(metrics) = endpoints.get(endpoint) {
            metrics.requests.fetch_add(1, Ordering::Relaxed);
            if is_error {
                metrics.errors.fetch_add(1, Ordering::Relaxed);
            }
            metrics.latency.write().record(latency_ms);
            return;
        }
        drop(endpoints);

        let mut endpoints = self.endpoints.write();
        let metrics = endpoints.entry(endpoint.to_string()).or_default();
        metrics.requests.fetch_add(1, Ordering::Relaxed);
        if is_error {
            metrics.errors.fetch_add(1, Ordering::Relaxed);
        }
        metrics.latency.write().record(latency_ms);
    }

    /// Absorb a [`CacheMetrics`] snapshot from the recent-episodes cache.
    /// Called after each request that touches the cache so exported counters
    /// stay current without the registry holding a reference to the cache
    /// itself.
    pub fn observe_cache(&self, snapshot: CacheMetrics) {
        self.cache_hits.store(snapshot.hits, Ordering::Relaxed);
        self.cache_misses.store(snapshot.misses, Ordering::Relaxed);
        self.cache_invalidations
            .store(snapshot.invalidations, Ordering::Relaxed);
    }

    /// Render every tracked metric in Prometheus text exposition format.
    #[must_use]
    pub fn export_metrics(&self, worker_stats: WorkerPoolStats, storage_stats: StorageStats) -> String {
        let mut out = String::with_capacity(2048);

        writeln!(out, "# HELP memory_requests_total Total requests per endpoint").ok();
        writeln!(out, "# TYPE memory_requests_total counter").ok();
        writeln!(out, "# HELP memory_request_errors_total Failed requests per endpoint").ok();
        writeln!(out, "# TYPE memory_request_errors_total counter").ok();
        writeln!(out, "# HELP memory_request_latency_ms Request latency in milliseconds").ok();
        writeln!(out, "# TYPE memory_request_latency_ms summary").ok();

        for (endpoint, metrics) in self.endpoints.read().iter() {
            let requests = metrics.requests.load(Ordering::Relaxed);
            let errors = metrics.errors.load(Ordering::Relaxed);
            let latency = metrics.latency.read().clone();

            writeln!(out, "memory_requests_total{{endpoint=\"{endpoint}\"}} {requests}").ok();
            writeln!(out, "memory_request_errors_total{{endpoint=\"{endpoint}\"}} {errors}").ok();
            writeln!(
                out,
                "memory_request_latency_ms{{endpoint=\"{endpoint}\",quantile=\"0.5\"}} {}",
                latency.p50
            )
            .ok();
            writeln!(
                out,
                "memory_request_latency_ms{{endpoint=\"{endpoint}\",quantile=\"0.95\"}} {}",
                latency.p95
            )
            .ok();
            writeln!(
                out,
                "memory_request_latency_ms{{endpoint=\"{endpoint}\",quantile=\"0.99\"}} {}",
                latency.p99
            )
            .ok();
            writeln!(
                out,
                "memory_request_latency_ms_avg{{endpoint=\"{endpoint}\"}} {}",
                latency.avg_ms()
            )
            .ok();
        }

        writeln!(out, "\n# HELP memory_cache_hits_total Recent-episodes cache hits").ok();
        writeln!(out, "# TYPE memory_cache_hits_total counter").ok();
        writeln!(out, "memory_cache_hits_total {}", self.cache_hits.load(Ordering::Relaxed)).ok();

        writeln!(out, "\n# HELP memory_cache_misses_total Recent-episodes cache misses").ok();
        writeln!(out, "# TYPE memory_cache_misses_total counter").ok();
        writeln!(out, "memory_cache_misses_total {}", self.cache_misses.load(Ordering::Relaxed)).ok();

        writeln!(out, "\n# HELP memory_cache_invalidations_total Recent-episodes cache invalidations").ok();
        writeln!(out, "# TYPE memory_cache_invalidations_total counter").ok();
        writeln!(
            out,
            "memory_cache_invalidations_total {}",
            self.cache_invalidations.load(Ordering::Relaxed)
        )
        .ok();

        writeln!(out, "\n# HELP memory_worker_jobs_claimed_total Embedding jobs claimed").ok();
        writeln!(out, "# TYPE memory_worker_jobs_claimed_total counter").ok();
        writeln!(out, "memory_worker_jobs_claimed_total {}", worker_stats.total_claimed).ok();

        writeln!(out, "\n# HELP memory_worker_jobs_done_total Embedding jobs completed").ok();
        writeln!(out, "# TYPE memory_worker_jobs_done_total counter").ok();
        writeln!(out, "memory_worker_jobs_done_total {}", worker_stats.total_done).ok();

        writeln!(out, "\n# HELP memory_worker_jobs_dead_total Embedding jobs poisoned to dead").ok();
        writeln!(out, "# TYPE memory_worker_jobs_dead_total counter").ok();
        writeln!(out, "memory_worker_jobs_dead_total {}", worker_stats.total_dead).ok();

        writeln!(out, "\n# HELP memory_episodes_total Episodes in storage").ok();
        writeln!(out, "# TYPE memory_episodes_total gauge").ok();
        writeln!(out, "memory_episodes_total {}", storage_stats.total_episodes).ok();

        writeln!(out, "\n# HELP memory_jobs_pending Pending embedding jobs").ok();
        writeln!(out, "# TYPE memory_jobs_pending gauge").ok();
        writeln!(out, "memory_jobs_pending {}", storage_stats.pending_jobs).ok();

        writeln!(out, "\n# HELP memory_jobs_processing Embedding jobs currently claimed").ok();
        writeln!(out, "# TYPE memory_jobs_processing gauge").ok();
        writeln!(out, "memory_jobs_processing {}", storage_stats.processing_jobs).ok();

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_requests_per_endpoint() {
        let registry = MetricsRegistry::new();
        registry.record_request("search", false, 12);
        registry.record_request("search", true, 30);
        registry.record_request("recent", false, 2);

        let output = registry.export_metrics(WorkerPoolStats::default(), StorageStats::default());
        assert!(output.contains("memory_requests_total{endpoint=\"search\"} 2"));
        assert!(output.contains("memory_request_errors_total{endpoint=\"search\"} 1"));
        assert!(output.contains("memory_requests_total{endpoint=\"recent\"} 1"));
    }

    #[test]
    fn absorbs_cache_snapshot() {
        let registry = MetricsRegistry::new();
        registry.observe_cache(CacheMetrics {
            hits: 5,
            misses: 2,
            invalidations: 1,
        });
        let output = registry.export_metrics(WorkerPoolStats::default(), StorageStats::default());
        assert!(output.contains("memory_cache_hits_total 5"));
        assert!(output.contains("memory_cache_misses_total 2"));
        assert!(output.contains("memory_cache_invalidations_total 1"));
    }

    #[test]
    fn exports_worker_and_storage_gauges() {
        let registry = MetricsRegistry::new();
        let worker_stats = WorkerPoolStats {
            total_claimed: 10,
            total_done: 8,
            total_failed: 2,
            total_dead: 1,
        };
        let storage_stats = StorageStats {
            total_episodes: 100,
            pending_jobs: 3,
            processing_jobs: 1,
            done_jobs: 95,
            dead_jobs: 1,
        };
        let output = registry.export_metrics(worker_stats, storage_stats);
        assert!(output.contains("memory_worker_jobs_done_total 8"));
        assert!(output.contains("memory_episodes_total 100"));
        assert!(output.contains("memory_jobs_pending 3"));
    }
}
