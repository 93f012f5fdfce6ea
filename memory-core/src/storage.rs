//! Storage abstraction.
//!
//! A single trait in front of whatever relational+vector substrate backs
//! the service (libSQL in production, an in-memory map in tests). Every
//! other module in this crate — ingestion, the worker pool, retrieval,
//! decay, consolidation — is generic over [`StorageBackend`] and never
//! touches a connection pool or SQL string directly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::episode::Episode;
use crate::error::Result;
use crate::job::{EmbeddingJob, JobState};
use crate::narrative::NarrativeTrace;
use crate::types::RelationshipLabel;

/// A claimed batch of jobs ready for the worker that claimed them.
#[derive(Debug, Clone)]
pub struct ClaimedBatch {
    pub jobs: Vec<EmbeddingJob>,
}

/// Parameters for [`StorageBackend::search_semantic`].
#[derive(Debug, Clone)]
pub struct SemanticSearchParams {
    pub query_vector: Vec<f32>,
    pub limit: usize,
    pub min_similarity: f32,
}

/// One hit from a semantic search.
#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub episode: Episode,
    pub similarity: f32,
}

/// Direction used by [`StorageBackend::episodes_in_window`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOrder {
    NewestFirst,
    OldestFirst,
}

/// Unified storage backend trait. All operations are async so that both a
/// genuinely async driver (libSQL over HTTP/embedded-replica) and a
/// synchronous test double (wrapped in `spawn_blocking` if ever needed) can
/// implement it uniformly.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Insert a new episode and its pending embedding job in a single
    /// transaction.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::StorageConflict`] on a serialization
    /// failure, [`crate::error::Error::StorageUnavailable`] if the
    /// connection is down.
    async fn insert_episode_with_job(
        &self,
        episode: &Episode,
        priority: i64,
    ) -> Result<EmbeddingJob>;

    /// Fetch a single episode by id.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::StorageUnavailable`] on connection
    /// failure.
    async fn get_episode(&self, id: Uuid) -> Result<Option<Episode>>;

    /// Overwrite an episode's stored representation (used by retrieval's
    /// access-tracking update and consolidation's boost write — the
    /// worker's embedding write goes through [`Self::complete_embedding_job`]
    /// instead, so it lands in the same transaction as the job completion).
    ///
    /// # Errors
    /// Returns [`crate::error::Error::StorageConflict`] on a concurrent
    /// write conflict.
    async fn update_episode(&self, episode: &Episode) -> Result<()>;

    /// Atomically claim up to `batch_size` pending jobs, ordered by
    /// priority desc then enqueue time asc, transitioning them to
    /// `processing`. Rows already locked by another worker are skipped.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::StorageUnavailable`] on connection
    /// failure.
    async fn claim_jobs(&self, batch_size: usize) -> Result<ClaimedBatch>;

    /// Write `episode`'s embedding and mark its job `done` in a single
    /// transaction: either both writes land or neither does, so a crash
    /// between them can never leave a `done` job pointing at an episode
    /// that never got its vector.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::StorageConflict`] if the job was not
    /// found in `processing` state.
    async fn complete_embedding_job(
        &self,
        episode: &Episode,
        job_id: Uuid,
        processed_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Record a failed attempt: increments `retry_count`, transitions to
    /// `dead` if `retry_count >= max_retries`, otherwise back to `pending`.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::StorageUnavailable`] on connection
    /// failure.
    async fn fail_job(&self, job_id: Uuid, error: &str, max_retries: u32) -> Result<JobState>;

    /// Sweep `processing` jobs whose claim is older than `timeout`, resetting
    /// them to `pending` for liveness under worker crash.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::StorageUnavailable`] on connection
    /// failure.
    async fn reap_stale_jobs(&self, timeout: std::time::Duration) -> Result<usize>;

    /// The most recently created episodes, newest first.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::StorageUnavailable`] on connection
    /// failure.
    async fn recent_episodes(&self, limit: usize) -> Result<Vec<Episode>>;

    /// Semantic nearest-neighbor search over episodes with a present
    /// embedding.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::StorageUnavailable`] on connection
    /// failure.
    async fn search_semantic(&self, params: SemanticSearchParams) -> Result<Vec<SemanticHit>>;

    /// Episodes created relative to a time bound, optionally filtered by
    /// tag-set overlap.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::StorageUnavailable`] on connection
    /// failure.
    async fn episodes_in_window(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        tags: Option<&[String]>,
        limit: usize,
        order: WindowOrder,
    ) -> Result<Vec<Episode>>;

    /// All episodes created on the given UTC calendar date, used by
    /// consolidation.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::StorageUnavailable`] on connection
    /// failure.
    async fn episodes_on_date(&self, date: chrono::NaiveDate) -> Result<Vec<Episode>>;

    /// Episodes whose content was created within `[start, end]`, used by
    /// interleaved-replay sampling and decay analysis over arbitrary
    /// populations.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::StorageUnavailable`] on connection
    /// failure.
    async fn episodes_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Episode>>;

    /// Persist a temporal edge on the source episode's embedded
    /// `temporal_refs` list.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::Validation`] if either episode does
    /// not exist.
    async fn add_temporal_ref(
        &self,
        source: Uuid,
        target: Uuid,
        relationship: RelationshipLabel,
    ) -> Result<()>;

    /// Read the source episode's temporal refs, optionally filtered by
    /// relationship label, and resolve them to full target episodes.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::NotFound`] if `source` does not exist.
    async fn get_related_episodes(
        &self,
        source: Uuid,
        relationship: Option<RelationshipLabel>,
    ) -> Result<Vec<Episode>>;

    /// Record an access against `episode_id`'s `access_tracking`. Best
    /// effort: callers must not fail a read on this call's error.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::Cache`] is never returned here; this
    /// surfaces storage-layer failures which the caller is expected to log
    /// and swallow.
    async fn update_access_tracking(&self, episode_id: Uuid, at: DateTime<Utc>) -> Result<()>;

    /// Episodes whose `metadata.facts.{fact_type}` is present, optionally
    /// constrained by tags and a creation window, ordered by `created_at`.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::StorageUnavailable`] on connection
    /// failure.
    async fn episodes_with_fact(
        &self,
        fact_type: &str,
        tags: Option<&[String]>,
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
        limit: usize,
        order: WindowOrder,
    ) -> Result<Vec<Episode>>;

    /// Persist a batch of Narrative Traces from a single consolidation run.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::StorageUnavailable`] on connection
    /// failure.
    async fn insert_traces(&self, traces: &[NarrativeTrace]) -> Result<()>;

    /// Total episode and queue-state counts, used by `/stats`.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::StorageUnavailable`] on connection
    /// failure.
    async fn stats(&self) -> Result<StorageStats>;

    /// A lightweight connectivity probe, used by `/health`.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::StorageUnavailable`] if the
    /// connection cannot be established.
    async fn ping(&self) -> Result<()>;
}

/// Aggregate counts exposed on `/stats` and consulted by `/health`'s
/// queue-depth degradation check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    pub total_episodes: u64,
    pub pending_jobs: u64,
    pub processing_jobs: u64,
    pub done_jobs: u64,
    pub dead_jobs: u64,
}
