//! Shared test fixtures for the episodic memory service: episode/request
//! builders and a connect-and-initialize helper over an in-memory libSQL
//! database, used by `memory-core`'s and `memory-api`'s own test modules and
//! by the workspace's end-to-end scenario tests.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use memory_core::encoder::TextEncoder;
use memory_core::error::{Error, Result};
use memory_core::storage::StorageBackend;
use memory_core::types::{Embedding384, Emotional8d, Somatic7d};
use memory_core::{create_episode, CreateEpisodeRequest, CreateEpisodeResult};
use memory_storage_libsql::LibsqlStorage;

/// Connect an in-memory libSQL database and initialize its schema, ready for
/// a single test's lifetime.
///
/// # Panics
/// Panics if the connection or schema initialization fails — a test
/// precondition, not a scenario under test.
pub async fn in_memory_storage() -> Arc<dyn StorageBackend> {
    let storage = LibsqlStorage::connect(":memory:", "")
        .await
        .expect("connect in-memory libsql database");
    storage.initialize_schema().await.expect("initialize schema");
    Arc::new(storage)
}

/// Build a minimal ingestion request carrying plain `content`, defaulting
/// everything else the way a bare `{action_type: "note", ...}` call would.
#[must_use]
pub fn note_request(content: &str, tags: &[&str]) -> CreateEpisodeRequest {
    CreateEpisodeRequest {
        action_type: "note".to_string(),
        action_details: serde_json::json!({ "content": content }),
        context_state: serde_json::json!({}),
        tags: tags.iter().map(|t| (*t).to_string()).collect::<BTreeSet<_>>(),
        emotional_8d: None,
        somatic_7d: None,
    }
}

/// Build a consciousness-sample ingestion request (§4.B's
/// `/memory/consciousness/update`, which stamps exactly one of
/// `emotional_8d`/`somatic_7d`).
#[must_use]
pub fn consciousness_request(
    content: &str,
    emotional: Option<Emotional8d>,
    somatic: Option<Somatic7d>,
) -> CreateEpisodeRequest {
    CreateEpisodeRequest {
        action_type: "consciousness_update".to_string(),
        action_details: serde_json::json!({ "content": content }),
        context_state: serde_json::json!({}),
        tags: BTreeSet::from(["consciousness".to_string()]),
        emotional_8d: emotional,
        somatic_7d: somatic,
    }
}

/// Ingest `request` and wait for its embedding job to reach `done`,
/// polling `storage.stats()` for a zero pending/processing queue. Used by
/// tests that need a readable embedding before proceeding (e.g. semantic
/// search), since ingestion only enqueues the job.
///
/// # Panics
/// Panics if the job has not completed after `max_polls` polls — a sign the
/// worker pool under test is stuck, which should fail the test loudly.
pub async fn ingest_and_wait_for_embedding(
    storage: &Arc<dyn StorageBackend>,
    request: CreateEpisodeRequest,
) -> CreateEpisodeResult {
    let result = create_episode(storage, request).await.expect("create_episode");
    for _ in 0..200 {
        let stats = storage.stats().await.expect("stats");
        if stats.pending_jobs == 0 && stats.processing_jobs == 0 {
            return result;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("embedding job for {} never completed", result.episode_id);
}

/// An encoder that counts every call, used to assert at-most-once claiming:
/// if the worker pool ever double-processes a job, the count exceeds the
/// number of episodes ingested.
#[derive(Default)]
pub struct CountingEncoder {
    inner: memory_core::encoder::HashEncoder,
    calls: std::sync::atomic::AtomicU64,
}

impl CountingEncoder {
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl TextEncoder for CountingEncoder {
    async fn encode(&self, text: &str) -> Result<Embedding384> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.inner.encode(text).await
    }

    fn version(&self) -> &str {
        self.inner.version()
    }
}

/// An encoder that fails deterministically whenever `text` contains
/// `poison_marker`, used to exercise the worker pool's retry/poison path
/// without depending on a real model's error behavior.
pub struct PoisonEncoder {
    inner: memory_core::encoder::HashEncoder,
    poison_marker: String,
}

impl PoisonEncoder {
    #[must_use]
    pub fn new(poison_marker: impl Into<String>) -> Self {
        Self {
            inner: memory_core::encoder::HashEncoder::default(),
            poison_marker: poison_marker.into(),
        }
    }
}

#[async_trait]
impl TextEncoder for PoisonEncoder {
    async fn encode(&self, text: &str) -> Result<Embedding384> {
        if text.contains(&self.poison_marker) {
            return Err(Error::Encoder("poisoned content rejected by test encoder".to_string()));
        }
        self.inner.encode(text).await
    }

    fn version(&self) -> &str {
        self.inner.version()
    }
}

/// A fixed, all-high `Emotional8d` sample for S6-style consolidation tests.
#[must_use]
pub fn high_emotional_sample() -> Emotional8d {
    Emotional8d {
        joy: 0.9,
        trust: 0.8,
        fear: 0.0,
        surprise: 0.6,
        sadness: 0.0,
        disgust: 0.0,
        anger: 0.0,
        anticipation: 0.7,
    }
}

/// Current time truncated to whole seconds, convenient for building
/// deterministic timestamp sequences in chain-tracing tests.
#[must_use]
pub fn now_trunc() -> chrono::DateTime<Utc> {
    let now = Utc::now();
    chrono::DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_storage_accepts_an_episode() {
        let storage = in_memory_storage().await;
        let result = create_episode(&storage, note_request("hello", &["test"])).await.unwrap();
        let fetched = storage.get_episode(result.episode_id).await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn poison_encoder_rejects_marked_content_only() {
        let encoder = PoisonEncoder::new("POISON");
        assert!(encoder.encode("clean text").await.is_ok());
        assert!(encoder.encode("this has POISON in it").await.is_err());
    }
}
