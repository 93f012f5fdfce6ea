//! End-to-end scenarios exercising ingestion, retrieval, the worker pool's
//! claim/retry/poison path, temporal linking, and consolidation together
//! against a single in-memory storage backend.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use memory_core::consolidation::run_consolidation;
use memory_core::episode::Episode;
use memory_core::storage::StorageBackend;
use memory_core::types::{ConsolidationOutputs, Emotional8d, Metadata};
use memory_core::worker::{WorkerPool, WorkerPoolConfig};
use memory_core::{create_episode, Error};
use test_utils::{consciousness_request, high_emotional_sample, ingest_and_wait_for_embedding, note_request};
use uuid::Uuid;

/// S1 — ingest, let the embedding finish, then search for it. `HashEncoder`
/// hashes each string independently and does not cluster semantically
/// related text (see its doc comment), so the query has to be the exact
/// content the episode was ingested with to reliably land above any
/// similarity floor — this is a stub-encoder constraint, not a property of
/// the retrieval engine itself.
#[tokio::test]
async fn ingest_then_search_round_trip() {
    let storage = test_utils::in_memory_storage().await;
    let encoder: Arc<dyn memory_core::encoder::TextEncoder> =
        Arc::new(memory_core::encoder::HashEncoder::default());
    let worker_pool = WorkerPool::new(WorkerPoolConfig::default(), Arc::clone(&storage), Arc::clone(&encoder));
    worker_pool.start();

    let content = "vector databases enable semantic retrieval";
    let request = note_request(content, &["test"]);
    ingest_and_wait_for_embedding(&storage, request).await;

    let retrieval = memory_core::retrieval::RetrievalEngine::new(
        Arc::clone(&storage),
        encoder,
        100,
        Duration::from_secs(60),
    );
    let results = retrieval.search(content, 5, 0.9).await.unwrap();
    assert!(!results.is_empty(), "expected the ingested episode to match its own content");
    assert!(results.iter().any(|e| e.content == content));
}

/// S2 — fact extraction on structured content.
#[tokio::test]
async fn fact_extraction_on_structured_content() {
    let storage = test_utils::in_memory_storage().await;
    let content = "NEXUS V2.0.0\nStatus: COMPLETE\nAccuracy: 100.0%\nEpisodes: 553\nPhase: 4";
    create_episode(&storage, note_request(content, &[])).await.unwrap();

    let encoder: Arc<dyn memory_core::encoder::TextEncoder> = Arc::new(memory_core::encoder::HashEncoder::default());
    let retrieval =
        memory_core::retrieval::RetrievalEngine::new(Arc::clone(&storage), encoder, 100, Duration::from_secs(60));

    let version = retrieval
        .facts("nexus_version", None, None, None, 20, memory_core::storage::WindowOrder::NewestFirst)
        .await
        .unwrap();
    assert_eq!(version.value, serde_json::json!("2.0.0"));
    assert!(version.confidence > 0.5);

    let status = retrieval
        .facts("status", None, None, None, 20, memory_core::storage::WindowOrder::NewestFirst)
        .await
        .unwrap();
    assert_eq!(status.value, serde_json::json!("COMPLETE"));
}

/// S3 — at-most-once claim: 10 pending jobs, 5 concurrent workers, batch
/// size 3; every job reaches `done` and the encoder is invoked exactly once
/// per job.
#[tokio::test]
async fn worker_pool_claims_each_job_at_most_once() {
    let storage = test_utils::in_memory_storage().await;
    for i in 0..10 {
        create_episode(&storage, note_request(&format!("seed episode {i}"), &[])).await.unwrap();
    }

    let encoder = Arc::new(test_utils::CountingEncoder::default());
    let worker_pool = WorkerPool::new(
        WorkerPoolConfig {
            worker_count: 5,
            batch_size: 3,
            poll_interval: Duration::from_millis(20),
            max_retries: 3,
            reaper_timeout: Duration::from_secs(60),
        },
        Arc::clone(&storage),
        Arc::clone(&encoder) as Arc<dyn memory_core::encoder::TextEncoder>,
    );
    worker_pool.start();

    for _ in 0..300 {
        let stats = storage.stats().await.unwrap();
        if stats.done_jobs == 10 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let stats = storage.stats().await.unwrap();
    assert_eq!(stats.done_jobs, 10);
    assert_eq!(stats.pending_jobs, 0);
    assert_eq!(stats.processing_jobs, 0);
    assert_eq!(encoder.calls(), 10, "each job's content must be encoded exactly once");
}

/// S4 — poisoned job isolation: one episode's content always fails
/// encoding; after `max_retries` attempts it lands in `dead` while the other
/// five reach `done`.
#[tokio::test]
async fn poisoned_job_is_isolated_to_dead_state() {
    let storage = test_utils::in_memory_storage().await;
    for i in 0..5 {
        create_episode(&storage, note_request(&format!("clean episode {i}"), &[])).await.unwrap();
    }
    create_episode(&storage, note_request("this one has POISON in it", &[])).await.unwrap();

    let encoder: Arc<dyn memory_core::encoder::TextEncoder> = Arc::new(test_utils::PoisonEncoder::new("POISON"));
    let max_retries = 3;
    let worker_pool = WorkerPool::new(
        WorkerPoolConfig {
            worker_count: 2,
            batch_size: 3,
            poll_interval: Duration::from_millis(10),
            max_retries,
            reaper_timeout: Duration::from_secs(60),
        },
        Arc::clone(&storage),
        encoder,
    );
    worker_pool.start();

    for _ in 0..300 {
        let stats = storage.stats().await.unwrap();
        if stats.done_jobs == 5 && stats.dead_jobs == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let stats = storage.stats().await.unwrap();
    assert_eq!(stats.done_jobs, 5);
    assert_eq!(stats.dead_jobs, 1);
    assert_eq!(stats.pending_jobs, 0);
    assert_eq!(stats.processing_jobs, 0);
}

/// S5 — temporal link + related traversal.
#[tokio::test]
async fn temporal_link_and_related_traversal() {
    let storage = test_utils::in_memory_storage().await;
    let a = create_episode(&storage, note_request("A", &[])).await.unwrap();
    let b = create_episode(&storage, note_request("B", &[])).await.unwrap();
    let c = create_episode(&storage, note_request("C", &[])).await.unwrap();

    storage
        .add_temporal_ref(b.episode_id, a.episode_id, memory_core::types::RelationshipLabel::Before)
        .await
        .unwrap();
    storage
        .add_temporal_ref(b.episode_id, c.episode_id, memory_core::types::RelationshipLabel::Causes)
        .await
        .unwrap();

    let encoder: Arc<dyn memory_core::encoder::TextEncoder> = Arc::new(memory_core::encoder::HashEncoder::default());
    let retrieval = memory_core::retrieval::RetrievalEngine::new(Arc::clone(&storage), encoder, 100, Duration::from_secs(60));

    let all_related = retrieval.related(b.episode_id, None).await.unwrap();
    let related_ids: BTreeSet<Uuid> = all_related.iter().map(|e| e.episode_id).collect();
    assert!(related_ids.contains(&a.episode_id));
    assert!(related_ids.contains(&c.episode_id));

    let causal_only = retrieval
        .related(b.episode_id, Some(memory_core::types::RelationshipLabel::Causes))
        .await
        .unwrap();
    assert_eq!(causal_only.len(), 1);
    assert_eq!(causal_only[0].episode_id, c.episode_id);
}

/// S6 — consolidation boost: a day of 10 episodes where the last one is a
/// clear breakthrough and the earlier nine share tags and are closely
/// spaced; running consolidation should trace a chain, boost every member,
/// and emit narrative traces bookended by an initiator and a conclusion.
#[tokio::test]
async fn consolidation_boosts_a_traced_chain() {
    let storage = test_utils::in_memory_storage().await;
    let base = Utc::now() - chrono::Duration::days(1);
    let target_date = base.date_naive();

    let mut episode_ids = Vec::new();
    for i in 0_i64..10 {
        let created_at = base + chrono::Duration::minutes(20 * i);
        let is_last = i == 9;
        let episode = Episode {
            episode_id: Uuid::new_v4(),
            content: format!("consolidation candidate {i}"),
            importance: if is_last { 0.8 } else { 0.4 },
            tags: BTreeSet::from(["breakthrough_chain".to_string(), "shared".to_string()]),
            created_at,
            embedding: memory_core::types::EmbeddingState::Pending,
            metadata: Metadata {
                action_type: "note".to_string(),
                salience_score: Some(if is_last { 0.9 } else { 0.3 }),
                emotional_8d: if is_last { Some(high_emotional_sample()) } else { None },
                consolidation: ConsolidationOutputs::default(),
                ..Metadata::default()
            },
        };
        episode_ids.push(episode.episode_id);
        storage.insert_episode_with_job(&episode, 0).await.unwrap();
    }

    let report = run_consolidation(&storage, target_date, Utc::now()).await.unwrap();

    assert!(report.breakthroughs_found >= 1);
    assert!(report.chains_formed >= 1);
    assert!(report.avg_boost > 0.0);
    assert!(report.traces_created >= 1);

    let last_id = *episode_ids.last().unwrap();
    assert_eq!(
        report.top_breakthroughs.first().map(|b| b.episode_id),
        Some(last_id),
        "the clear breakthrough episode should rank first by score"
    );

    let last_episode = storage.get_episode(last_id).await.unwrap().unwrap();
    assert!(
        last_episode.metadata.consolidation.consolidated_salience_score.unwrap()
            > last_episode.metadata.salience_score.unwrap()
    );
}

/// Consciousness-sample ingestion round-trips through the same path as a
/// normal episode, distinguished only by its `emotional_8d`/`somatic_7d`
/// stamp (no `somatic_7d` supplied here).
#[tokio::test]
async fn consciousness_sample_is_stamped_with_emotional_state() {
    let storage = test_utils::in_memory_storage().await;
    let request = consciousness_request("feeling good about this run", Some(high_emotional_sample()), None);
    let result = create_episode(&storage, request).await.unwrap();

    let episode = storage.get_episode(result.episode_id).await.unwrap().unwrap();
    assert!(episode.metadata.emotional_8d.is_some());
    assert!(episode.metadata.somatic_7d.is_none());
    assert!(episode.tags.contains("consciousness"));
}

/// A not-found fact type surfaces the caller-facing error variant directly,
/// not a generic storage error.
#[tokio::test]
async fn fact_lookup_on_empty_store_is_not_found() {
    let storage = test_utils::in_memory_storage().await;
    let encoder: Arc<dyn memory_core::encoder::TextEncoder> = Arc::new(memory_core::encoder::HashEncoder::default());
    let retrieval = memory_core::retrieval::RetrievalEngine::new(Arc::clone(&storage), encoder, 100, Duration::from_secs(60));

    let result = retrieval
        .facts("nexus_version", None, None, None, 20, memory_core::storage::WindowOrder::NewestFirst)
        .await;
    assert!(matches!(result, Err(Error::FactNotFound(_))));
}
