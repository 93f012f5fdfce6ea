//! [`memory_core::StorageBackend`] implementation for [`crate::LibsqlStorage`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use memory_core::storage::ClaimedBatch;
use memory_core::types::cosine_similarity;
use memory_core::{
    EmbeddingJob, Episode, Error, JobState, NarrativeTrace, RelationshipLabel, Result,
    SemanticHit, SemanticSearchParams, StorageBackend, StorageStats, WindowOrder,
};
use uuid::Uuid;

use crate::row::{self, format_timestamp, parse_timestamp, storage_err};
use crate::LibsqlStorage;

#[async_trait]
impl StorageBackend for LibsqlStorage {
    async fn insert_episode_with_job(&self, episode: &Episode, priority: i64) -> Result<EmbeddingJob> {
        let row = row::episode_to_row(episode)?;
        let conn = self.conn.lock().await;

        conn.execute("BEGIN IMMEDIATE", ()).await.map_err(storage_err)?;

        let inserted = insert_episode_with_job_in_transaction(&conn, episode, &row, priority).await;

        match inserted {
            Ok(job) => {
                conn.execute("COMMIT", ()).await.map_err(storage_err)?;
                Ok(job)
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    async fn get_episode(&self, id: Uuid) -> Result<Option<Episode>> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(&format!("SELECT {EPISODE_COLUMNS} FROM episodes WHERE episode_id = ?1"), libsql::params![id.to_string()])
            .await
            .map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(r) => Ok(Some(row::row_to_episode(&r)?)),
            None => Ok(None),
        }
    }

    async fn update_episode(&self, episode: &Episode) -> Result<()> {
        let row = row::episode_to_row(episode)?;
        let conn = self.conn.lock().await;
        let changed = conn
            .execute(
                "UPDATE episodes SET content = ?2, importance = ?3, tags = ?4, \
                 embedding_state = ?5, embedding = ?6, embedding_version = ?7, metadata = ?8 \
                 WHERE episode_id = ?1",
                libsql::params![
                    row.episode_id,
                    row.content,
                    row.importance,
                    row.tags,
                    row.embedding_state,
                    row.embedding,
                    row.embedding_version,
                    row.metadata,
                ],
            )
            .await
            .map_err(|e| Error::StorageConflict(e.to_string()))?;

        if changed == 0 {
            return Err(Error::NotFound(episode.episode_id));
        }
        Ok(())
    }

    async fn claim_jobs(&self, batch_size: usize) -> Result<ClaimedBatch> {
        let conn = self.conn.lock().await;
        let now = format_timestamp(Utc::now());

        conn.execute("BEGIN IMMEDIATE", ()).await.map_err(storage_err)?;

        let claimed = claim_jobs_in_transaction(&conn, batch_size, &now).await;

        match claimed {
            Ok(jobs) => {
                conn.execute("COMMIT", ()).await.map_err(storage_err)?;
                Ok(ClaimedBatch { jobs })
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    async fn complete_embedding_job(&self, episode: &Episode, job_id: Uuid, processed_at: DateTime<Utc>) -> Result<()> {
        let row = row::episode_to_row(episode)?;
        let conn = self.conn.lock().await;

        conn.execute("BEGIN IMMEDIATE", ()).await.map_err(storage_err)?;

        let result = complete_embedding_job_in_transaction(&conn, &row, job_id, processed_at).await;

        match result {
            Ok(()) => {
                conn.execute("COMMIT", ()).await.map_err(storage_err)?;
                Ok(())
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    async fn fail_job(&self, job_id: Uuid, error: &str, max_retries: u32) -> Result<JobState> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query("SELECT retry_count FROM embedding_jobs WHERE job_id = ?1", libsql::params![job_id.to_string()])
            .await
            .map_err(storage_err)?;
        let Some(r) = rows.next().await.map_err(storage_err)? else {
            return Err(Error::NotFound(job_id));
        };
        let retry_count: i64 = r.get(0).map_err(storage_err)?;
        let next_retry_count = retry_count + 1;
        let next_state = if u32::try_from(next_retry_count).unwrap_or(u32::MAX) >= max_retries {
            JobState::Dead
        } else {
            JobState::Pending
        };

        conn.execute(
            "UPDATE embedding_jobs SET state = ?2, retry_count = ?3, last_error = ?4, claimed_at = NULL \
             WHERE job_id = ?1",
            libsql::params![job_id.to_string(), next_state.as_str(), next_retry_count, error],
        )
        .await
        .map_err(storage_err)?;

        Ok(next_state)
    }

    async fn reap_stale_jobs(&self, timeout: std::time::Duration) -> Result<usize> {
        let conn = self.conn.lock().await;
        let cutoff = format_timestamp(Utc::now() - chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::seconds(60)));
        let changed = conn
            .execute(
                "UPDATE embedding_jobs SET state = 'pending', claimed_at = NULL \
                 WHERE state = 'processing' AND claimed_at < ?1",
                libsql::params![cutoff],
            )
            .await
            .map_err(storage_err)?;
        Ok(changed as usize)
    }

    async fn recent_episodes(&self, limit: usize) -> Result<Vec<Episode>> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                &format!("SELECT {EPISODE_COLUMNS} FROM episodes ORDER BY created_at DESC LIMIT ?1"),
                libsql::params![i64::try_from(limit).unwrap_or(i64::MAX)],
            )
            .await
            .map_err(storage_err)?;
        collect_episodes(&mut rows).await
    }

    async fn search_semantic(&self, params: SemanticSearchParams) -> Result<Vec<SemanticHit>> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(&format!("SELECT {EPISODE_COLUMNS} FROM episodes WHERE embedding_state = 'ready'"), ())
            .await
            .map_err(storage_err)?;
        let candidates = collect_episodes(&mut rows).await?;
        drop(conn);

        let mut hits: Vec<SemanticHit> = candidates
            .into_iter()
            .filter_map(|episode| {
                let vector = episode.embedding.vector()?;
                let similarity = cosine_similarity(vector.as_slice(), &params.query_vector);
                (similarity >= params.min_similarity).then_some(SemanticHit { episode, similarity })
            })
            .collect();

        hits.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(params.limit);
        Ok(hits)
    }

    async fn episodes_in_window(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        tags: Option<&[String]>,
        limit: usize,
        order: WindowOrder,
    ) -> Result<Vec<Episode>> {
        let mut sql = format!("SELECT {EPISODE_COLUMNS} FROM episodes WHERE 1 = 1");
        let mut args: Vec<libsql::Value> = Vec::new();

        if let Some(start) = start {
            sql.push_str(&format!(" AND created_at >= ?{}", args.len() + 1));
            args.push(format_timestamp(start).into());
        }
        if let Some(end) = end {
            sql.push_str(&format!(" AND created_at <= ?{}", args.len() + 1));
            args.push(format_timestamp(end).into());
        }
        sql.push_str(match order {
            WindowOrder::NewestFirst => " ORDER BY created_at DESC",
            WindowOrder::OldestFirst => " ORDER BY created_at ASC",
        });
        sql.push_str(&format!(" LIMIT ?{}", args.len() + 1));
        args.push(i64::try_from(limit).unwrap_or(i64::MAX).into());

        let conn = self.conn.lock().await;
        let mut rows = conn.query(&sql, libsql::params_from_iter(args)).await.map_err(storage_err)?;
        let episodes = collect_episodes(&mut rows).await?;
        Ok(filter_by_tags(episodes, tags))
    }

    async fn episodes_on_date(&self, date: chrono::NaiveDate) -> Result<Vec<Episode>> {
        let start = date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
        let end = date.and_hms_opt(23, 59, 59).unwrap_or_default().and_utc();
        self.episodes_in_window(Some(start), Some(end), None, usize::MAX, WindowOrder::OldestFirst).await
    }

    async fn episodes_created_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Episode>> {
        self.episodes_in_window(Some(start), Some(end), None, usize::MAX, WindowOrder::OldestFirst).await
    }

    async fn add_temporal_ref(&self, source: Uuid, target: Uuid, relationship: RelationshipLabel) -> Result<()> {
        let conn = self.conn.lock().await;

        let Some(mut episode) = get_episode_locked(&conn, source).await? else {
            return Err(Error::Validation(format!("source episode {source} does not exist")));
        };
        if get_episode_locked(&conn, target).await?.is_none() {
            return Err(Error::Validation(format!("target episode {target} does not exist")));
        }

        let already_present = episode
            .metadata
            .temporal_refs
            .iter()
            .any(|r| r.target_episode_id == target && r.relationship == relationship);
        if !already_present {
            episode.metadata.temporal_refs.push(memory_core::TemporalRef {
                target_episode_id: target,
                relationship,
            });
            let row = row::episode_to_row(&episode)?;
            conn.execute("UPDATE episodes SET metadata = ?2 WHERE episode_id = ?1", libsql::params![row.episode_id, row.metadata])
                .await
                .map_err(storage_err)?;
        }

        insert_temporal_edge(&conn, source, target, relationship).await
    }

    async fn get_related_episodes(&self, source: Uuid, relationship: Option<RelationshipLabel>) -> Result<Vec<Episode>> {
        let conn = self.conn.lock().await;
        if get_episode_locked(&conn, source).await?.is_none() {
            return Err(Error::NotFound(source));
        }

        let mut sql = "SELECT target_episode_id FROM temporal_edges WHERE source_episode_id = ?1".to_string();
        let mut args: Vec<libsql::Value> = vec![source.to_string().into()];
        if let Some(relationship) = relationship {
            sql.push_str(" AND relationship = ?2");
            args.push(relationship.as_str().into());
        }

        let mut rows = conn.query(&sql, libsql::params_from_iter(args)).await.map_err(storage_err)?;
        let mut targets = Vec::new();
        while let Some(r) = rows.next().await.map_err(storage_err)? {
            let target_id: String = r.get(0).map_err(storage_err)?;
            targets.push(target_id);
        }

        let mut episodes = Vec::with_capacity(targets.len());
        for target_id in targets {
            let Ok(id) = Uuid::parse_str(&target_id) else { continue };
            if let Some(episode) = get_episode_locked(&conn, id).await? {
                episodes.push(episode);
            }
        }
        Ok(episodes)
    }

    async fn update_access_tracking(&self, episode_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().await;
        let Some(mut episode) = get_episode_locked(&conn, episode_id).await? else {
            return Err(Error::NotFound(episode_id));
        };
        episode.metadata.access_tracking.record_access(at);
        let row = row::episode_to_row(&episode)?;
        conn.execute("UPDATE episodes SET metadata = ?2 WHERE episode_id = ?1", libsql::params![row.episode_id, row.metadata])
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn episodes_with_fact(
        &self,
        fact_type: &str,
        tags: Option<&[String]>,
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
        limit: usize,
        order: WindowOrder,
    ) -> Result<Vec<Episode>> {
        let mut sql = format!(
            "SELECT {EPISODE_COLUMNS} FROM episodes \
             WHERE metadata LIKE '%\"facts\"%' AND json_extract(metadata, '$.facts.' || ?1) IS NOT NULL"
        );
        let mut args: Vec<libsql::Value> = vec![fact_type.to_string().into()];

        if let Some(after) = after {
            sql.push_str(&format!(" AND created_at >= ?{}", args.len() + 1));
            args.push(format_timestamp(after).into());
        }
        if let Some(before) = before {
            sql.push_str(&format!(" AND created_at <= ?{}", args.len() + 1));
            args.push(format_timestamp(before).into());
        }
        sql.push_str(match order {
            WindowOrder::NewestFirst => " ORDER BY created_at DESC",
            WindowOrder::OldestFirst => " ORDER BY created_at ASC",
        });
        sql.push_str(&format!(" LIMIT ?{}", args.len() + 1));
        args.push(i64::try_from(limit).unwrap_or(i64::MAX).into());

        let conn = self.conn.lock().await;
        let mut rows = conn.query(&sql, libsql::params_from_iter(args)).await.map_err(storage_err)?;
        let episodes = collect_episodes(&mut rows).await?;
        Ok(filter_by_tags(episodes, tags))
    }

    async fn insert_traces(&self, traces: &[NarrativeTrace]) -> Result<()> {
        let conn = self.conn.lock().await;
        for trace in traces {
            conn.execute(
                "INSERT OR REPLACE INTO narrative_traces \
                 (trace_id, source_episode_id, target_episode_id, trace_type, strength, narrative_id, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                libsql::params![
                    trace.trace_id.to_string(),
                    trace.source_episode_id.to_string(),
                    trace.target_episode_id.to_string(),
                    trace.trace_type.as_str(),
                    trace.strength,
                    trace.narrative_id.to_string(),
                    format_timestamp(trace.created_at),
                ],
            )
            .await
            .map_err(storage_err)?;
        }
        Ok(())
    }

    async fn stats(&self) -> Result<StorageStats> {
        let conn = self.conn.lock().await;

        let total_episodes = count(&conn, "SELECT COUNT(*) FROM episodes").await?;
        let pending_jobs = count(&conn, "SELECT COUNT(*) FROM embedding_jobs WHERE state = 'pending'").await?;
        let processing_jobs = count(&conn, "SELECT COUNT(*) FROM embedding_jobs WHERE state = 'processing'").await?;
        let done_jobs = count(&conn, "SELECT COUNT(*) FROM embedding_jobs WHERE state = 'done'").await?;
        let dead_jobs = count(&conn, "SELECT COUNT(*) FROM embedding_jobs WHERE state = 'dead'").await?;

        Ok(StorageStats { total_episodes, pending_jobs, processing_jobs, done_jobs, dead_jobs })
    }

    async fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.query("SELECT 1", ()).await.map_err(storage_err)?;
        Ok(())
    }
}

const EPISODE_COLUMNS: &str =
    "episode_id, content, importance, tags, created_at, embedding_state, embedding, embedding_version, metadata";

async fn collect_episodes(rows: &mut libsql::Rows) -> Result<Vec<Episode>> {
    let mut episodes = Vec::new();
    while let Some(r) = rows.next().await.map_err(storage_err)? {
        episodes.push(row::row_to_episode(&r)?);
    }
    Ok(episodes)
}

fn filter_by_tags(episodes: Vec<Episode>, tags: Option<&[String]>) -> Vec<Episode> {
    let Some(tags) = tags else { return episodes };
    if tags.is_empty() {
        return episodes;
    }
    episodes.into_iter().filter(|e| tags.iter().any(|t| e.tags.contains(t))).collect()
}

async fn get_episode_locked(conn: &libsql::Connection, id: Uuid) -> Result<Option<Episode>> {
    let mut rows = conn
        .query(&format!("SELECT {EPISODE_COLUMNS} FROM episodes WHERE episode_id = ?1"), libsql::params![id.to_string()])
        .await
        .map_err(storage_err)?;
    match rows.next().await.map_err(storage_err)? {
        Some(r) => Ok(Some(row::row_to_episode(&r)?)),
        None => Ok(None),
    }
}

async fn insert_temporal_edge(conn: &libsql::Connection, source: Uuid, target: Uuid, relationship: RelationshipLabel) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO temporal_edges (source_episode_id, target_episode_id, relationship) VALUES (?1, ?2, ?3)",
        libsql::params![source.to_string(), target.to_string(), relationship.as_str()],
    )
    .await
    .map_err(storage_err)?;
    Ok(())
}

/// Insert an episode, its pending embedding job, and any temporal edges in
/// one go. Runs inside the caller's `BEGIN IMMEDIATE` transaction so a crash
/// partway through never leaves an episode with no embedding job.
async fn insert_episode_with_job_in_transaction(
    conn: &libsql::Connection,
    episode: &Episode,
    row: &row::EpisodeRow,
    priority: i64,
) -> Result<EmbeddingJob> {
    conn.execute(
        "INSERT INTO episodes (episode_id, content, importance, tags, created_at, \
         embedding_state, embedding, embedding_version, metadata) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        libsql::params![
            row.episode_id.clone(),
            row.content.clone(),
            row.importance,
            row.tags.clone(),
            row.created_at.clone(),
            row.embedding_state,
            row.embedding.clone(),
            row.embedding_version.clone(),
            row.metadata.clone(),
        ],
    )
    .await
    .map_err(|e| Error::StorageConflict(e.to_string()))?;

    let job_id = Uuid::new_v4();
    let enqueued_at = Utc::now();
    conn.execute(
        "INSERT INTO embedding_jobs (job_id, episode_id, state, priority, retry_count, \
         last_error, enqueued_at, processed_at, claimed_at) \
         VALUES (?1, ?2, 'pending', ?3, 0, NULL, ?4, NULL, NULL)",
        libsql::params![job_id.to_string(), row.episode_id.clone(), priority, format_timestamp(enqueued_at)],
    )
    .await
    .map_err(|e| Error::StorageConflict(e.to_string()))?;

    for temporal_ref in &episode.metadata.temporal_refs {
        insert_temporal_edge(conn, episode.episode_id, temporal_ref.target_episode_id, temporal_ref.relationship)
            .await?;
    }

    Ok(EmbeddingJob {
        job_id,
        episode_id: episode.episode_id,
        state: JobState::Pending,
        priority,
        retry_count: 0,
        last_error: None,
        enqueued_at,
        processed_at: None,
    })
}

/// Write an episode's embedding columns and mark its job `done`. Runs
/// inside the caller's `BEGIN IMMEDIATE` transaction so the two writes
/// commit or roll back together.
async fn complete_embedding_job_in_transaction(
    conn: &libsql::Connection,
    row: &row::EpisodeRow,
    job_id: Uuid,
    processed_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE episodes SET content = ?2, importance = ?3, tags = ?4, \
         embedding_state = ?5, embedding = ?6, embedding_version = ?7, metadata = ?8 \
         WHERE episode_id = ?1",
        libsql::params![
            row.episode_id.clone(),
            row.content.clone(),
            row.importance,
            row.tags.clone(),
            row.embedding_state,
            row.embedding.clone(),
            row.embedding_version.clone(),
            row.metadata.clone(),
        ],
    )
    .await
    .map_err(|e| Error::StorageConflict(e.to_string()))?;

    let changed = conn
        .execute(
            "UPDATE embedding_jobs SET state = 'done', processed_at = ?2 \
             WHERE job_id = ?1 AND state = 'processing'",
            libsql::params![job_id.to_string(), format_timestamp(processed_at)],
        )
        .await
        .map_err(storage_err)?;
    if changed == 0 {
        return Err(Error::StorageConflict(format!("job {job_id} was not in processing state")));
    }
    Ok(())
}

async fn count(conn: &libsql::Connection, sql: &str) -> Result<u64> {
    let mut rows = conn.query(sql, ()).await.map_err(storage_err)?;
    let Some(r) = rows.next().await.map_err(storage_err)? else { return Ok(0) };
    let n: i64 = r.get(0).map_err(storage_err)?;
    Ok(n.max(0) as u64)
}

/// Claim up to `batch_size` pending jobs, ordered by priority desc then
/// enqueue time asc. Runs inside the caller's `BEGIN IMMEDIATE` transaction:
/// SQLite grants that transaction exclusive write access for its duration,
/// which is this service's equivalent of `SELECT ... FOR UPDATE SKIP LOCKED`
/// — there is only ever one writer, so nothing else can race the claim.
async fn claim_jobs_in_transaction(conn: &libsql::Connection, batch_size: usize, now: &str) -> Result<Vec<EmbeddingJob>> {
    let mut rows = conn
        .query(
            "SELECT job_id, episode_id, priority, retry_count, enqueued_at \
             FROM embedding_jobs WHERE state = 'pending' \
             ORDER BY priority DESC, enqueued_at ASC LIMIT ?1",
            libsql::params![i64::try_from(batch_size).unwrap_or(i64::MAX)],
        )
        .await
        .map_err(storage_err)?;

    let mut claimed = Vec::new();
    while let Some(r) = rows.next().await.map_err(storage_err)? {
        let job_id: String = r.get(0).map_err(storage_err)?;
        let episode_id: String = r.get(1).map_err(storage_err)?;
        let priority: i64 = r.get(2).map_err(storage_err)?;
        let retry_count: i64 = r.get(3).map_err(storage_err)?;
        let enqueued_at: String = r.get(4).map_err(storage_err)?;

        claimed.push(EmbeddingJob {
            job_id: Uuid::parse_str(&job_id).map_err(|e| Error::StorageUnavailable(e.to_string()))?,
            episode_id: Uuid::parse_str(&episode_id).map_err(|e| Error::StorageUnavailable(e.to_string()))?,
            state: JobState::Processing,
            priority,
            retry_count: u32::try_from(retry_count).unwrap_or(0),
            last_error: None,
            enqueued_at: parse_timestamp(&enqueued_at)?,
            processed_at: None,
        });
    }
    drop(rows);

    for job in &claimed {
        conn.execute(
            "UPDATE embedding_jobs SET state = 'processing', claimed_at = ?2 WHERE job_id = ?1",
            libsql::params![job.job_id.to_string(), now],
        )
        .await
        .map_err(storage_err)?;
    }

    Ok(claimed)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use memory_core::{EmbeddingState, Metadata};

    use super::*;
    use crate::LibsqlStorage;

    async fn memory_storage() -> LibsqlStorage {
        let storage = LibsqlStorage::connect(":memory:", "").await.unwrap();
        storage.initialize_schema().await.unwrap();
        storage
    }

    fn sample_episode(content: &str, tags: &[&str]) -> Episode {
        Episode {
            episode_id: Uuid::new_v4(),
            content: content.to_string(),
            importance: 0.5,
            tags: tags.iter().map(|t| (*t).to_string()).collect::<BTreeSet<_>>(),
            created_at: Utc::now(),
            embedding: EmbeddingState::Pending,
            metadata: Metadata::default(),
        }
    }

    #[tokio::test]
    async fn insert_and_fetch_round_trips() {
        let storage = memory_storage().await;
        let episode = sample_episode("hello world", &["greeting"]);
        let job = storage.insert_episode_with_job(&episode, 0).await.unwrap();
        assert_eq!(job.state, JobState::Pending);

        let fetched = storage.get_episode(episode.episode_id).await.unwrap().unwrap();
        assert_eq!(fetched.content, "hello world");
        assert_eq!(fetched.tags, episode.tags);
        assert!(!fetched.embedding.is_ready());
    }

    #[tokio::test]
    async fn claim_transitions_job_and_complete_finishes_it() {
        let storage = memory_storage().await;
        let episode = sample_episode("claim me", &[]);
        storage.insert_episode_with_job(&episode, 5).await.unwrap();

        let batch = storage.claim_jobs(10).await.unwrap();
        assert_eq!(batch.jobs.len(), 1);
        assert_eq!(batch.jobs[0].episode_id, episode.episode_id);

        let empty = storage.claim_jobs(10).await.unwrap();
        assert!(empty.jobs.is_empty(), "a claimed job must not be claimable again");

        storage.complete_embedding_job(&episode, batch.jobs[0].job_id, Utc::now()).await.unwrap();
        let stats = storage.stats().await.unwrap();
        assert_eq!(stats.done_jobs, 1);
        assert_eq!(stats.pending_jobs, 0);
    }

    #[tokio::test]
    async fn fail_job_retries_then_poisons_to_dead() {
        let storage = memory_storage().await;
        let episode = sample_episode("retry me", &[]);
        storage.insert_episode_with_job(&episode, 0).await.unwrap();

        let batch = storage.claim_jobs(10).await.unwrap();
        let job_id = batch.jobs[0].job_id;

        let state = storage.fail_job(job_id, "transient failure", 2).await.unwrap();
        assert_eq!(state, JobState::Pending);

        let batch = storage.claim_jobs(10).await.unwrap();
        let state = storage.fail_job(batch.jobs[0].job_id, "still failing", 2).await.unwrap();
        assert_eq!(state, JobState::Dead);

        let stats = storage.stats().await.unwrap();
        assert_eq!(stats.dead_jobs, 1);
    }

    #[tokio::test]
    async fn search_semantic_ranks_by_cosine_similarity() {
        let storage = memory_storage().await;
        let mut matching = sample_episode("matches", &[]);
        matching.embedding = EmbeddingState::Ready {
            vector: memory_core::Embedding384::new(vec![1.0; memory_core::EMBEDDING_DIM]).unwrap(),
            embedding_version: "test-v1".to_string(),
        };
        storage.insert_episode_with_job(&matching, 0).await.unwrap();

        let mut pending = sample_episode("pending embedding", &[]);
        pending.embedding = EmbeddingState::Pending;
        storage.insert_episode_with_job(&pending, 0).await.unwrap();

        let hits = storage
            .search_semantic(SemanticSearchParams {
                query_vector: vec![1.0; memory_core::EMBEDDING_DIM],
                limit: 10,
                min_similarity: 0.5,
            })
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].episode.episode_id, matching.episode_id);
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn temporal_ref_round_trips_through_related_episodes() {
        let storage = memory_storage().await;
        let source = sample_episode("source", &[]);
        let target = sample_episode("target", &[]);
        storage.insert_episode_with_job(&source, 0).await.unwrap();
        storage.insert_episode_with_job(&target, 0).await.unwrap();

        storage
            .add_temporal_ref(source.episode_id, target.episode_id, RelationshipLabel::After)
            .await
            .unwrap();

        let related = storage.get_related_episodes(source.episode_id, Some(RelationshipLabel::After)).await.unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].episode_id, target.episode_id);

        let unrelated = storage.get_related_episodes(source.episode_id, Some(RelationshipLabel::Before)).await.unwrap();
        assert!(unrelated.is_empty());
    }

    #[tokio::test]
    async fn add_temporal_ref_rejects_unknown_episodes() {
        let storage = memory_storage().await;
        let source = sample_episode("source", &[]);
        storage.insert_episode_with_job(&source, 0).await.unwrap();

        let result = storage.add_temporal_ref(source.episode_id, Uuid::new_v4(), RelationshipLabel::Before).await;
        assert!(result.is_err());
    }
}
