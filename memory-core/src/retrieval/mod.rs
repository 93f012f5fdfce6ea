//! Retrieval engine: the five read operations (semantic, recent, temporal
//! window, temporally-related, fact lookup) plus the hybrid query that picks
//! between fact and narrative answers.

pub mod cache;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::encoder::TextEncoder;
use crate::episode::Episode;
use crate::error::{Error, Result};
use crate::storage::{SemanticSearchParams, StorageBackend, WindowOrder};
use crate::types::RelationshipLabel;
use cache::RecentEpisodesCache;

/// A semantic search hit, matching the shape the spec requires on the wire.
#[derive(Debug, Clone)]
pub struct SemanticResult {
    pub episode_id: Uuid,
    pub content: String,
    pub similarity: f32,
    pub importance: f64,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// The outcome of a fact lookup.
#[derive(Debug, Clone)]
pub struct FactResult {
    pub value: serde_json::Value,
    pub source_episode_id: Uuid,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

/// `prefer` parameter to [`RetrievalEngine::hybrid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HybridPreference {
    Fact,
    Narrative,
    Auto,
}

/// Result of a hybrid query.
#[derive(Debug, Clone)]
pub enum HybridAnswer {
    Fact {
        value: serde_json::Value,
        episode_id: Uuid,
        confidence: f64,
    },
    Narrative {
        content: String,
        episode_id: Uuid,
        confidence: f32,
    },
}

/// Bundles storage, the shared text encoder, and the recent-episodes cache
/// behind the five retrieval operations.
pub struct RetrievalEngine {
    storage: Arc<dyn StorageBackend>,
    encoder: Arc<dyn TextEncoder>,
    cache: RecentEpisodesCache,
}

impl RetrievalEngine {
    #[must_use]
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        encoder: Arc<dyn TextEncoder>,
        cache_max_entries: usize,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            storage,
            encoder,
            cache: RecentEpisodesCache::new(cache_max_entries, cache_ttl),
        }
    }

    /// Invalidate the recent-episodes cache. Called by ingestion and
    /// consolidation after any episode-table mutation.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
    }

    /// **D1. Semantic search.** Encodes `query_text`, selects the top
    /// `limit` episodes at or above `min_similarity`, and records access
    /// telemetry for every result (best-effort).
    ///
    /// # Errors
    /// Returns [`Error::Validation`] if `limit` or `min_similarity` are out
    /// of range, or a storage/encoder error otherwise.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query_text: &str,
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<SemanticResult>> {
        if !(1..=100).contains(&limit) {
            return Err(Error::Validation("limit must be in [1, 100]".to_string()));
        }
        if !(0.0..=1.0).contains(&min_similarity) {
            return Err(Error::Validation("min_similarity must be in [0, 1]".to_string()));
        }

        let query_vector = self.encoder.encode(query_text).await?.into_vec();
        let hits = self
            .storage
            .search_semantic(SemanticSearchParams {
                query_vector,
                limit,
                min_similarity,
            })
            .await?;

        let now = Utc::now();
        for hit in &hits {
            self.record_access_best_effort(hit.episode.episode_id, now).await;
        }

        Ok(hits
            .into_iter()
            .map(|hit| SemanticResult {
                episode_id: hit.episode.episode_id,
                content: hit.episode.content,
                similarity: hit.similarity,
                importance: hit.episode.importance,
                tags: hit.episode.tags.into_iter().collect(),
                created_at: hit.episode.created_at,
            })
            .collect())
    }

    /// **D2. Recent episodes.** Read-through cached by `limit`.
    ///
    /// # Errors
    /// Returns a storage error on a cache miss that also fails to read
    /// through.
    #[instrument(skip(self))]
    pub async fn recent(&self, limit: usize) -> Result<Vec<Episode>> {
        if let Some(cached) = self.cache.get(limit) {
            return Ok(cached);
        }
        let episodes = self.storage.recent_episodes(limit).await?;
        self.cache.put(limit, episodes.clone());
        Ok(episodes)
    }

    /// **D3. Temporal window — before.** Newest-first; does not record
    /// access telemetry.
    ///
    /// # Errors
    /// Returns a storage error on failure.
    pub async fn before(
        &self,
        t: DateTime<Utc>,
        limit: usize,
        tags: Option<&[String]>,
    ) -> Result<Vec<Episode>> {
        self.storage
            .episodes_in_window(None, Some(t), tags, limit, WindowOrder::NewestFirst)
            .await
    }

    /// **D3. Temporal window — after.** Oldest-first; records access
    /// telemetry for each result.
    ///
    /// # Errors
    /// Returns a storage error on failure.
    pub async fn after(
        &self,
        t: DateTime<Utc>,
        limit: usize,
        tags: Option<&[String]>,
    ) -> Result<Vec<Episode>> {
        let episodes = self
            .storage
            .episodes_in_window(Some(t), None, tags, limit, WindowOrder::OldestFirst)
            .await?;
        self.record_access_for_all(&episodes).await;
        Ok(episodes)
    }

    /// **D3. Temporal window — range.** Oldest-first; records access
    /// telemetry for each result.
    ///
    /// # Errors
    /// Returns a storage error on failure.
    pub async fn range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
        tags: Option<&[String]>,
    ) -> Result<Vec<Episode>> {
        let episodes = self
            .storage
            .episodes_in_window(Some(start), Some(end), tags, limit, WindowOrder::OldestFirst)
            .await?;
        self.record_access_for_all(&episodes).await;
        Ok(episodes)
    }

    /// **D4. Temporally related.** Follows `temporal_refs` from the source
    /// episode, optionally filtered by relationship, newest-first.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if `episode_id` does not exist.
    pub async fn related(
        &self,
        episode_id: Uuid,
        relationship: Option<RelationshipLabel>,
    ) -> Result<Vec<Episode>> {
        let mut episodes = self
            .storage
            .get_related_episodes(episode_id, relationship)
            .await?;
        episodes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(episodes)
    }

    /// **D5. Fact lookup.** Selects the first (per `order`) episode carrying
    /// a non-null `fact_type`, returning its value alongside provenance.
    ///
    /// # Errors
    /// Returns [`Error::FactNotFound`] if no episode matches.
    #[instrument(skip(self))]
    pub async fn facts(
        &self,
        fact_type: &str,
        filter_tags: Option<&[String]>,
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
        limit: usize,
        order: WindowOrder,
    ) -> Result<FactResult> {
        let episodes = self
            .storage
            .episodes_with_fact(fact_type, filter_tags, after, before, limit, order)
            .await?;

        let Some(episode) = episodes.into_iter().next() else {
            return Err(Error::FactNotFound(fact_type.to_string()));
        };

        let facts = episode
            .metadata
            .facts
            .as_ref()
            .ok_or_else(|| Error::FactNotFound(fact_type.to_string()))?;
        let value = facts
            .get(fact_type)
            .ok_or_else(|| Error::FactNotFound(fact_type.to_string()))?;

        Ok(FactResult {
            value,
            source_episode_id: episode.episode_id,
            confidence: facts.extraction_confidence.unwrap_or(0.0),
            timestamp: episode.created_at,
        })
    }

    /// **D6. Hybrid query.** Classifies `query` for a canonical scalar
    /// fact_type when `prefer` is `fact` or `auto`; falls through to
    /// semantic search on any fact miss so no `404` ever leaks from this
    /// endpoint.
    ///
    /// # Errors
    /// Returns a storage/encoder error if both the fact and narrative paths
    /// fail.
    #[instrument(skip(self))]
    pub async fn hybrid(
        &self,
        query: &str,
        prefer: HybridPreference,
        tags: Option<&[String]>,
        limit: usize,
    ) -> Result<HybridAnswer> {
        let classified_fact_type = classify_fact_type(query);

        let try_fact = matches!(prefer, HybridPreference::Fact)
            || (matches!(prefer, HybridPreference::Auto) && classified_fact_type.is_some());

        if try_fact {
            if let Some(fact_type) = classified_fact_type.or_else(|| {
                if matches!(prefer, HybridPreference::Fact) {
                    Some(query.to_string())
                } else {
                    None
                }
            }) {
                match self
                    .facts(&fact_type, tags, None, None, 1, WindowOrder::NewestFirst)
                    .await
                {
                    Ok(result) => {
                        return Ok(HybridAnswer::Fact {
                            value: result.value,
                            episode_id: result.source_episode_id,
                            confidence: result.confidence,
                        });
                    }
                    Err(Error::FactNotFound(_)) => {
                        // fall through to narrative, no 404 leaks per the
                        // hybrid fallback contract
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let hits = self.search(query, limit, 0.0).await?;
        let Some(top) = hits.into_iter().next() else {
            return Err(Error::FactNotFound(query.to_string()));
        };

        Ok(HybridAnswer::Narrative {
            content: top.content,
            episode_id: top.episode_id,
            confidence: top.similarity,
        })
    }

    async fn record_access_best_effort(&self, episode_id: Uuid, at: DateTime<Utc>) {
        if let Err(e) = self.storage.update_access_tracking(episode_id, at).await {
            warn!(episode_id = %episode_id, error = %e, "access tracking update failed, ignoring");
        }
    }

    async fn record_access_for_all(&self, episodes: &[Episode]) {
        let now = Utc::now();
        for episode in episodes {
            self.record_access_best_effort(episode.episode_id, now).await;
        }
    }
}

/// Keyword classifier inferring a canonical scalar fact_type from free text,
/// used by the hybrid query's `auto` preference.
#[must_use]
pub fn classify_fact_type(query: &str) -> Option<String> {
    let lower = query.to_lowercase();
    let pairs: &[(&str, &str)] = &[
        ("version", "nexus_version"),
        ("accuracy", "accuracy_percent"),
        ("latency", "latency_ms"),
        ("count", "episode_count"),
        ("status", "status"),
    ];
    pairs
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, fact_type)| (*fact_type).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_canonical_scalar_keywords() {
        assert_eq!(classify_fact_type("what is NEXUS version?"), Some("nexus_version".to_string()));
        assert_eq!(classify_fact_type("tell me the accuracy"), Some("accuracy_percent".to_string()));
        assert_eq!(classify_fact_type("how are you today"), None);
    }
}
