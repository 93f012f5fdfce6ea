//! Read-through cache in front of [`super::RetrievalEngine::recent`].
//!
//! Adapted from the teacher's query cache: LRU eviction plus a TTL per
//! entry, simplified to the single key shape this service's one cached
//! operation needs (`limit`). Cache failures never propagate — every public
//! method here is infallible, matching the "cache unavailability degrades
//! gracefully" contract.

use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::episode::Episode;

struct CachedResult {
    episodes: Vec<Episode>,
    cached_at: Instant,
}

/// Cache hit/miss counters, exposed on `/metrics`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

/// LRU + TTL cache over `recent(limit)` results.
pub struct RecentEpisodesCache {
    entries: RwLock<LruCache<usize, CachedResult>>,
    ttl: Duration,
    metrics: RwLock<CacheMetrics>,
}

impl RecentEpisodesCache {
    #[must_use]
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap();
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            ttl,
            metrics: RwLock::new(CacheMetrics::default()),
        }
    }

    /// Look up `limit` in the cache, returning a clone of the cached
    /// episodes if present and not expired.
    #[must_use]
    pub fn get(&self, limit: usize) -> Option<Vec<Episode>> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let mut metrics = self.metrics.write().unwrap_or_else(|e| e.into_inner());

        match entries.get(&limit) {
            Some(cached) if cached.cached_at.elapsed() < self.ttl => {
                metrics.hits += 1;
                Some(cached.episodes.clone())
            }
            Some(_) => {
                entries.pop(&limit);
                metrics.misses += 1;
                None
            }
            None => {
                metrics.misses += 1;
                None
            }
        }
    }

    /// Populate the cache for `limit`.
    pub fn put(&self, limit: usize, episodes: Vec<Episode>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.put(
            limit,
            CachedResult {
                episodes,
                cached_at: Instant::now(),
            },
        );
    }

    /// Drop every cached entry; called on any episode-table mutation
    /// (ingest, consolidation writes).
    pub fn invalidate_all(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let count = entries.len();
        entries.clear();
        let mut metrics = self.metrics.write().unwrap_or_else(|e| e.into_inner());
        metrics.invalidations += count as u64;
    }

    #[must_use]
    pub fn metrics(&self) -> CacheMetrics {
        *self.metrics.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use chrono::Utc;
    use crate::types::{EmbeddingState, Metadata};

    fn sample_episode() -> Episode {
        Episode {
            episode_id: uuid::Uuid::new_v4(),
            content: "x".to_string(),
            importance: 0.5,
            tags: BTreeSet::new(),
            created_at: Utc::now(),
            embedding: EmbeddingState::Pending,
            metadata: Metadata::default(),
        }
    }

    #[test]
    fn miss_then_hit() {
        let cache = RecentEpisodesCache::new(10, Duration::from_secs(60));
        assert!(cache.get(5).is_none());
        cache.put(5, vec![sample_episode()]);
        assert_eq!(cache.get(5).unwrap().len(), 1);
        assert_eq!(cache.metrics().hits, 1);
        assert_eq!(cache.metrics().misses, 1);
    }

    #[test]
    fn invalidate_all_clears_every_key() {
        let cache = RecentEpisodesCache::new(10, Duration::from_secs(60));
        cache.put(5, vec![sample_episode()]);
        cache.put(10, vec![sample_episode()]);
        cache.invalidate_all();
        assert!(cache.get(5).is_none());
        assert!(cache.get(10).is_none());
    }

    #[test]
    fn expired_entry_is_treated_as_miss() {
        let cache = RecentEpisodesCache::new(10, Duration::from_millis(1));
        cache.put(5, vec![sample_episode()]);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(5).is_none());
    }
}
