//! Importance & decay model: a pure scoring function over stored fields,
//! plus the analysis and pruning operations built on top of it. The exact
//! weights and half-life are read from [`crate::config::DecayConfig`] rather
//! than frozen as constants — an open design question the original system
//! left as "operational configuration" rather than a fixed rule.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::DecayConfig;
use crate::episode::Episode;
use crate::types::AccessTracking;

/// Tags that exempt an episode from pruning regardless of its decay score.
pub const PROTECTED_TAGS: [&str; 4] = ["milestone", "critical", "protected", "consciousness"];

/// Importance above this value always protects an episode from pruning.
pub const PROTECTED_IMPORTANCE_THRESHOLD: f64 = 0.8;

/// An episode accessed within this many days of now is protected.
pub const PROTECTED_RECENT_ACCESS_DAYS: i64 = 7;

/// Compute the access-recency/frequency component of the decay score.
///
/// `0.0` if never accessed; otherwise a bounded blend of log-scaled access
/// count and how recently the episode was last read.
#[must_use]
pub fn access_factor(tracking: &AccessTracking, now: DateTime<Utc>) -> f64 {
    let Some(last_accessed) = tracking.last_accessed else {
        return 0.0;
    };
    if tracking.access_count == 0 {
        return 0.0;
    }

    let count_component = ((tracking.access_count as f64).ln_1p() / 10.0_f64.ln_1p()).min(1.0);

    let days_since_access = (now - last_accessed).num_seconds().max(0) as f64 / 86_400.0;
    let recency_component = (1.0 - (days_since_access / 30.0)).clamp(0.0, 1.0);

    (0.5 * count_component + 0.5 * recency_component).clamp(0.0, 1.0)
}

/// The importance/recency/access blend weights for [`decay_score`],
/// deliberately read from [`DecayConfig`] rather than frozen, per the open
/// question on decay weights being operational configuration.
#[derive(Debug, Clone, Copy)]
pub struct DecayWeights {
    pub importance: f64,
    pub recency: f64,
    pub access: f64,
}

impl Default for DecayWeights {
    fn default() -> Self {
        Self { importance: 0.5, recency: 0.3, access: 0.2 }
    }
}

impl From<&DecayConfig> for DecayWeights {
    fn from(config: &DecayConfig) -> Self {
        Self {
            importance: config.importance_weight,
            recency: config.recency_weight,
            access: config.access_weight,
        }
    }
}

/// The decay score: `weights.importance*importance + weights.recency*recency
/// + weights.access*access_factor`, clamped to `[0, 1]`. Pure function of
/// `(importance, created_at, access_tracking)` given `now`, the configured
/// half-life and weights — holding the former fixed, it is non-increasing in
/// age.
#[must_use]
pub fn decay_score(
    importance: f64,
    created_at: DateTime<Utc>,
    access_tracking: &AccessTracking,
    half_life_days: f64,
    weights: DecayWeights,
    now: DateTime<Utc>,
) -> f64 {
    let age_days = (now - created_at).num_seconds().max(0) as f64 / 86_400.0;
    let recency = 0.5_f64.powf(age_days / half_life_days);
    let access = access_factor(access_tracking, now);
    (weights.importance * importance + weights.recency * recency + weights.access * access).clamp(0.0, 1.0)
}

/// One band of the decay-score histogram produced by [`analyze_decay`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayBand {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Summary of a decay-score analysis over a population of episodes.
#[derive(Debug, Clone, PartialEq)]
pub struct DecayAnalysis {
    pub bands: [DecayBand; 5],
    pub very_low_count: usize,
    pub very_high_count: usize,
    pub episodes_considered: usize,
}

/// Bucket `episodes` (already filtered to `age_days >= min_age_days` by the
/// caller) into five decay-score bands.
#[must_use]
pub fn analyze_decay(
    episodes: &[Episode],
    half_life_days: f64,
    weights: DecayWeights,
    now: DateTime<Utc>,
) -> DecayAnalysis {
    let mut bands = [
        DecayBand { lower: 0.0, upper: 0.2, count: 0 },
        DecayBand { lower: 0.2, upper: 0.4, count: 0 },
        DecayBand { lower: 0.4, upper: 0.6, count: 0 },
        DecayBand { lower: 0.6, upper: 0.8, count: 0 },
        DecayBand { lower: 0.8, upper: 1.0, count: 0 },
    ];
    let mut very_low = 0;
    let mut very_high = 0;

    for episode in episodes {
        let score = decay_score(
            episode.importance,
            episode.created_at,
            &episode.metadata.access_tracking,
            half_life_days,
            weights,
            now,
        );
        let band_idx = ((score * 5.0).floor() as usize).min(4);
        bands[band_idx].count += 1;
        if score < 0.2 {
            very_low += 1;
        }
        if score > 0.7 {
            very_high += 1;
        }
    }

    DecayAnalysis {
        bands,
        very_low_count: very_low,
        very_high_count: very_high,
        episodes_considered: episodes.len(),
    }
}

/// Whether an episode is exempt from pruning regardless of its decay score.
#[must_use]
pub fn is_protected(episode: &Episode, min_age_days: i64, now: DateTime<Utc>) -> bool {
    if episode.importance > PROTECTED_IMPORTANCE_THRESHOLD {
        return true;
    }
    if episode
        .tags
        .iter()
        .any(|t| PROTECTED_TAGS.contains(&t.as_str()))
    {
        return true;
    }
    let age_days = (now - episode.created_at).num_days();
    if age_days < min_age_days {
        return true;
    }
    if let Some(last_accessed) = episode.metadata.access_tracking.last_accessed {
        if (now - last_accessed).num_days() < PROTECTED_RECENT_ACCESS_DAYS {
            return true;
        }
    }
    false
}

/// A pruning candidate, annotated with its decay score and protection
/// status.
#[derive(Debug, Clone, PartialEq)]
pub struct PruneCandidate {
    pub episode_id: Uuid,
    pub decay_score: f64,
    pub is_protected: bool,
}

/// Rank `episodes` by ascending decay score and annotate protection,
/// returning at most `max_prune_count` candidates.
#[must_use]
pub fn preview_pruning(
    episodes: &[Episode],
    min_age_days: i64,
    half_life_days: f64,
    weights: DecayWeights,
    max_prune_count: usize,
    now: DateTime<Utc>,
) -> Vec<PruneCandidate> {
    let mut candidates: Vec<PruneCandidate> = episodes
        .iter()
        .map(|e| PruneCandidate {
            episode_id: e.episode_id,
            decay_score: decay_score(
                e.importance,
                e.created_at,
                &e.metadata.access_tracking,
                half_life_days,
                weights,
                now,
            ),
            is_protected: is_protected(e, min_age_days, now),
        })
        .collect();

    candidates.sort_by(|a, b| a.decay_score.total_cmp(&b.decay_score));
    candidates.truncate(max_prune_count);
    candidates
}

/// Result of an `execute_pruning` call.
#[derive(Debug, Clone, PartialEq)]
pub enum PruneOutcome {
    /// `dry_run = true`: count of non-protected candidates that would be
    /// pruned. No writes occur.
    DryRun { would_prune_count: usize },
}

/// Execute (or simulate) pruning. The live contract only supports
/// `dry_run = true` — real deletion is reserved for a future archive-table
/// design and fails with [`crate::error::Error::NotImplemented`] here.
///
/// # Errors
/// Returns [`crate::error::Error::NotImplemented`] when `dry_run` is false.
pub fn execute_pruning(
    episodes: &[Episode],
    min_score_threshold: f64,
    min_age_days: i64,
    max_prune_count: usize,
    half_life_days: f64,
    weights: DecayWeights,
    dry_run: bool,
    now: DateTime<Utc>,
) -> crate::error::Result<PruneOutcome> {
    if !dry_run {
        return Err(crate::error::Error::NotImplemented(
            "live pruning deletion is reserved for a future archive-table design".to_string(),
        ));
    }

    let candidates = preview_pruning(episodes, min_age_days, half_life_days, weights, max_prune_count, now);
    let would_prune_count = candidates
        .iter()
        .filter(|c| !c.is_protected && c.decay_score <= min_score_threshold)
        .count();

    Ok(PruneOutcome::DryRun { would_prune_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use crate::types::{EmbeddingState, Metadata};
    use proptest::prelude::*;

    fn episode_at_age(age_days: i64, importance: f64, now: DateTime<Utc>) -> Episode {
        Episode {
            episode_id: Uuid::new_v4(),
            content: "x".to_string(),
            importance,
            tags: BTreeSet::new(),
            created_at: now - chrono::Duration::days(age_days),
            embedding: EmbeddingState::Pending,
            metadata: Metadata::default(),
        }
    }

    #[test]
    fn decay_score_is_non_increasing_in_age() {
        let now = Utc::now();
        let tracking = AccessTracking::default();
        let weights = DecayWeights::default();
        let young = decay_score(0.5, now - chrono::Duration::days(1), &tracking, 30.0, weights, now);
        let old = decay_score(0.5, now - chrono::Duration::days(60), &tracking, 30.0, weights, now);
        assert!(young >= old);
    }

    #[test]
    fn decay_score_always_in_unit_range() {
        let now = Utc::now();
        let tracking = AccessTracking { last_accessed: Some(now), access_count: 1000 };
        let weights = DecayWeights::default();
        let score = decay_score(1.0, now - chrono::Duration::days(400), &tracking, 30.0, weights, now);
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn custom_weights_change_the_blend() {
        let now = Utc::now();
        let tracking = AccessTracking::default();
        let all_importance = DecayWeights { importance: 1.0, recency: 0.0, access: 0.0 };
        let score = decay_score(0.4, now - chrono::Duration::days(400), &tracking, 30.0, all_importance, now);
        assert!((score - 0.4).abs() < 1e-9, "weighting entirely on importance should ignore age");
    }

    #[test]
    fn high_importance_protects_from_pruning() {
        let now = Utc::now();
        let episode = episode_at_age(100, 0.9, now);
        assert!(is_protected(&episode, 30, now));
    }

    #[test]
    fn young_episode_protected_regardless_of_importance() {
        let now = Utc::now();
        let episode = episode_at_age(1, 0.1, now);
        assert!(is_protected(&episode, 30, now));
    }

    #[test]
    fn dry_run_never_writes_and_live_run_is_not_implemented() {
        let now = Utc::now();
        let episodes = vec![episode_at_age(100, 0.05, now)];
        let weights = DecayWeights::default();
        let dry = execute_pruning(&episodes, 0.5, 30, 10, 30.0, weights, true, now).unwrap();
        assert!(matches!(dry, PruneOutcome::DryRun { .. }));
        let live = execute_pruning(&episodes, 0.5, 30, 10, 30.0, weights, false, now);
        assert!(matches!(live, Err(crate::error::Error::NotImplemented(_))));
    }

    proptest! {
        #[test]
        fn decay_score_is_monotone_non_increasing_in_age(
            importance in 0.0_f64..=1.0,
            younger_age in 0_i64..200,
            extra_age in 0_i64..500,
            half_life in 1.0_f64..120.0,
        ) {
            let now = Utc::now();
            let tracking = AccessTracking::default();
            let weights = DecayWeights::default();
            let older_age = younger_age + extra_age;

            let younger_score = decay_score(
                importance,
                now - chrono::Duration::days(younger_age),
                &tracking,
                half_life,
                weights,
                now,
            );
            let older_score = decay_score(
                importance,
                now - chrono::Duration::days(older_age),
                &tracking,
                half_life,
                weights,
                now,
            );
            prop_assert!(younger_score >= older_score - 1e-9);
            prop_assert!((0.0..=1.0).contains(&younger_score));
            prop_assert!((0.0..=1.0).contains(&older_score));
        }
    }
}
