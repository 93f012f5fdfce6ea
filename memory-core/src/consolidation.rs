//! Consolidation engine: the sleep-inspired nightly batch that scores
//! "breakthrough" episodes, traces their precursor chains, boosts the
//! contributing episodes' importance, samples older high-value episodes for
//! interleaved replay, and persists directed Narrative Traces.
//!
//! Every scoring step is a pure function over an in-memory slice of
//! episodes; [`run_consolidation`] is the storage-facing entry point that
//! fetches a day's episodes, runs those steps, and persists the result.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::episode::Episode;
use crate::error::Result;
use crate::narrative::{NarrativeTrace, TraceType};
use crate::storage::StorageBackend;

/// How far back, in hours, chain tracing is allowed to extend from each
/// newly accepted chain member.
pub const CHAIN_WINDOW_HOURS: i64 = 12;

/// Cosine-similarity floor for "related by embedding" in chain tracing.
pub const CHAIN_SIMILARITY_THRESHOLD: f32 = 0.65;

/// Minimum shared tags for "related by tags" in chain tracing.
pub const CHAIN_SHARED_TAGS_THRESHOLD: usize = 2;

/// Window, in hours, for "related by recency to an already-included member".
pub const CHAIN_RECENCY_HOURS: i64 = 1;

/// Minimum chain length to keep a traced chain.
pub const MIN_CHAIN_LENGTH: usize = 2;

/// Breakthroughs are episodes at or above this percentile of the day's
/// breakthrough-score distribution.
pub const BREAKTHROUGH_PERCENTILE: f64 = 0.80;

/// Replay sampling ratio applied to the number of chains formed.
pub const REPLAY_SAMPLE_RATIO: f64 = 0.3 / 0.7;

/// Minimum consolidated salience for interleaved-replay eligibility.
pub const REPLAY_MIN_SALIENCE: f64 = 0.70;

/// Age window, in days, for interleaved-replay eligibility.
pub const REPLAY_AGE_DAYS: std::ops::RangeInclusive<i64> = 7..=90;

/// Compute the breakthrough score for a single episode:
/// `0.40*salience + 0.25*mean(joy,trust,anticipation,surprise) + 0.15*max(0,valence) + 0.20*importance`.
#[must_use]
pub fn breakthrough_score(episode: &Episode) -> f64 {
    let salience = episode.metadata.salience_score.unwrap_or(0.0);
    let emotional = episode.metadata.emotional_8d.unwrap_or_default();
    let mean_affect = emotional.mean_joy_trust_anticipation_surprise();
    let valence_component = emotional.valence().max(0.0);
    0.40 * salience + 0.25 * mean_affect + 0.15 * valence_component + 0.20 * episode.importance
}

/// Linear-interpolation percentile over a slice of scores (not mutated).
fn percentile(scores: &[f64], p: f64) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let mut sorted = scores.to_vec();
    sorted.sort_by(f64::total_cmp);
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// A traced precursor chain: members in chronological order, ending at the
/// breakthrough episode itself.
#[derive(Debug, Clone)]
pub struct Chain {
    pub narrative_id: Uuid,
    /// `(episode_id, created_at)` earliest-first; the last entry is the
    /// breakthrough.
    pub members: Vec<(Uuid, DateTime<Utc>)>,
}

fn shares_session(a: &Episode, b: &Episode) -> bool {
    match (&a.metadata.session_id, &b.metadata.session_id) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn shares_enough_tags(a: &Episode, b: &Episode) -> bool {
    a.tags.intersection(&b.tags).count() >= CHAIN_SHARED_TAGS_THRESHOLD
}

fn embedding_related(a: &Episode, b: &Episode) -> bool {
    match (a.embedding.vector(), b.embedding.vector()) {
        (Some(va), Some(vb)) => va.cosine_similarity(vb) > CHAIN_SIMILARITY_THRESHOLD,
        _ => false,
    }
}

fn within_recency(member_time: DateTime<Utc>, candidate_time: DateTime<Utc>) -> bool {
    (member_time - candidate_time).num_hours().abs() <= CHAIN_RECENCY_HOURS
}

/// Trace the backward precursor chain for a single breakthrough episode.
/// `population` is the candidate pool (typically the day's episodes);
/// scanned most-recent-first, with the acceptance window re-anchored to the
/// most recently accepted member's timestamp each time a candidate is
/// accepted.
#[must_use]
pub fn trace_chain(breakthrough: &Episode, population: &[Episode]) -> Option<Chain> {
    let mut accepted: Vec<&Episode> = vec![breakthrough];
    let mut horizon = breakthrough.created_at;

    let mut candidates: Vec<&Episode> = population
        .iter()
        .filter(|e| e.episode_id != breakthrough.episode_id)
        .collect();
    candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    for candidate in candidates {
        if candidate.created_at >= horizon {
            continue;
        }
        let window_start = horizon - chrono::Duration::hours(CHAIN_WINDOW_HOURS);
        if candidate.created_at < window_start {
            continue;
        }

        let related = accepted.iter().any(|member| {
            shares_session(member, candidate)
                || embedding_related(member, candidate)
                || shares_enough_tags(member, candidate)
                || within_recency(member.created_at, candidate.created_at)
        });

        if related {
            horizon = candidate.created_at;
            accepted.push(candidate);
        }
    }

    if accepted.len() < MIN_CHAIN_LENGTH {
        return None;
    }

    accepted.reverse();
    let members = accepted
        .into_iter()
        .map(|e| (e.episode_id, e.created_at))
        .collect();

    Some(Chain {
        narrative_id: Uuid::new_v4(),
        members,
    })
}

/// The boost and updated consolidated-salience applied to one chain member.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SalienceBoost {
    pub episode_id: Uuid,
    pub boost: f64,
    pub consolidated_salience: f64,
    pub new_importance: f64,
}

/// Compute consolidated-salience boosts for every member of a chain, given
/// the breakthrough score of the chain's terminal episode and each member's
/// current `(salience_score, importance)`.
#[must_use]
pub fn compute_chain_boosts(
    chain: &Chain,
    breakthrough_score_value: f64,
    episode_fields: impl Fn(Uuid) -> (f64, f64),
) -> Vec<SalienceBoost> {
    let len = chain.members.len();
    let breakthrough_time = chain.members.last().map(|(_, t)| *t).unwrap_or_else(Utc::now);

    chain
        .members
        .iter()
        .enumerate()
        .map(|(i, (episode_id, created_at))| {
            let (salience, importance) = episode_fields(*episode_id);
            let delta_hours = (breakthrough_time - *created_at).num_seconds() as f64 / 3600.0;
            let position_factor = 1.0 - (i as f64 / len as f64);
            let boost = (breakthrough_score_value * position_factor * (-delta_hours / 6.0).exp() * 0.25)
                .min(0.20)
                .max(0.0);
            let consolidated_salience = (salience + boost).min(1.0);
            let new_importance = (importance * (1.0 + boost)).clamp(0.0, 1.0);

            SalienceBoost {
                episode_id: *episode_id,
                boost,
                consolidated_salience,
                new_importance,
            }
        })
        .collect()
}

/// Emit Narrative Traces between consecutive chain members.
#[must_use]
pub fn build_traces(chain: &Chain, now: DateTime<Utc>) -> Vec<NarrativeTrace> {
    let last_idx = chain.members.len().saturating_sub(2);
    chain
        .members
        .windows(2)
        .enumerate()
        .map(|(i, pair)| {
            let (source_id, source_time) = pair[0];
            let (target_id, target_time) = pair[1];
            let delta_hours = (target_time - source_time).num_seconds() as f64 / 3600.0;
            let trace_type = if i == 0 {
                TraceType::Initiator
            } else if i == last_idx {
                TraceType::Conclusion
            } else {
                TraceType::Progression
            };
            NarrativeTrace {
                trace_id: Uuid::new_v4(),
                source_episode_id: source_id,
                target_episode_id: target_id,
                trace_type,
                strength: 1.0 / (1.0 + delta_hours / 3.0),
                narrative_id: chain.narrative_id,
                created_at: now,
            }
        })
        .collect()
}

/// Sample episodes eligible for interleaved replay: consolidated salience
/// `>= 0.70` and age in `[7, 90]` days, uniformly at random, roughly
/// `0.3/0.7 * chain_count` of them.
pub fn sample_replay_candidates<'a, R: Rng>(
    pool: &'a [Episode],
    chain_count: usize,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<&'a Episode> {
    let eligible: Vec<&Episode> = pool
        .iter()
        .filter(|e| {
            let age_days = (now - e.created_at).num_days();
            let salience = e
                .metadata
                .consolidation
                .consolidated_salience_score
                .unwrap_or(0.0);
            salience >= REPLAY_MIN_SALIENCE && REPLAY_AGE_DAYS.contains(&age_days)
        })
        .collect();

    let sample_size = ((chain_count as f64 * REPLAY_SAMPLE_RATIO).round() as usize).min(eligible.len());
    let mut shuffled = eligible;
    shuffled.shuffle(rng);
    shuffled.truncate(sample_size);
    shuffled
}

/// One entry in [`ConsolidationReport::top_breakthroughs`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakthroughSummary {
    pub episode_id: Uuid,
    pub content_prefix: String,
    pub score: f64,
}

/// Summary statistics produced by one consolidation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidationReport {
    pub target_date: chrono::NaiveDate,
    pub episodes_processed: usize,
    pub breakthroughs_found: usize,
    pub chains_formed: usize,
    pub traces_created: usize,
    pub replay_sampled_count: usize,
    pub avg_boost: f64,
    pub max_boost: f64,
    pub duration: Duration,
    pub top_breakthroughs: Vec<BreakthroughSummary>,
}

/// Length, in characters, of the content prefix carried on each
/// top-breakthrough summary entry.
pub const BREAKTHROUGH_CONTENT_PREFIX_CHARS: usize = 120;

#[must_use]
pub fn summarize_breakthroughs(
    breakthroughs: &[(&Episode, f64)],
    limit: usize,
) -> Vec<BreakthroughSummary> {
    let mut ranked: Vec<&(&Episode, f64)> = breakthroughs.iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
        .into_iter()
        .take(limit)
        .map(|(episode, score)| BreakthroughSummary {
            episode_id: episode.episode_id,
            content_prefix: crate::episode::truncate_chars(
                &episode.content,
                BREAKTHROUGH_CONTENT_PREFIX_CHARS,
            )
            .to_string(),
            score: *score,
        })
        .collect()
}

/// Classify which of `episodes` are breakthroughs (score at or above the
/// configured percentile of the population's own breakthrough scores).
#[must_use]
pub fn classify_breakthroughs(episodes: &[Episode]) -> Vec<(&Episode, f64)> {
    let scores: Vec<f64> = episodes.iter().map(breakthrough_score).collect();
    let threshold = percentile(&scores, BREAKTHROUGH_PERCENTILE);
    episodes
        .iter()
        .zip(scores)
        .filter(|(_, score)| *score >= threshold)
        .map(|(e, s)| (e, s))
        .collect()
}

/// Run one consolidation pass over `target_date`'s episodes: classify
/// breakthroughs, trace each one's precursor chain, boost and persist the
/// chain members, write Narrative Traces, and sample interleaved-replay
/// candidates from the wider population. Fetches and writes through
/// `storage`; every scoring/tracing step above is the pure logic this calls.
///
/// # Errors
/// Returns a storage error if fetching the day's episodes, the replay
/// sampling population, or any write fails.
#[instrument(skip(storage), fields(%target_date))]
pub async fn run_consolidation(
    storage: &Arc<dyn StorageBackend>,
    target_date: chrono::NaiveDate,
    now: DateTime<Utc>,
) -> Result<ConsolidationReport> {
    let started = Instant::now();
    let episodes = storage.episodes_on_date(target_date).await?;
    let breakthroughs = classify_breakthroughs(&episodes);

    let mut chains_formed = 0;
    let mut traces_created = 0;
    let mut boosts: Vec<f64> = Vec::new();

    for (breakthrough, score) in &breakthroughs {
        let Some(chain) = trace_chain(breakthrough, &episodes) else {
            continue;
        };
        chains_formed += 1;

        let episode_lookup: std::collections::HashMap<Uuid, &Episode> =
            episodes.iter().map(|e| (e.episode_id, e)).collect();
        let chain_boosts = compute_chain_boosts(&chain, *score, |id| {
            episode_lookup
                .get(&id)
                .map(|e| (e.metadata.salience_score.unwrap_or(0.0), e.importance))
                .unwrap_or((0.0, 0.0))
        });

        for applied in &chain_boosts {
            if let Some(mut episode) = storage.get_episode(applied.episode_id).await? {
                episode.importance = applied.new_importance;
                episode.metadata.consolidation.consolidated_salience_score = Some(applied.consolidated_salience);
                episode.metadata.consolidation.last_consolidated_at = Some(now);
                storage.update_episode(&episode).await?;
            }
            boosts.push(applied.boost);
        }

        let traces = build_traces(&chain, now);
        traces_created += traces.len();
        storage.insert_traces(&traces).await?;
    }

    let replay_window_start = now - chrono::Duration::days(*REPLAY_AGE_DAYS.end());
    let replay_population = storage.episodes_created_between(replay_window_start, now).await?;
    let mut rng = rand::thread_rng();
    let replay_sampled_count = sample_replay_candidates(&replay_population, chains_formed, now, &mut rng).len();

    let avg_boost = if boosts.is_empty() { 0.0 } else { boosts.iter().sum::<f64>() / boosts.len() as f64 };
    let max_boost = boosts.iter().cloned().fold(0.0_f64, f64::max);

    let report = ConsolidationReport {
        target_date,
        episodes_processed: episodes.len(),
        breakthroughs_found: breakthroughs.len(),
        chains_formed,
        traces_created,
        replay_sampled_count,
        avg_boost,
        max_boost,
        duration: started.elapsed(),
        top_breakthroughs: summarize_breakthroughs(&breakthroughs, 10),
    };

    info!(
        episodes_processed = report.episodes_processed,
        breakthroughs_found = report.breakthroughs_found,
        chains_formed = report.chains_formed,
        "consolidation run complete"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use crate::types::{EmbeddingState, Emotional8d, Metadata};

    fn episode(
        hours_before_now: i64,
        importance: f64,
        salience: f64,
        session_id: Option<&str>,
        tags: &[&str],
        now: DateTime<Utc>,
    ) -> Episode {
        Episode {
            episode_id: Uuid::new_v4(),
            content: "episode content that is reasonably long for prefixing".to_string(),
            importance,
            tags: tags.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
            created_at: now - chrono::Duration::hours(hours_before_now),
            embedding: EmbeddingState::Pending,
            metadata: Metadata {
                salience_score: Some(salience),
                session_id: session_id.map(str::to_string),
                ..Metadata::default()
            },
        }
    }

    #[test]
    fn breakthrough_score_weighs_all_four_components() {
        let now = Utc::now();
        let mut e = episode(0, 0.8, 0.9, None, &[], now);
        e.metadata.emotional_8d = Some(Emotional8d {
            joy: 0.9,
            trust: 0.8,
            anticipation: 0.7,
            surprise: 0.7,
            ..Emotional8d::default()
        });
        let score = breakthrough_score(&e);
        assert!(score > 0.5);
    }

    #[test]
    fn chain_tracing_links_by_shared_session() {
        let now = Utc::now();
        let breakthrough = episode(0, 0.8, 0.9, Some("s1"), &[], now);
        let precursor = episode(1, 0.5, 0.3, Some("s1"), &[], now);
        let unrelated = episode(2, 0.5, 0.3, Some("other"), &[], now);
        let population = vec![breakthrough.clone(), precursor.clone(), unrelated];

        let chain = trace_chain(&breakthrough, &population).expect("chain expected");
        assert_eq!(chain.members.len(), 2);
        assert_eq!(chain.members[1].0, breakthrough.episode_id);
        assert_eq!(chain.members[0].0, precursor.episode_id);
    }

    #[test]
    fn chain_requires_minimum_length() {
        let now = Utc::now();
        let breakthrough = episode(0, 0.8, 0.9, Some("solo"), &[], now);
        let population = vec![breakthrough.clone()];
        assert!(trace_chain(&breakthrough, &population).is_none());
    }

    #[test]
    fn boosts_keep_importance_in_unit_range() {
        let now = Utc::now();
        let breakthrough = episode(0, 0.9, 0.9, Some("s1"), &[], now);
        let precursor = episode(2, 0.5, 0.3, Some("s1"), &[], now);
        let chain = Chain {
            narrative_id: Uuid::new_v4(),
            members: vec![
                (precursor.episode_id, precursor.created_at),
                (breakthrough.episode_id, breakthrough.created_at),
            ],
        };
        let lookup = |id: Uuid| {
            if id == breakthrough.episode_id {
                (0.9, 0.9)
            } else {
                (0.3, 0.95)
            }
        };
        let boosts = compute_chain_boosts(&chain, breakthrough_score(&breakthrough), lookup);
        for b in &boosts {
            assert!((0.0..=1.0).contains(&b.new_importance));
            assert!(b.boost <= 0.20);
        }
    }

    #[test]
    fn traces_mark_first_and_last_edge_correctly() {
        let now = Utc::now();
        let chain = Chain {
            narrative_id: Uuid::new_v4(),
            members: vec![
                (Uuid::new_v4(), now - chrono::Duration::hours(3)),
                (Uuid::new_v4(), now - chrono::Duration::hours(2)),
                (Uuid::new_v4(), now - chrono::Duration::hours(1)),
            ],
        };
        let traces = build_traces(&chain, now);
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0].trace_type, TraceType::Initiator);
        assert_eq!(traces[1].trace_type, TraceType::Conclusion);
        assert!(traces.iter().all(|t| t.narrative_id == chain.narrative_id));
    }
}
