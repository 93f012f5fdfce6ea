//! `/memory/analysis/decay-scores`, `/memory/pruning/preview`,
//! `/memory/pruning/execute` — §4.E over a caller-specified time window.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use memory_core::decay;
use serde::Serialize;

use crate::dto::{DecayAnalysisRequest, PruningExecuteRequest, PruningPreviewRequest};
use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct DecayAnalysisView {
    pub bands: Vec<BandView>,
    pub very_low_count: usize,
    pub very_high_count: usize,
    pub episodes_considered: usize,
}

#[derive(Debug, Serialize)]
pub struct BandView {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

pub async fn analyze(
    State(state): State<SharedState>,
    Json(request): Json<DecayAnalysisRequest>,
) -> Result<Json<DecayAnalysisView>, ApiError> {
    let episodes = state.storage.episodes_created_between(request.start, request.end).await?;
    let analysis = decay::analyze_decay(
        &episodes,
        state.config.decay.half_life_days,
        decay::DecayWeights::from(&state.config.decay),
        Utc::now(),
    );

    Ok(Json(DecayAnalysisView {
        bands: analysis
            .bands
            .iter()
            .map(|b| BandView { lower: b.lower, upper: b.upper, count: b.count })
            .collect(),
        very_low_count: analysis.very_low_count,
        very_high_count: analysis.very_high_count,
        episodes_considered: analysis.episodes_considered,
    }))
}

#[derive(Debug, Serialize)]
pub struct PruneCandidateView {
    pub episode_id: uuid::Uuid,
    pub decay_score: f64,
    pub is_protected: bool,
}

pub async fn preview(
    State(state): State<SharedState>,
    Json(request): Json<PruningPreviewRequest>,
) -> Result<Json<Vec<PruneCandidateView>>, ApiError> {
    let episodes = state.storage.episodes_created_between(request.start, request.end).await?;
    let candidates = decay::preview_pruning(
        &episodes,
        request.min_age_days,
        state.config.decay.half_life_days,
        decay::DecayWeights::from(&state.config.decay),
        request.max_prune_count,
        Utc::now(),
    );

    Ok(Json(
        candidates
            .into_iter()
            .map(|c| PruneCandidateView {
                episode_id: c.episode_id,
                decay_score: c.decay_score,
                is_protected: c.is_protected,
            })
            .collect(),
    ))
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PruneOutcomeView {
    DryRun { would_prune_count: usize },
}

pub async fn execute(
    State(state): State<SharedState>,
    Json(request): Json<PruningExecuteRequest>,
) -> Result<Json<PruneOutcomeView>, ApiError> {
    let episodes = state.storage.episodes_created_between(request.start, request.end).await?;
    let outcome = decay::execute_pruning(
        &episodes,
        request.min_score_threshold,
        request.min_age_days,
        request.max_prune_count,
        state.config.decay.half_life_days,
        decay::DecayWeights::from(&state.config.decay),
        request.dry_run,
        Utc::now(),
    )?;

    Ok(Json(match outcome {
        decay::PruneOutcome::DryRun { would_prune_count } => PruneOutcomeView::DryRun { would_prune_count },
    }))
}
