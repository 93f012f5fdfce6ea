//! `POST /memory/facts` and `POST /memory/hybrid` — D5/D6.

use axum::extract::State;
use axum::Json;
use memory_core::retrieval::{HybridAnswer, HybridPreference};
use memory_core::storage::WindowOrder;

use crate::dto::{FactLookupRequest, FactResultView, HybridRequest, HybridResponse};
use crate::error::{bad_request_on_unknown_preference, ApiError};
use crate::state::SharedState;

pub async fn facts(
    State(state): State<SharedState>,
    Json(request): Json<FactLookupRequest>,
) -> Result<Json<FactResultView>, ApiError> {
    let result = state
        .retrieval
        .facts(
            &request.fact_type,
            request.tags.as_deref(),
            request.after,
            request.before,
            request.limit,
            WindowOrder::NewestFirst,
        )
        .await?;

    Ok(Json(FactResultView {
        value: result.value,
        source_episode_id: result.source_episode_id,
        confidence: result.confidence,
        timestamp: result.timestamp,
    }))
}

pub async fn hybrid(
    State(state): State<SharedState>,
    Json(request): Json<HybridRequest>,
) -> Result<Json<HybridResponse>, ApiError> {
    let prefer = match request.prefer.as_deref() {
        None => HybridPreference::Auto,
        Some("fact") => HybridPreference::Fact,
        Some("narrative") => HybridPreference::Narrative,
        Some("auto") => HybridPreference::Auto,
        Some(other) => return Err(bad_request_on_unknown_preference(other)),
    };

    let answer = state
        .retrieval
        .hybrid(&request.query, prefer, request.tags.as_deref(), request.limit)
        .await?;

    Ok(Json(match answer {
        HybridAnswer::Fact { value, episode_id, confidence } => {
            HybridResponse::Fact { value, episode_id, confidence }
        }
        HybridAnswer::Narrative { content, episode_id, confidence } => {
            HybridResponse::Narrative { content, episode_id, confidence }
        }
    }))
}
