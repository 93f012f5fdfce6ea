//! `POST /memory/consciousness/update`: ingests an emotional or somatic
//! state sample as an Episode and auto-links it `after` the previous sample
//! of the same type.
//!
//! The "previous sample of this type" lookup has no dedicated storage
//! method, since it is really just a tagged temporal-window query: every
//! consciousness-update episode is tagged `consciousness` plus
//! `consciousness:{type}`, so the most recent prior sample is the newest
//! episode carrying that tag with `created_at` before this one.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use memory_core::ingestion::{self, CreateEpisodeRequest};
use memory_core::storage::WindowOrder;
use memory_core::types::RelationshipLabel;

use crate::dto::{ConsciousnessUpdateRequest, ConsciousnessUpdateResponse};
use crate::error::{bad_request, ApiError};
use crate::state::SharedState;

const CONSCIOUSNESS_TAG: &str = "consciousness";

pub async fn update(
    State(state): State<SharedState>,
    Json(request): Json<ConsciousnessUpdateRequest>,
) -> Result<Json<ConsciousnessUpdateResponse>, ApiError> {
    let type_tag = match request.sample_type.as_str() {
        "emotional" => "consciousness:emotional",
        "somatic" => "consciousness:somatic",
        other => return Err(bad_request(format!("unknown consciousness sample type {other:?}"))),
    };

    let now = Utc::now();
    let previous = state
        .storage
        .episodes_in_window(
            None,
            Some(now),
            Some(&[type_tag.to_string()]),
            1,
            WindowOrder::NewestFirst,
        )
        .await?
        .into_iter()
        .next();

    let tags = [CONSCIOUSNESS_TAG.to_string(), type_tag.to_string()].into_iter().collect();

    let result = ingestion::create_episode(
        &state.storage,
        CreateEpisodeRequest {
            action_type: format!("consciousness_{}", request.sample_type),
            action_details: serde_json::Value::Null,
            context_state: request.context_state,
            tags,
            emotional_8d: request.emotional_8d,
            somatic_7d: request.somatic_7d,
        },
    )
    .await?;

    let mut linked_previous = None;
    if let Some(previous_episode) = previous {
        state
            .storage
            .add_temporal_ref(result.episode_id, previous_episode.episode_id, RelationshipLabel::After)
            .await?;
        linked_previous = Some(previous_episode.episode_id);
    }

    state.retrieval.invalidate_cache();

    Ok(Json(ConsciousnessUpdateResponse {
        episode_id: result.episode_id,
        created_at: result.created_at,
        linked_previous,
    }))
}
