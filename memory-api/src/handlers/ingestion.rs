//! `POST /memory/action`.

use axum::extract::State;
use axum::Json;
use memory_core::ingestion::{self, CreateEpisodeRequest};

use crate::dto::{IngestRequest, IngestResponse};
use crate::error::ApiError;
use crate::state::SharedState;

pub async fn ingest(
    State(state): State<SharedState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let result = ingestion::create_episode(
        &state.storage,
        CreateEpisodeRequest {
            action_type: request.action_type,
            action_details: request.action_details,
            context_state: request.context_state,
            tags: request.tags,
            emotional_8d: None,
            somatic_7d: None,
        },
    )
    .await?;

    state.retrieval.invalidate_cache();

    Ok(Json(IngestResponse {
        episode_id: result.episode_id,
        created_at: result.created_at,
    }))
}
