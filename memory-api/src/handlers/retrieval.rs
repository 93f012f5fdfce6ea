//! Recent, semantic search, temporal window/related/link — D1-D4 from the
//! retrieval engine.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::dto::{
    default_limit, parse_relationship, EpisodeView, SearchRequest, SearchResultView,
    TemporalLinkRequest, TemporalRelatedRequest, TemporalWindowRequest,
};
use crate::error::{bad_request, ApiError};
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub async fn recent(
    State(state): State<SharedState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<EpisodeView>>, ApiError> {
    let episodes = state.retrieval.recent(query.limit).await?;
    Ok(Json(episodes.into_iter().map(EpisodeView::from).collect()))
}

pub async fn search(
    State(state): State<SharedState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Vec<SearchResultView>>, ApiError> {
    let hits = state
        .retrieval
        .search(&request.query, request.limit, request.min_similarity)
        .await?;

    Ok(Json(
        hits.into_iter()
            .map(|hit| SearchResultView {
                episode_id: hit.episode_id,
                content: hit.content,
                similarity: hit.similarity,
                importance: hit.importance,
                tags: hit.tags,
                created_at: hit.created_at,
            })
            .collect(),
    ))
}

pub async fn temporal_before(
    State(state): State<SharedState>,
    Json(request): Json<TemporalWindowRequest>,
) -> Result<Json<Vec<EpisodeView>>, ApiError> {
    let Some(before) = request.before else {
        return Err(bad_request("`before` is required"));
    };
    let episodes = state
        .retrieval
        .before(before, request.limit, request.tags.as_deref())
        .await?;
    Ok(Json(episodes.into_iter().map(EpisodeView::from).collect()))
}

pub async fn temporal_after(
    State(state): State<SharedState>,
    Json(request): Json<TemporalWindowRequest>,
) -> Result<Json<Vec<EpisodeView>>, ApiError> {
    let Some(after) = request.after else {
        return Err(bad_request("`after` is required"));
    };
    let episodes = state
        .retrieval
        .after(after, request.limit, request.tags.as_deref())
        .await?;
    Ok(Json(episodes.into_iter().map(EpisodeView::from).collect()))
}

pub async fn temporal_range(
    State(state): State<SharedState>,
    Json(request): Json<TemporalWindowRequest>,
) -> Result<Json<Vec<EpisodeView>>, ApiError> {
    let (Some(start), Some(end)) = (request.after, request.before) else {
        return Err(bad_request("both `after` and `before` are required for a range"));
    };
    let episodes = state
        .retrieval
        .range(start, end, request.limit, request.tags.as_deref())
        .await?;
    Ok(Json(episodes.into_iter().map(EpisodeView::from).collect()))
}

pub async fn temporal_related(
    State(state): State<SharedState>,
    Json(request): Json<TemporalRelatedRequest>,
) -> Result<Json<Vec<EpisodeView>>, ApiError> {
    let relationship = match request.relationship.as_deref() {
        Some(raw) => Some(parse_relationship(raw).ok_or_else(|| bad_request(format!("unknown relationship {raw:?}")))?),
        None => None,
    };
    let episodes = state.retrieval.related(request.episode_id, relationship).await?;
    Ok(Json(episodes.into_iter().map(EpisodeView::from).collect()))
}

pub async fn temporal_link(
    State(state): State<SharedState>,
    Json(request): Json<TemporalLinkRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let relationship = parse_relationship(&request.relationship)
        .ok_or_else(|| bad_request(format!("unknown relationship {:?}", request.relationship)))?;

    state
        .storage
        .add_temporal_ref(request.source_episode_id, request.target_episode_id, relationship)
        .await?;

    Ok(Json(serde_json::json!({ "linked": true })))
}
