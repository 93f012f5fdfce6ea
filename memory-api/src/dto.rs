//! Wire types for the HTTP surface. Kept separate from `memory_core`'s
//! domain types so the JSON shape can evolve independently of the storage
//! model, the way the teacher keeps `WorkspaceInfo`/`SeedAppliedResponse`
//! distinct from `Engine`'s internal state.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use memory_core::types::{Emotional8d, Facts, RelationshipLabel, Somatic7d};
use memory_core::Episode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ServiceIdentity {
    pub name: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage_ok: bool,
    pub pending_jobs: u64,
}

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub action_type: String,
    #[serde(default)]
    pub action_details: Value,
    #[serde(default)]
    pub context_state: Value,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub episode_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct EpisodeView {
    pub episode_id: Uuid,
    pub content: String,
    pub importance: f64,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub embedding_ready: bool,
    pub facts: Option<Facts>,
}

impl From<Episode> for EpisodeView {
    fn from(episode: Episode) -> Self {
        Self {
            episode_id: episode.episode_id,
            content: episode.content,
            importance: episode.importance,
            tags: episode.tags.into_iter().collect(),
            created_at: episode.created_at,
            embedding_ready: episode.embedding.is_ready(),
            facts: episode.metadata.facts,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub min_similarity: f32,
}

#[derive(Debug, Serialize)]
pub struct SearchResultView {
    pub episode_id: Uuid,
    pub content: String,
    pub similarity: f32,
    pub importance: f64,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct TemporalWindowRequest {
    pub before: Option<DateTime<Utc>>,
    pub after: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct TemporalRelatedRequest {
    pub episode_id: Uuid,
    pub relationship: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TemporalLinkRequest {
    pub source_episode_id: Uuid,
    pub target_episode_id: Uuid,
    pub relationship: String,
}

#[derive(Debug, Deserialize)]
pub struct ConsciousnessUpdateRequest {
    #[serde(rename = "type")]
    pub sample_type: String,
    pub emotional_8d: Option<Emotional8d>,
    pub somatic_7d: Option<Somatic7d>,
    #[serde(default)]
    pub context_state: Value,
}

#[derive(Debug, Serialize)]
pub struct ConsciousnessUpdateResponse {
    pub episode_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub linked_previous: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct FactLookupRequest {
    pub fact_type: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct FactResultView {
    pub value: Value,
    pub source_episode_id: Uuid,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct HybridRequest {
    pub query: String,
    #[serde(default)]
    pub prefer: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HybridResponse {
    Fact {
        value: Value,
        episode_id: Uuid,
        confidence: f64,
    },
    Narrative {
        content: String,
        episode_id: Uuid,
        confidence: f32,
    },
}

#[derive(Debug, Deserialize)]
pub struct DecayAnalysisRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub min_age_days: i64,
}

#[derive(Debug, Deserialize)]
pub struct PruningPreviewRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub min_age_days: i64,
    #[serde(default = "default_prune_count")]
    pub max_prune_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct PruningExecuteRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub min_age_days: i64,
    #[serde(default = "default_prune_count")]
    pub max_prune_count: usize,
    pub min_score_threshold: f64,
    #[serde(default = "default_true")]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_episodes: u64,
    pub pending_jobs: u64,
    pub processing_jobs: u64,
    pub done_jobs: u64,
    pub dead_jobs: u64,
    pub workers_claimed: u64,
    pub workers_done: u64,
    pub workers_dead: u64,
}

pub(crate) fn default_limit() -> usize {
    20
}

fn default_prune_count() -> usize {
    100
}

fn default_true() -> bool {
    true
}

pub(crate) fn parse_relationship(raw: &str) -> Option<RelationshipLabel> {
    RelationshipLabel::parse(raw)
}
