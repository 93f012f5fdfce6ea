use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A directed edge produced by consolidation, connecting two episodes in a
/// traced chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceType {
    Initiator,
    Progression,
    Conclusion,
}

impl TraceType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initiator => "initiator",
            Self::Progression => "progression",
            Self::Conclusion => "conclusion",
        }
    }
}

/// A persisted Narrative Trace: append-only, produced one run at a time by
/// the consolidation engine. Never references an episode that doesn't exist
/// (invariant 7) — the engine only ever builds these from episodes it has
/// just fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeTrace {
    pub trace_id: Uuid,
    pub source_episode_id: Uuid,
    pub target_episode_id: Uuid,
    pub trace_type: TraceType,
    pub strength: f64,
    pub narrative_id: Uuid,
    pub created_at: DateTime<Utc>,
}
