use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The state an [`EmbeddingJob`] progresses through. Monotonic per invariant
/// 4: `Pending -> Processing -> (Done | Dead)`, never backward except the
/// worker's own failure path returning `Processing` to `Pending` for retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Processing,
    Done,
    Dead,
}

impl JobState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Dead => "dead",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "done" => Some(Self::Done),
            "dead" => Some(Self::Dead),
            _ => None,
        }
    }
}

/// A queued unit of embedding work, referencing exactly one episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingJob {
    pub job_id: Uuid,
    pub episode_id: Uuid,
    pub state: JobState,
    pub priority: i64,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Default job priority when `action_details.priority` is absent at ingest.
pub const DEFAULT_JOB_PRIORITY: i64 = 0;
