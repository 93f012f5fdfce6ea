//! Ingestion path: `create_episode`. Derives content and importance from
//! caller-supplied fields, runs fact extraction, and persists the episode
//! plus its pending embedding job in one transaction.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;

use crate::episode::Episode;
use crate::error::Result;
use crate::extraction::extract_facts;
use crate::job::DEFAULT_JOB_PRIORITY;
use crate::storage::StorageBackend;
use crate::types::{AccessTracking, ConsolidationOutputs, EmbeddingState, Emotional8d, Metadata, Somatic7d};

/// Inputs to [`create_episode`], mirroring the ingestion operation's
/// parameters.
///
/// `emotional_8d`/`somatic_7d` are `None` for ordinary action episodes and
/// `Some` only for consciousness-state samples ingested through
/// `/memory/consciousness/update`, which stamps one of the two.
#[derive(Debug, Clone, Default)]
pub struct CreateEpisodeRequest {
    pub action_type: String,
    pub action_details: Value,
    pub context_state: Value,
    pub tags: BTreeSet<String>,
    pub emotional_8d: Option<Emotional8d>,
    pub somatic_7d: Option<Somatic7d>,
}

/// Result of a successful ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateEpisodeResult {
    pub episode_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Derive the episode's stored content from `action_details`: a literal
/// `content` key wins, otherwise the whole object is serialized as
/// canonical JSON, otherwise `action_type` is used verbatim.
#[must_use]
pub fn derive_content(action_type: &str, action_details: &Value) -> String {
    if let Some(content) = action_details.get("content").and_then(Value::as_str) {
        return content.to_string();
    }
    if action_details.is_object() && !action_details.as_object().is_some_and(serde_json::Map::is_empty) {
        if let Ok(serialized) = serde_json::to_string(action_details) {
            return serialized;
        }
    }
    action_type.to_string()
}

/// Derive importance from `action_details.importance_score`, defaulting to
/// 0.5 when absent or out of range.
#[must_use]
pub fn derive_importance(action_details: &Value) -> f64 {
    action_details
        .get("importance_score")
        .and_then(Value::as_f64)
        .filter(|v| (0.0..=1.0).contains(v))
        .unwrap_or(0.5)
}

/// Derive the embedding job's priority from `action_details.priority`,
/// defaulting to [`DEFAULT_JOB_PRIORITY`].
#[must_use]
pub fn derive_priority(action_details: &Value) -> i64 {
    action_details
        .get("priority")
        .and_then(Value::as_i64)
        .unwrap_or(DEFAULT_JOB_PRIORITY)
}

/// Create and persist a new episode, running fact extraction and enqueuing
/// its embedding job atomically.
///
/// # Errors
/// Returns [`crate::error::Error::StorageConflict`] or
/// [`crate::error::Error::StorageUnavailable`] if the transaction cannot
/// commit; the caller sees a retryable error and neither the episode nor
/// the job exist.
#[instrument(skip(storage, request), fields(action_type = %request.action_type))]
pub async fn create_episode(
    storage: &Arc<dyn StorageBackend>,
    request: CreateEpisodeRequest,
) -> Result<CreateEpisodeResult> {
    let content = derive_content(&request.action_type, &request.action_details);
    let importance = Episode::clamp_importance(derive_importance(&request.action_details));
    let priority = derive_priority(&request.action_details);

    let facts = extract_facts(&content, &request.tags.iter().cloned().collect::<Vec<_>>());
    let facts = if facts.is_empty() { None } else { Some(facts) };

    let emotional_8d = request.emotional_8d;
    let somatic_7d = request.somatic_7d;

    let episode = Episode {
        episode_id: Uuid::new_v4(),
        content,
        importance,
        tags: request.tags,
        created_at: Utc::now(),
        embedding: EmbeddingState::Pending,
        metadata: Metadata {
            action_type: request.action_type,
            action_details: request.action_details,
            context_state: request.context_state,
            facts,
            temporal_refs: Vec::new(),
            emotional_8d,
            somatic_7d,
            salience_score: None,
            session_id: None,
            consolidation: ConsolidationOutputs::default(),
            access_tracking: AccessTracking::default(),
            extra: serde_json::Map::new(),
        },
    };

    storage.insert_episode_with_job(&episode, priority).await?;

    Ok(CreateEpisodeResult {
        episode_id: episode.episode_id,
        created_at: episode.created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_prefers_explicit_content_key() {
        let details = json!({"content": "hello", "other": 1});
        assert_eq!(derive_content("note", &details), "hello");
    }

    #[test]
    fn content_falls_back_to_serialized_details() {
        let details = json!({"x": 1});
        assert_eq!(derive_content("note", &details), serde_json::to_string(&details).unwrap());
    }

    #[test]
    fn content_falls_back_to_action_type_for_empty_object() {
        let details = json!({});
        assert_eq!(derive_content("note", &details), "note");
    }

    #[test]
    fn importance_defaults_when_absent_or_out_of_range() {
        assert_eq!(derive_importance(&json!({})), 0.5);
        assert_eq!(derive_importance(&json!({"importance_score": 1.5})), 0.5);
        assert_eq!(derive_importance(&json!({"importance_score": 0.3})), 0.3);
    }

    #[test]
    fn priority_defaults_when_absent() {
        assert_eq!(derive_priority(&json!({})), DEFAULT_JOB_PRIORITY);
        assert_eq!(derive_priority(&json!({"priority": 7})), 7);
    }
}
