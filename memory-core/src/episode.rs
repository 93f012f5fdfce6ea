use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{EmbeddingState, Metadata};

/// The fundamental unit of the memory service: timestamped content plus
/// structured metadata, an importance score, a tag set, and an embedding
/// that starts `Pending` and is filled in asynchronously by the worker pool.
///
/// Tags are stored as a `BTreeSet` — order is never meaningful (data model
/// §3.1: "unordered set of short strings"), and `BTreeSet` gives stable
/// iteration for serialization without pulling in a hasher dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub episode_id: Uuid,
    pub content: String,
    pub importance: f64,
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub embedding: EmbeddingState,
    pub metadata: Metadata,
}

/// Characters of `content` used for the fingerprint and the text fed to the
/// encoder (spec §3.1, §4.C step 2).
pub const CONTENT_TRUNCATION_CHARS: usize = 4_000;

impl Episode {
    /// Truncate to [`CONTENT_TRUNCATION_CHARS`] on a `char` boundary.
    #[must_use]
    pub fn truncated_content(&self) -> &str {
        truncate_chars(&self.content, CONTENT_TRUNCATION_CHARS)
    }

    /// Clamp importance into `[0, 1]`; used everywhere importance is written
    /// so invariant 2 can never be violated by a caller-supplied value.
    #[must_use]
    pub fn clamp_importance(value: f64) -> f64 {
        value.clamp(0.0, 1.0)
    }
}

/// Truncate `s` to at most `max_chars` Unicode scalar values.
#[must_use]
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;

    fn sample_episode(content: &str) -> Episode {
        Episode {
            episode_id: Uuid::new_v4(),
            content: content.to_string(),
            importance: 0.5,
            tags: BTreeSet::new(),
            created_at: Utc::now(),
            embedding: EmbeddingState::Pending,
            metadata: Metadata::default(),
        }
    }

    #[test]
    fn truncation_respects_char_boundary() {
        let long = "a".repeat(5_000);
        let episode = sample_episode(&long);
        assert_eq!(episode.truncated_content().chars().count(), CONTENT_TRUNCATION_CHARS);
    }

    #[test]
    fn truncation_noop_for_short_content() {
        let episode = sample_episode("short");
        assert_eq!(episode.truncated_content(), "short");
    }

    #[test]
    fn importance_always_clamped() {
        assert_eq!(Episode::clamp_importance(1.5), 1.0);
        assert_eq!(Episode::clamp_importance(-0.5), 0.0);
        assert_eq!(Episode::clamp_importance(0.3), 0.3);
    }
}
