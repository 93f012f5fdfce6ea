use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::facts::Facts;

/// A directed relationship label on a [`TemporalRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipLabel {
    Before,
    After,
    Causes,
    Effects,
}

impl RelationshipLabel {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "before" => Some(Self::Before),
            "after" => Some(Self::After),
            "causes" => Some(Self::Causes),
            "effects" => Some(Self::Effects),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
            Self::Causes => "causes",
            Self::Effects => "effects",
        }
    }
}

/// One entry of a Temporal Edge, embedded inside the source episode's
/// metadata. This embedded list is the authoritative projection per the
/// live contract (§9 design note); a relational mirror is allowed but never
/// primary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalRef {
    pub target_episode_id: uuid::Uuid,
    pub relationship: RelationshipLabel,
}

/// Eight-dimensional emotional affect vector (Plutchik-style basic emotions).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Emotional8d {
    pub joy: f64,
    pub trust: f64,
    pub fear: f64,
    pub surprise: f64,
    pub sadness: f64,
    pub disgust: f64,
    pub anger: f64,
    pub anticipation: f64,
}

impl Emotional8d {
    /// Mean of the four dimensions the breakthrough score formula reads.
    #[must_use]
    pub fn mean_joy_trust_anticipation_surprise(&self) -> f64 {
        (self.joy + self.trust + self.anticipation + self.surprise) / 4.0
    }

    /// Signed valence: positive affect minus negative affect, roughly in
    /// `[-1, 1]`.
    #[must_use]
    pub fn valence(&self) -> f64 {
        (self.joy + self.trust + self.anticipation) - (self.fear + self.sadness + self.disgust + self.anger)
    }
}

/// Seven-dimensional somatic (bodily-state) signal vector. Treated as an
/// opaque upstream producer per spec §1 — values are carried verbatim and
/// never interpreted inside the memory service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Somatic7d {
    pub heart_rate: f64,
    pub skin_conductance: f64,
    pub temperature: f64,
    pub muscle_tension: f64,
    pub respiration_rate: f64,
    pub cortisol_proxy: f64,
    pub energy_level: f64,
}

/// Per-episode access telemetry, updated by the retrieval engine.
///
/// Invariant 8: `access_count` only increases, `last_accessed` only moves
/// forward.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessTracking {
    pub last_accessed: Option<DateTime<Utc>>,
    pub access_count: u64,
}

impl AccessTracking {
    /// Record an access, enforcing the monotonicity invariant even if called
    /// with an out-of-order timestamp.
    pub fn record_access(&mut self, at: DateTime<Utc>) {
        self.access_count += 1;
        self.last_accessed = Some(match self.last_accessed {
            Some(prev) if prev >= at => prev,
            _ => at,
        });
    }
}

/// Consolidation-derived fields on an episode's metadata, written only by
/// the consolidation engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationOutputs {
    pub consolidated_salience_score: Option<f64>,
    pub breakthrough_score: Option<f64>,
    pub last_consolidated_at: Option<DateTime<Utc>>,
}

/// An episode's structured, extensible metadata record.
///
/// Well-known fields are nominally typed; `extra` is an untyped tail that
/// preserves forward compatibility with fields this service doesn't yet
/// model, per the §9 re-architecture note on free-form JSON metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub action_type: String,
    #[serde(default)]
    pub action_details: Value,
    #[serde(default)]
    pub context_state: Value,
    #[serde(default)]
    pub facts: Option<Facts>,
    #[serde(default)]
    pub temporal_refs: Vec<TemporalRef>,
    #[serde(default)]
    pub emotional_8d: Option<Emotional8d>,
    #[serde(default)]
    pub somatic_7d: Option<Somatic7d>,
    #[serde(default)]
    pub salience_score: Option<f64>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub consolidation: ConsolidationOutputs,
    #[serde(default)]
    pub access_tracking: AccessTracking,
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_tracking_never_moves_backward() {
        let mut tracking = AccessTracking::default();
        let later = Utc::now();
        let earlier = later - chrono::Duration::seconds(10);
        tracking.record_access(later);
        tracking.record_access(earlier);
        assert_eq!(tracking.access_count, 2);
        assert_eq!(tracking.last_accessed, Some(later));
    }

    #[test]
    fn relationship_label_roundtrips() {
        for label in [
            RelationshipLabel::Before,
            RelationshipLabel::After,
            RelationshipLabel::Causes,
            RelationshipLabel::Effects,
        ] {
            assert_eq!(RelationshipLabel::parse(label.as_str()), Some(label));
        }
        assert_eq!(RelationshipLabel::parse("unknown"), None);
    }
}
