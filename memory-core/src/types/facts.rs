use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Normalized status vocabulary for [`Facts::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FactStatus {
    Complete,
    InProgress,
    Pending,
    Failed,
}

impl FactStatus {
    /// Normalize a free-form status token against the closed vocabulary.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let upper = raw.trim().to_uppercase().replace([' ', '-'], "_");
        match upper.as_str() {
            "COMPLETE" | "COMPLETED" | "DONE" => Some(Self::Complete),
            "IN_PROGRESS" | "INPROGRESS" | "IN_PROGRESS_" => Some(Self::InProgress),
            "PENDING" | "QUEUED" => Some(Self::Pending),
            "FAILED" | "ERROR" | "ERRORED" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Structured, typed scalars extracted from an episode's content.
///
/// Schema enumerated per the spec's minimum field set, supplemented with a
/// handful of fields visible in the original implementation's fact schema
/// (`api_version`, `success_rate`, `completion_percent`) plus an extensible
/// `custom` tail for anything the closed schema doesn't name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Facts {
    pub nexus_version: Option<String>,
    pub api_version: Option<String>,
    pub accuracy_percent: Option<f64>,
    pub latency_ms: Option<f64>,
    pub episode_count: Option<i64>,
    pub status: Option<FactStatus>,
    pub phase_number: Option<i64>,
    pub session_number: Option<i64>,
    pub feature_name: Option<String>,
    pub benchmark_name: Option<String>,
    pub benchmark_score: Option<f64>,
    pub success_rate: Option<f64>,
    pub completion_percent: Option<f64>,
    pub extraction_method: Option<String>,
    pub extraction_confidence: Option<f64>,
    pub last_updated: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub custom: Map<String, Value>,
}

impl Facts {
    /// `true` if every enumerated and custom field is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nexus_version.is_none()
            && self.api_version.is_none()
            && self.accuracy_percent.is_none()
            && self.latency_ms.is_none()
            && self.episode_count.is_none()
            && self.status.is_none()
            && self.phase_number.is_none()
            && self.session_number.is_none()
            && self.feature_name.is_none()
            && self.benchmark_name.is_none()
            && self.benchmark_score.is_none()
            && self.success_rate.is_none()
            && self.completion_percent.is_none()
            && self.custom.is_empty()
    }

    /// Look up a named fact by the field name used in `/memory/facts`
    /// requests (matches [`Facts`]'s own field names).
    #[must_use]
    pub fn get(&self, fact_type: &str) -> Option<Value> {
        match fact_type {
            "nexus_version" => self.nexus_version.clone().map(Value::from),
            "api_version" => self.api_version.clone().map(Value::from),
            "accuracy_percent" => self.accuracy_percent.map(|v| {
                serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
            }),
            "latency_ms" => self.latency_ms.map(|v| {
                serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
            }),
            "episode_count" => self.episode_count.map(Value::from),
            "status" => self
                .status
                .map(|s| serde_json::to_value(s).unwrap_or(Value::Null)),
            "phase_number" => self.phase_number.map(Value::from),
            "session_number" => self.session_number.map(Value::from),
            "feature_name" => self.feature_name.clone().map(Value::from),
            "benchmark_name" => self.benchmark_name.clone().map(Value::from),
            "benchmark_score" => self.benchmark_score.map(|v| {
                serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
            }),
            "success_rate" => self.success_rate.map(|v| {
                serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
            }),
            "completion_percent" => self.completion_percent.map(|v| {
                serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
            }),
            other => self.custom.get(other).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_normalizes_variants() {
        assert_eq!(FactStatus::parse("complete"), Some(FactStatus::Complete));
        assert_eq!(
            FactStatus::parse("In-Progress"),
            Some(FactStatus::InProgress)
        );
        assert_eq!(FactStatus::parse("bogus"), None);
    }

    #[test]
    fn empty_facts_is_empty() {
        assert!(Facts::default().is_empty());
    }

    #[test]
    fn get_reads_enumerated_and_custom_fields() {
        let mut facts = Facts {
            nexus_version: Some("2.0.0".to_string()),
            ..Default::default()
        };
        facts.custom.insert("widget_count".to_string(), Value::from(7));
        assert_eq!(facts.get("nexus_version"), Some(Value::from("2.0.0")));
        assert_eq!(facts.get("widget_count"), Some(Value::from(7)));
        assert_eq!(facts.get("missing"), None);
    }
}
