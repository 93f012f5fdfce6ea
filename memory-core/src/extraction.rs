//! Fact extraction: a fixed pipeline of named regex groups run once over an
//! Episode's content at ingest (or via backfill), producing a [`Facts`]
//! record. Patterns are fixed at compile time — unlike `search::regex`'s
//! user-supplied patterns, there is no `ReDoS` surface here to validate.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use serde_json::Value;

use crate::types::{FactStatus, Facts};

static NEXUS_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)NEXUS\s*V?([0-9]+\.[0-9]+\.[0-9]+)").unwrap());
static API_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)API\s*V(?:ersion)?\s*:?\s*([0-9]+\.[0-9]+(?:\.[0-9]+)?)").unwrap());
static STATUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Status\s*:\s*([A-Za-z_ ]+)").unwrap());
static ACCURACY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Accuracy\s*:\s*([0-9]+(?:\.[0-9]+)?)\s*%").unwrap());
static LATENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Latency\s*:\s*([0-9]+(?:\.[0-9]+)?)\s*ms").unwrap());
static EPISODE_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Episodes?\s*:\s*([0-9]+)").unwrap());
static PHASE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Phase\s*:?\s*([0-9]+)").unwrap());
static SESSION_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Session\s*:?\s*([0-9]+)").unwrap());
static FEATURE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Feature\s*:\s*([^\n]+)").unwrap());
static BENCHMARK_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Benchmark\s*:\s*([^\n,]+)").unwrap());
static BENCHMARK_SCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Benchmark\s*Score\s*:\s*([0-9]+(?:\.[0-9]+)?)").unwrap());
static SUCCESS_RATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Success\s*Rate\s*:\s*([0-9]+(?:\.[0-9]+)?)\s*%?").unwrap());
static COMPLETION_PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Completion\s*:\s*([0-9]+(?:\.[0-9]+)?)\s*%").unwrap());

/// Structural markers that raise extraction confidence: headings and
/// key-value punctuation, both signs the content was written as a
/// structured report rather than free prose.
static STRUCTURAL_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[A-Z][A-Za-z0-9 _/-]*:\s*\S").unwrap());

/// Run the fixed fact-extraction pipeline over `content`, ignoring `tags`
/// (reserved for future tag-conditioned extraction rules; currently every
/// pattern is tag-independent).
#[must_use]
pub fn extract_facts(content: &str, _tags: &[String]) -> Facts {
    let mut facts = Facts::default();
    let mut hits = 0usize;

    if let Some(v) = capture_str(&NEXUS_VERSION, content) {
        facts.nexus_version = Some(v);
        hits += 1;
    }
    if let Some(v) = capture_str(&API_VERSION, content) {
        facts.api_version = Some(v);
        hits += 1;
    }
    if let Some(raw) = capture_str(&STATUS, content) {
        if let Some(status) = FactStatus::parse(raw.trim()) {
            facts.status = Some(status);
            hits += 1;
        }
    }
    if let Some(v) = capture_f64(&ACCURACY, content) {
        if (0.0..=100.0).contains(&v) {
            facts.accuracy_percent = Some(v);
            hits += 1;
        }
    }
    if let Some(v) = capture_f64(&LATENCY, content) {
        if v >= 0.0 {
            facts.latency_ms = Some(v);
            hits += 1;
        }
    }
    if let Some(v) = capture_i64(&EPISODE_COUNT, content) {
        facts.episode_count = Some(v);
        hits += 1;
    }
    if let Some(v) = capture_i64(&PHASE_NUMBER, content) {
        if v >= 1 {
            facts.phase_number = Some(v);
            hits += 1;
        }
    }
    if let Some(v) = capture_i64(&SESSION_NUMBER, content) {
        if v >= 1 {
            facts.session_number = Some(v);
            hits += 1;
        }
    }
    if let Some(v) = capture_str(&FEATURE_NAME, content) {
        facts.feature_name = Some(v.trim().to_string());
        hits += 1;
    }
    if let Some(v) = capture_str(&BENCHMARK_NAME, content) {
        facts.benchmark_name = Some(v.trim().to_string());
        hits += 1;
    }
    if let Some(v) = capture_f64(&BENCHMARK_SCORE, content) {
        facts.benchmark_score = Some(v);
        hits += 1;
    }
    if let Some(v) = capture_f64(&SUCCESS_RATE, content) {
        if (0.0..=100.0).contains(&v) {
            facts.success_rate = Some(v);
            hits += 1;
        }
    }
    if let Some(v) = capture_f64(&COMPLETION_PERCENT, content) {
        if (0.0..=100.0).contains(&v) {
            facts.completion_percent = Some(v);
            hits += 1;
        }
    }

    facts.extraction_method = Some("auto".to_string());
    facts.extraction_confidence = Some(confidence(hits, content));
    facts.last_updated = Some(Utc::now());
    facts
}

/// Confidence heuristic: a mix of how many fields were extracted and whether
/// the content looks structurally like a report (headings, "Key: value"
/// lines) rather than free prose.
fn confidence(hits: usize, content: &str) -> f64 {
    let hit_component = (hits as f64 / 6.0).min(1.0) * 0.7;
    let structural_hits = STRUCTURAL_MARKER.find_iter(content).count();
    let structural_component = (structural_hits as f64 / 3.0).min(1.0) * 0.3;
    (hit_component + structural_component).clamp(0.0, 1.0)
}

fn capture_str(re: &LazyLock<Regex>, content: &str) -> Option<String> {
    re.captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn capture_f64(re: &LazyLock<Regex>, content: &str) -> Option<f64> {
    capture_str(re, content).and_then(|s| s.parse().ok())
}

fn capture_i64(re: &LazyLock<Regex>, content: &str) -> Option<i64> {
    capture_str(re, content).and_then(|s| s.parse().ok())
}

/// Read a single fact value out of an already-extracted record by field
/// name, used by the fact-lookup retrieval operation. Falls through to the
/// `custom` tail for names outside the enumerated schema.
#[must_use]
pub fn fact_value(facts: &Facts, fact_type: &str) -> Option<Value> {
    facts.get(fact_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn extracts_nexus_report_fields() {
        let content = "NEXUS V2.0.0\nStatus: COMPLETE\nAccuracy: 100.0%\nEpisodes: 553\nPhase: 4";
        let facts = extract_facts(content, &[]);
        assert_eq!(facts.nexus_version.as_deref(), Some("2.0.0"));
        assert_eq!(facts.status, Some(FactStatus::Complete));
        assert_eq!(facts.accuracy_percent, Some(100.0));
        assert_eq!(facts.episode_count, Some(553));
        assert_eq!(facts.phase_number, Some(4));
        assert!(facts.extraction_confidence.unwrap() > 0.5);
    }

    #[test]
    fn extraction_is_idempotent_excluding_timestamp() {
        let content = "NEXUS V1.2.3\nStatus: IN_PROGRESS";
        let a = extract_facts(content, &[]);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = extract_facts(content, &[]);
        assert_eq!(a.nexus_version, b.nexus_version);
        assert_eq!(a.status, b.status);
        assert_eq!(a.extraction_confidence, b.extraction_confidence);
        assert!(a.last_updated.is_some());
        assert!(b.last_updated.is_some());
        assert!(
            b.last_updated > a.last_updated,
            "last_updated is the one field expected to vary between runs"
        );
    }

    #[test]
    fn free_prose_yields_low_confidence_and_no_fields() {
        let content = "we had a nice chat about the weather today";
        let facts = extract_facts(content, &[]);
        assert!(facts.nexus_version.is_none());
        assert!(facts.extraction_confidence.unwrap() < 0.3);
    }

    #[test]
    fn rejects_out_of_range_accuracy() {
        let content = "Accuracy: 250%";
        let facts = extract_facts(content, &[]);
        assert!(facts.accuracy_percent.is_none());
    }

    proptest! {
        #[test]
        fn extraction_is_idempotent_over_arbitrary_content(content in ".{0,200}") {
            let mut a = extract_facts(&content, &[]);
            let mut b = extract_facts(&content, &[]);
            a.last_updated = None;
            b.last_updated = None;
            prop_assert_eq!(a, b);
        }
    }
}
