//! Structural repair of candidate documents.
//!
//! Repair is a total function: every input produces a document plus the
//! lists of applied repairs and remaining validation errors, never an
//! error. The heuristic pass alone is guaranteed to make an empty object
//! validate; a generative pass (when a backend strategy is configured)
//! gets one bounded attempt at anything the heuristics could not fix.

use chrono::{Datelike, Utc};
use serde_json::{json, Map, Value};

use crate::normalize::normalize_result_record;
use crate::validation::validate;

use super::llm::LlmClient;
use super::sanitize::clean_to_json;

pub const REPAIRED_TITLE: &str = "UNKNOWN_TITLE_REPAIRED";
pub const REPAIRED_SUMMARY: &str = "SUMMARY_MISSING: automatic placeholder — please review.";

const REPAIR_MAX_TOKENS: u32 = 1500;
const MAX_ERRORS_IN_PROMPT: usize = 20;

/// Bounds on repair effort.
#[derive(Debug, Clone)]
pub struct RepairConfig {
    /// Generative attempts after the heuristic pass.
    pub max_attempts: u32,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self { max_attempts: 1 }
    }
}

/// Result of one repair run. `remaining` empty means the document is valid.
#[derive(Debug)]
pub struct RepairOutcome {
    pub document: Value,
    pub applied: Vec<String>,
    pub remaining: Vec<String>,
}

/// Heuristic-first document repairer with an optional generative fallback.
pub struct Repairer {
    strategy: Option<Box<dyn LlmClient>>,
    config: RepairConfig,
}

impl Repairer {
    /// Heuristics only.
    pub fn new() -> Self {
        Self {
            strategy: None,
            config: RepairConfig::default(),
        }
    }

    /// Heuristics plus a generative fallback backed by `client`.
    pub fn with_strategy(client: Box<dyn LlmClient>, config: RepairConfig) -> Self {
        Self {
            strategy: Some(client),
            config,
        }
    }

    /// Repair `document` toward structural validity.
    ///
    /// Already-valid documents pass through untouched. Otherwise: heuristic
    /// placeholder fills and result-record normalization, then (if
    /// configured) bounded generative attempts. A generative response that
    /// parses replaces the heuristic document even when it is still
    /// invalid; the returned outcome carries whatever errors remain.
    pub fn repair(&self, document: Value) -> RepairOutcome {
        let errors = validate(&document);
        if errors.is_empty() {
            return RepairOutcome {
                document,
                applied: Vec::new(),
                remaining: Vec::new(),
            };
        }

        let (mut repaired, mut applied) = heuristic_repair(document);
        let mut remaining = validate(&repaired);
        if remaining.is_empty() {
            return RepairOutcome {
                document: repaired,
                applied,
                remaining,
            };
        }

        if let Some(client) = &self.strategy {
            for attempt in 1..=self.config.max_attempts {
                tracing::debug!(attempt, errors = remaining.len(), "Generative repair attempt");
                let prompt = build_repair_prompt(&repaired, &remaining);
                let raw = match client.generate(&prompt, 0.0, REPAIR_MAX_TOKENS) {
                    Ok(raw) => raw,
                    Err(e) => {
                        applied.push(format!("Generative repair attempt failed: {e}"));
                        break;
                    }
                };
                let Some(mut candidate) = clean_to_json(&raw) else {
                    applied.push("Generative repair produced non-JSON output.".into());
                    break;
                };
                stamp_generative_repair(&mut candidate);
                applied.push("Generative repair attempted.".into());

                // A parsed candidate replaces the heuristic document even
                // when it is still invalid; only parse failures keep the
                // heuristic result.
                remaining = validate(&candidate);
                repaired = candidate;
                if remaining.is_empty() {
                    break;
                }
            }
        }

        RepairOutcome {
            document: repaired,
            applied,
            remaining,
        }
    }
}

impl Default for Repairer {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic, auditable repairs: required-field placeholders, authors
/// coercion, result-record normalization. Every change is logged both in
/// the returned list and on `_meta.repair_log`.
fn heuristic_repair(document: Value) -> (Value, Vec<String>) {
    let mut repairs: Vec<String> = Vec::new();

    let mut repaired = match document {
        Value::Object(map) => map,
        _ => {
            repairs.push("Root was not an object; replaced with an empty one.".into());
            Map::new()
        }
    };

    let required_defaults: [(&str, Value); 5] = [
        ("title", json!(REPAIRED_TITLE)),
        ("authors", json!([])),
        ("year", json!(Utc::now().year())),
        ("summary", json!(REPAIRED_SUMMARY)),
        ("evidence", json!({})),
    ];
    for (field, default) in required_defaults {
        let missing = repaired.get(field).map_or(true, Value::is_null);
        if missing {
            repaired.insert(field.to_string(), default);
            repairs.push(format!("Inserted placeholder for required field '{field}'."));
        }
    }

    if let Some(Value::Array(results)) = repaired.get_mut("results") {
        for (i, record) in results.iter_mut().enumerate() {
            if record.is_object() {
                let before = record.get("value").cloned();
                normalize_result_record(record);
                let after = record.get("value").cloned();
                if before != after {
                    repairs.push(format!(
                        "Normalized numeric value in results[{i}] from {} to {}.",
                        before.unwrap_or(Value::Null),
                        after.unwrap_or(Value::Null)
                    ));
                }
            }
        }
    }

    // A scalar authors value becomes a one-element list rather than data loss.
    let coerced = match repaired.get("authors") {
        Some(Value::Array(_)) => None,
        Some(Value::String(s)) if !s.is_empty() => Some(json!([s])),
        _ => Some(json!([])),
    };
    if let Some(authors) = coerced {
        repaired.insert("authors".into(), authors);
        repairs.push("Normalized 'authors' to a list.".into());
    }

    let meta = repaired
        .entry("_meta")
        .or_insert_with(|| json!({}));
    if !meta.is_object() {
        *meta = json!({});
    }
    if let Some(meta) = meta.as_object_mut() {
        let log = meta
            .entry("repair_log")
            .or_insert_with(|| json!([]));
        if !log.is_array() {
            *log = json!([]);
        }
        if let Some(log) = log.as_array_mut() {
            log.extend(repairs.iter().map(|r| json!(r)));
        }
        meta.insert("repaired_at".into(), json!(Utc::now().to_rfc3339()));
    }

    (Value::Object(repaired), repairs)
}

fn stamp_generative_repair(candidate: &mut Value) {
    if let Some(map) = candidate.as_object_mut() {
        let meta = map.entry("_meta").or_insert_with(|| json!({}));
        if !meta.is_object() {
            *meta = json!({});
        }
        if let Some(meta) = meta.as_object_mut() {
            meta.insert("from_llm".into(), json!(true));
            meta.insert("llm_repaired_at".into(), json!(Utc::now().to_rfc3339()));
        }
    }
}

fn build_repair_prompt(document: &Value, errors: &[String]) -> String {
    let listed = errors
        .iter()
        .take(MAX_ERRORS_IN_PROMPT)
        .map(|e| format!("- {e}"))
        .collect::<Vec<_>>()
        .join("\n");
    let rendered = serde_json::to_string_pretty(document).unwrap_or_else(|_| "{}".into());
    format!(
        "You are a strict JSON repair agent. The following JSON failed \
         structural validation for a research-paper record.\n\
         Validator errors:\n{listed}\n\n\
         Return ONLY the repaired JSON object, no commentary. Use conservative \
         placeholder tokens for missing values and describe each change in a \
         top-level _meta.repair_log array.\n\n\
         INPUT JSON:\n{rendered}\n\nOUTPUT:\n"
    )
}

#[cfg(test)]
mod tests {
    use super::super::llm::CannedLlm;
    use super::*;

    #[test]
    fn valid_document_passes_through_untouched() {
        let doc = json!({
            "title": "T", "authors": ["A"], "year": 2023,
            "summary": "S", "evidence": {}
        });
        let outcome = Repairer::new().repair(doc.clone());
        assert_eq!(outcome.document, doc);
        assert!(outcome.applied.is_empty());
        assert!(outcome.remaining.is_empty());
    }

    #[test]
    fn empty_object_validates_after_heuristics_alone() {
        let outcome = Repairer::new().repair(json!({}));
        assert!(outcome.remaining.is_empty(), "{:?}", outcome.remaining);
        assert_eq!(outcome.document["title"], REPAIRED_TITLE);
        assert_eq!(outcome.document["summary"], REPAIRED_SUMMARY);
        assert_eq!(outcome.document["authors"], json!([]));
        assert_eq!(outcome.document["evidence"], json!({}));
        assert!(outcome.document["_meta"]["repaired_at"].is_string());
        assert!(!outcome.applied.is_empty());
    }

    #[test]
    fn non_object_root_is_replaced() {
        let outcome = Repairer::new().repair(json!("not a document"));
        assert!(outcome.remaining.is_empty());
        assert_eq!(outcome.document["title"], REPAIRED_TITLE);
    }

    #[test]
    fn scalar_authors_becomes_single_element_list() {
        let outcome = Repairer::new().repair(json!({
            "title": "T", "authors": "Jane Doe", "year": 2023,
            "summary": "S", "evidence": {}
        }));
        assert_eq!(outcome.document["authors"], json!(["Jane Doe"]));
        assert!(outcome.remaining.is_empty());
    }

    #[test]
    fn string_result_values_are_normalized() {
        let outcome = Repairer::new().repair(json!({
            "authors": ["A"],
            "results": [{"dataset": "D", "metric": "Accuracy", "value": "78.4 %"}]
        }));
        assert_eq!(outcome.document["results"][0]["value"], json!(78.4));
        assert_eq!(outcome.document["results"][0]["unit"], "%");
        assert!(outcome
            .applied
            .iter()
            .any(|r| r.contains("results[0]")));
    }

    #[test]
    fn generative_strategy_fixes_what_heuristics_cannot() {
        // year as a non-numeric string survives heuristics (field present,
        // not null) and needs the generative pass.
        let broken = json!({
            "title": "T", "authors": ["A"], "year": "two thousand",
            "summary": "S", "evidence": {}
        });
        let fixed = json!({
            "title": "T", "authors": ["A"], "year": 2023,
            "summary": "S", "evidence": {}
        })
        .to_string();

        let repairer =
            Repairer::with_strategy(Box::new(CannedLlm::new(&fixed)), RepairConfig::default());
        let outcome = repairer.repair(broken);
        assert!(outcome.remaining.is_empty(), "{:?}", outcome.remaining);
        assert_eq!(outcome.document["year"], 2023);
        assert_eq!(outcome.document["_meta"]["from_llm"], true);
        assert!(outcome.applied.iter().any(|r| r.contains("Generative")));
    }

    #[test]
    fn parsed_but_still_invalid_candidate_is_adopted() {
        let broken = json!({
            "title": "T", "authors": ["A"], "year": "two thousand",
            "summary": "S", "evidence": {}
        });
        // Parses, but drops required fields; it must still win over the
        // heuristic document.
        let still_invalid = json!({"title": "From the model", "year": 2023}).to_string();

        let repairer = Repairer::with_strategy(
            Box::new(CannedLlm::new(&still_invalid)),
            RepairConfig::default(),
        );
        let outcome = repairer.repair(broken);
        assert!(!outcome.remaining.is_empty());
        assert_eq!(outcome.document["title"], "From the model");
        assert_eq!(outcome.document["year"], 2023);
        assert_eq!(outcome.document["_meta"]["from_llm"], true);
    }

    #[test]
    fn failed_generative_parse_keeps_heuristic_document() {
        let broken = json!({
            "title": "T", "authors": ["A"], "year": "two thousand",
            "summary": "S", "evidence": {}
        });
        let repairer = Repairer::with_strategy(
            Box::new(CannedLlm::new("I cannot fix this.")),
            RepairConfig::default(),
        );
        let outcome = repairer.repair(broken);
        assert!(!outcome.remaining.is_empty());
        assert_eq!(outcome.document["title"], "T");
        assert!(outcome
            .applied
            .iter()
            .any(|r| r.contains("non-JSON")));
    }
}
