//! Deterministic combination of head outputs into one candidate document.
//!
//! Field ownership is fixed and non-overlapping: metadata owns the
//! bibliographic fields, methods/results own their lists, limitations owns
//! limitations/ethics, summary owns summary. Missing heads never fail the
//! merge; required fields get conservative placeholders and the fill is
//! recorded in the repair log.

use std::collections::BTreeMap;

use chrono::{Datelike, Utc};
use serde_json::{json, Map, Value};

use crate::models::{HeadKind, HeadOutput};
use crate::validation::validate;

use super::PipelineError;

pub const PLACEHOLDER_TITLE: &str = "Untitled (placeholder)";
pub const PLACEHOLDER_SUMMARY: &str = "Summary unavailable (placeholder).";

/// Merge head outputs into a candidate document.
///
/// Returns the document and the list of placeholder repairs applied (also
/// appended to `_meta.repair_log` on the document). The assembled document
/// is re-validated; an invalid shape after placeholder fills signals a
/// defect in the merge itself and propagates as an error.
pub fn merge_heads(
    outputs: &BTreeMap<HeadKind, HeadOutput>,
) -> Result<(Value, Vec<String>), PipelineError> {
    let mut paper = Map::new();
    let mut repairs: Vec<String> = Vec::new();

    // Metadata head is authoritative for bibliographic fields.
    if let Some(HeadOutput::Metadata(meta)) = outputs.get(&HeadKind::Metadata) {
        paper.insert("title".into(), opt_str(&meta.title));
        paper.insert("authors".into(), json!(meta.authors));
        paper.insert("year".into(), json!(meta.year));
        paper.insert("venue".into(), opt_str(&meta.venue));
        paper.insert("arxiv_id".into(), opt_str(&meta.arxiv_id));
    } else {
        paper.insert("title".into(), Value::Null);
        paper.insert("authors".into(), json!([]));
        paper.insert("year".into(), Value::Null);
    }

    let methods = match outputs.get(&HeadKind::Methods) {
        Some(HeadOutput::Methods(m)) => json!(m.methods),
        _ => json!([]),
    };
    paper.insert("methods".into(), methods);

    let mut result_confidences: Vec<f64> = Vec::new();
    let results = match outputs.get(&HeadKind::Results) {
        Some(HeadOutput::Results(r)) => {
            result_confidences.extend(r.results.iter().filter_map(|rec| rec.confidence));
            json!(r.results)
        }
        _ => json!([]),
    };
    paper.insert("results".into(), results);

    if let Some(HeadOutput::Limitations(lim)) = outputs.get(&HeadKind::Limitations) {
        paper.insert("limitations".into(), opt_str(&lim.limitations));
        paper.insert("ethics".into(), opt_str(&lim.ethics));
    } else {
        paper.insert("limitations".into(), Value::Null);
        paper.insert("ethics".into(), Value::Null);
    }

    let summary = match outputs.get(&HeadKind::Summary) {
        Some(HeadOutput::Summary(s)) if !s.summary.is_empty() => json!(s.summary),
        _ => Value::Null,
    };
    paper.insert("summary".into(), summary);

    // Conservative placeholder fills for the required fields.
    if !paper.get("title").is_some_and(is_nonempty_string) {
        paper.insert("title".into(), json!(PLACEHOLDER_TITLE));
        repairs.push("Inserted placeholder title because the backend returned none.".into());
    }
    if !paper.get("authors").is_some_and(Value::is_array) {
        paper.insert("authors".into(), json!([]));
        repairs.push("Normalized authors list from invalid backend output.".into());
    }
    if paper.get("year").map_or(true, Value::is_null) {
        paper.insert("year".into(), json!(Utc::now().year()));
        repairs.push("Filled missing year with current-year placeholder.".into());
    }
    if !paper.get("summary").is_some_and(is_nonempty_string) {
        paper.insert("summary".into(), json!(PLACEHOLDER_SUMMARY));
        repairs.push("Inserted placeholder summary because the backend returned none.".into());
    }

    // Shallow confidence aggregation: metadata is rule-merged (1.0),
    // results average their per-record confidences when any are present.
    let results_confidence = if result_confidences.is_empty() {
        Value::Null
    } else {
        json!(result_confidences.iter().sum::<f64>() / result_confidences.len() as f64)
    };
    paper.insert(
        "confidence".into(),
        json!({ "metadata": 1.0, "results": results_confidence }),
    );

    // Evidence starts empty; the locator populates it later.
    paper.insert("evidence".into(), json!({}));

    for (field, default) in [
        ("tasks", json!([])),
        ("datasets", json!([])),
        ("ablations", json!([])),
        ("open_source", Value::Null),
        ("novelty", Value::Null),
    ] {
        paper.entry(field.to_string()).or_insert(default);
    }

    if !repairs.is_empty() {
        paper.insert("_meta".into(), json!({ "repair_log": repairs.clone() }));
    }

    let document = Value::Object(paper);
    let errors = validate(&document);
    if !errors.is_empty() {
        return Err(PipelineError::MergedDocumentInvalid(errors));
    }

    Ok((document, repairs))
}

fn opt_str(value: &Option<String>) -> Value {
    match value {
        Some(s) => json!(s),
        None => Value::Null,
    }
}

fn is_nonempty_string(value: &Value) -> bool {
    value.as_str().is_some_and(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        LimitationsOutput, MetadataOutput, MethodsOutput, ResultsOutput, SummaryOutput,
    };

    fn full_outputs() -> BTreeMap<HeadKind, HeadOutput> {
        let mut outputs = BTreeMap::new();
        outputs.insert(
            HeadKind::Metadata,
            HeadOutput::Metadata(MetadataOutput {
                title: Some("Hybrid Attention".into()),
                authors: vec!["A. Author".into()],
                year: Some(2023),
                venue: Some("Conf".into()),
                arxiv_id: None,
            }),
        );
        outputs.insert(
            HeadKind::Results,
            HeadOutput::Results(
                serde_json::from_value::<ResultsOutput>(json!([
                    {"dataset": "D", "metric": "Accuracy", "value": 78.4, "confidence": 0.9},
                    {"dataset": "D", "metric": "F1", "value": 0.7, "confidence": 0.7}
                ]))
                .unwrap(),
            ),
        );
        outputs.insert(
            HeadKind::Limitations,
            HeadOutput::Limitations(LimitationsOutput {
                limitations: Some("Small datasets only.".into()),
                ethics: None,
            }),
        );
        outputs.insert(
            HeadKind::Summary,
            HeadOutput::Summary(SummaryOutput {
                summary: "A short summary.".into(),
            }),
        );
        outputs.insert(
            HeadKind::Methods,
            HeadOutput::Methods(MethodsOutput::default()),
        );
        outputs
    }

    #[test]
    fn full_heads_merge_without_repairs() {
        let (doc, repairs) = merge_heads(&full_outputs()).unwrap();
        assert!(repairs.is_empty());
        assert_eq!(doc["title"], "Hybrid Attention");
        assert_eq!(doc["year"], 2023);
        assert_eq!(doc["results"][0]["value"], json!(78.4));
        assert!(doc.get("_meta").is_none());
    }

    #[test]
    fn empty_heads_yield_placeholder_document() {
        let (doc, repairs) = merge_heads(&BTreeMap::new()).unwrap();
        assert_eq!(doc["title"], PLACEHOLDER_TITLE);
        assert_eq!(doc["authors"], json!([]));
        assert_eq!(doc["year"], json!(Utc::now().year()));
        assert_eq!(doc["summary"], PLACEHOLDER_SUMMARY);
        assert_eq!(doc["evidence"], json!({}));
        assert_eq!(repairs.len(), 3);
        assert_eq!(doc["_meta"]["repair_log"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn merged_document_always_validates() {
        // Every subset of present heads must produce a valid document.
        let full = full_outputs();
        for skip in HeadKind::ALL {
            let subset: BTreeMap<_, _> = full
                .iter()
                .filter(|(k, _)| **k != skip)
                .map(|(k, v)| (*k, v.clone()))
                .collect();
            let (doc, _) = merge_heads(&subset).unwrap();
            assert!(crate::validation::validate(&doc).is_empty(), "skip={skip}");
        }
    }

    #[test]
    fn confidence_averages_result_records() {
        let (doc, _) = merge_heads(&full_outputs()).unwrap();
        assert_eq!(doc["confidence"]["metadata"], json!(1.0));
        let avg = doc["confidence"]["results"].as_f64().unwrap();
        assert!((avg - 0.8).abs() < 1e-9);
    }

    #[test]
    fn confidence_is_null_without_result_confidences() {
        let (doc, _) = merge_heads(&BTreeMap::new()).unwrap();
        assert_eq!(doc["confidence"]["results"], Value::Null);
    }
}
