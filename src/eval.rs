//! Self-evaluation metrics for extracted documents.
//!
//! These score a single document without a gold reference: how many core
//! fields are populated, whether the numeric results are internally
//! consistent, and how well the summary is supported by attached
//! evidence snippets.

use serde::Serialize;
use serde_json::Value;

use crate::evidence::locator::partial_ratio;

pub const CORE_FIELDS: [&str; 7] = [
    "title", "authors", "year", "methods", "results", "summary", "evidence",
];

/// Fraction of core fields populated with a non-empty value.
pub fn field_coverage(document: &Value) -> f64 {
    let present = CORE_FIELDS
        .iter()
        .filter(|field| is_populated(document.get(**field)))
        .count();
    present as f64 / CORE_FIELDS.len() as f64
}

fn is_populated(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(_) => true,
    }
}

/// Metric-name keywords driving range heuristics. The keyword table is
/// explicit configuration, not hard-coded string probes scattered through
/// the checks.
#[derive(Debug, Clone)]
pub struct ConsistencyConfig {
    /// Metrics whose values are percentages in [0, 100].
    pub percent_keywords: Vec<String>,
    /// Metrics reported either as a ratio in [0, 1] or a percentage.
    pub ratio_keywords: Vec<String>,
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            percent_keywords: vec!["percent".into()],
            ratio_keywords: vec![
                "accuracy".into(),
                "precision".into(),
                "recall".into(),
                "f1".into(),
            ],
        }
    }
}

impl ConsistencyConfig {
    fn is_percent_metric(&self, metric: &str) -> bool {
        self.percent_keywords.iter().any(|k| metric.contains(k.as_str()))
    }

    fn is_ratio_metric(&self, metric: &str) -> bool {
        self.ratio_keywords.iter().any(|k| metric.contains(k.as_str()))
    }
}

/// Outcome of the internal consistency checks over a document's results.
#[derive(Debug, Serialize)]
pub struct ConsistencyReport {
    /// `passed / total`, `None` when there was nothing to check.
    pub consistency_score: Option<f64>,
    pub total_checks: usize,
    pub passed_checks: usize,
    pub failed_checks: Vec<String>,
}

/// Check internal consistency of the document's numeric results.
///
/// Per record: value is numeric; percent and ratio metrics fall in their
/// expected ranges; confidence is in [0,1]; when a baseline record is
/// present, the `higher_is_better` ordering holds. Across records: one
/// metric keeps one unit.
pub fn numeric_consistency_check(document: &Value, config: &ConsistencyConfig) -> ConsistencyReport {
    let results = match document.get("results").and_then(Value::as_array) {
        Some(results) if !results.is_empty() => results,
        _ => {
            return ConsistencyReport {
                consistency_score: None,
                total_checks: 0,
                passed_checks: 0,
                failed_checks: Vec::new(),
            }
        }
    };

    let mut total = 0usize;
    let mut passed = 0usize;
    let mut failed: Vec<String> = Vec::new();
    let mut metric_units: Vec<(String, Option<String>)> = Vec::new();

    for (idx, record) in results.iter().enumerate() {
        let Some(record) = record.as_object() else {
            continue;
        };
        let metric = record
            .get("metric")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_lowercase();
        let unit = record.get("unit").and_then(Value::as_str);
        let value = record.get("value").and_then(Value::as_f64);

        total += 1;
        let Some(value) = value else {
            failed.push(format!("results[{idx}]: value is missing or not numeric"));
            continue;
        };
        passed += 1;

        if unit.is_some() || config.is_ratio_metric(&metric) || config.is_percent_metric(&metric) {
            total += 1;
            let in_range = if unit == Some("%") || config.is_percent_metric(&metric) {
                (0.0..=100.0).contains(&value)
            } else if config.is_ratio_metric(&metric) {
                (0.0..=1.0).contains(&value) || (0.0..=100.0).contains(&value)
            } else {
                true
            };
            if in_range {
                passed += 1;
            } else {
                failed.push(format!(
                    "results[{idx}]: metric '{metric}' value {value} outside expected range"
                ));
            }
        }

        if let Some(confidence) = record.get("confidence").filter(|c| !c.is_null()) {
            total += 1;
            match confidence.as_f64() {
                Some(c) if (0.0..=1.0).contains(&c) => passed += 1,
                Some(c) => {
                    failed.push(format!("results[{idx}]: confidence {c} outside [0,1]"))
                }
                None => failed.push(format!("results[{idx}]: confidence is not numeric")),
            }
        }

        let baseline = record.get("baseline").and_then(Value::as_str);
        let higher_is_better = record.get("higher_is_better").and_then(Value::as_bool);
        if let (Some(baseline), Some(higher_is_better)) = (baseline, higher_is_better) {
            if let Some(baseline_value) = find_baseline_value(results, baseline) {
                total += 1;
                let holds = if higher_is_better {
                    value >= baseline_value
                } else {
                    value <= baseline_value
                };
                if holds {
                    passed += 1;
                } else {
                    failed.push(format!(
                        "results[{idx}]: higher_is_better={higher_is_better} but ours \
                         ({value}) vs baseline ({baseline_value}) violates it"
                    ));
                }
            }
        }

        if !metric.is_empty() {
            metric_units.push((metric, unit.map(str::to_string)));
        }
    }

    // One metric, one unit.
    let mut seen: Vec<&str> = Vec::new();
    for (metric, _) in &metric_units {
        if seen.contains(&metric.as_str()) {
            continue;
        }
        seen.push(metric);
        let units: Vec<&String> = metric_units
            .iter()
            .filter(|(m, u)| m == metric && u.is_some())
            .filter_map(|(_, u)| u.as_ref())
            .collect();
        if units.len() > 1 {
            let mut distinct = units.clone();
            distinct.sort();
            distinct.dedup();
            total += 1;
            if distinct.len() > 1 {
                failed.push(format!(
                    "metric '{metric}' has inconsistent units: {distinct:?}"
                ));
            } else {
                passed += 1;
            }
        }
    }

    let consistency_score = if total > 0 {
        Some(passed as f64 / total as f64)
    } else {
        None
    };
    ConsistencyReport {
        consistency_score,
        total_checks: total,
        passed_checks: passed,
        failed_checks: failed,
    }
}

/// The baseline system's own result row is the record whose `ours_is`
/// names it. Matching a record's `baseline` field would let a record
/// find itself.
fn find_baseline_value(results: &[Value], baseline: &str) -> Option<f64> {
    let baseline = baseline.trim().to_lowercase();
    results.iter().find_map(|other| {
        let record = other.as_object()?;
        let name = record.get("ours_is").and_then(Value::as_str)?;
        if name.trim().to_lowercase() == baseline {
            record.get("value").and_then(Value::as_f64)
        } else {
            None
        }
    })
}

/// How well the summary is supported by attached evidence: best fuzzy
/// partial-ratio (0..100) between the summary's first 200 characters and
/// any evidence snippet. `None` when summary or evidence is absent.
pub fn summary_alignment(document: &Value) -> Option<f64> {
    let summary = document.get("summary").and_then(Value::as_str)?;
    if summary.trim().is_empty() {
        return None;
    }
    let head: String = summary.chars().take(200).collect();

    let evidence = document.get("evidence").and_then(Value::as_object)?;
    let mut best: Option<f64> = None;
    for items in evidence.values().filter_map(Value::as_array) {
        for item in items {
            let Some(snippet) = item.get("snippet").and_then(Value::as_str) else {
                continue;
            };
            let score = partial_ratio(&head, snippet);
            if best.map_or(true, |b| score > b) {
                best = Some(score);
            }
        }
    }
    best
}
