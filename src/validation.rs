//! Structural validation of candidate paper documents.
//!
//! `validate` is a pure function over raw JSON: it returns a list of
//! `"<path>: <message>"` strings and never panics, so the repair loop can
//! use the error list as a deterministic termination check. The `_meta`
//! side-channel is ignored — it is not part of the public schema.

use serde_json::Value;

/// Validate a candidate document against the paper contract.
///
/// Empty list means the document is structurally valid.
pub fn validate(document: &Value) -> Vec<String> {
    let mut errors = Vec::new();

    let Some(obj) = document.as_object() else {
        errors.push("(root): document is not a JSON object".into());
        return errors;
    };

    // Required fields.
    require_string(obj, "title", &mut errors);
    require_string_array(obj, "authors", &mut errors);
    require_integer(obj, "year", &mut errors);
    require_string(obj, "summary", &mut errors);

    match obj.get("evidence") {
        None | Some(Value::Null) => {
            errors.push("evidence: required field is missing".into());
        }
        Some(Value::Object(map)) => {
            for (field, items) in map {
                check_evidence_items(field, items, &mut errors);
            }
        }
        Some(_) => errors.push("evidence: expected an object".into()),
    }

    // Optional scalar fields.
    optional_string(obj, "venue", &mut errors);
    optional_string(obj, "arxiv_id", &mut errors);
    optional_string(obj, "limitations", &mut errors);
    optional_string(obj, "ethics", &mut errors);
    optional_string(obj, "novelty", &mut errors);

    // Optional list fields.
    optional_string_array(obj, "tasks", &mut errors);
    optional_string_array(obj, "ablations", &mut errors);

    if let Some(methods) = non_null(obj.get("methods")) {
        match methods.as_array() {
            Some(items) => {
                for (i, m) in items.iter().enumerate() {
                    check_method(i, m, &mut errors);
                }
            }
            None => errors.push("methods: expected an array".into()),
        }
    }

    if let Some(results) = non_null(obj.get("results")) {
        match results.as_array() {
            Some(items) => {
                for (i, r) in items.iter().enumerate() {
                    check_result_record(i, r, &mut errors);
                }
            }
            None => errors.push("results: expected an array".into()),
        }
    }

    if let Some(datasets) = non_null(obj.get("datasets")) {
        if !datasets.is_array() {
            errors.push("datasets: expected an array".into());
        }
    }

    if let Some(open_source) = non_null(obj.get("open_source")) {
        if !open_source.is_object() {
            errors.push("open_source: expected an object".into());
        }
    }

    // Top-level confidence map: field -> score in [0,1] or null.
    if let Some(confidence) = non_null(obj.get("confidence")) {
        match confidence.as_object() {
            Some(map) => {
                for (field, score) in map {
                    if !score.is_null() {
                        match score.as_f64() {
                            Some(v) if (0.0..=1.0).contains(&v) => {}
                            Some(v) => {
                                errors.push(format!("confidence.{field}: {v} is outside [0,1]"))
                            }
                            None => errors.push(format!(
                                "confidence.{field}: expected a number or null"
                            )),
                        }
                    }
                }
            }
            None => errors.push("confidence: expected an object".into()),
        }
    }

    errors
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn require_string(obj: &serde_json::Map<String, Value>, field: &str, errors: &mut Vec<String>) {
    match obj.get(field) {
        None | Some(Value::Null) => errors.push(format!("{field}: required field is missing")),
        Some(Value::String(_)) => {}
        Some(_) => errors.push(format!("{field}: expected a string")),
    }
}

fn require_integer(obj: &serde_json::Map<String, Value>, field: &str, errors: &mut Vec<String>) {
    // Integral floats (2023.0) count as integers.
    match obj.get(field) {
        None | Some(Value::Null) => errors.push(format!("{field}: required field is missing")),
        Some(v) if v.is_i64() || v.is_u64() => {}
        Some(v) if v.as_f64().is_some_and(|f| f.fract() == 0.0) => {}
        Some(_) => errors.push(format!("{field}: expected an integer")),
    }
}

fn require_string_array(
    obj: &serde_json::Map<String, Value>,
    field: &str,
    errors: &mut Vec<String>,
) {
    match obj.get(field) {
        None | Some(Value::Null) => errors.push(format!("{field}: required field is missing")),
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                if !item.is_string() {
                    errors.push(format!("{field}.{i}: expected a string"));
                }
            }
        }
        Some(_) => errors.push(format!("{field}: expected an array of strings")),
    }
}

fn optional_string(obj: &serde_json::Map<String, Value>, field: &str, errors: &mut Vec<String>) {
    if let Some(v) = non_null(obj.get(field)) {
        if !v.is_string() {
            errors.push(format!("{field}: expected a string or null"));
        }
    }
}

fn optional_string_array(
    obj: &serde_json::Map<String, Value>,
    field: &str,
    errors: &mut Vec<String>,
) {
    if let Some(v) = non_null(obj.get(field)) {
        match v.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        errors.push(format!("{field}.{i}: expected a string"));
                    }
                }
            }
            None => errors.push(format!("{field}: expected an array of strings")),
        }
    }
}

fn check_method(index: usize, method: &Value, errors: &mut Vec<String>) {
    let Some(obj) = method.as_object() else {
        errors.push(format!("methods.{index}: expected an object"));
        return;
    };
    match obj.get("name") {
        Some(Value::String(_)) => {}
        _ => errors.push(format!("methods.{index}.name: expected a string")),
    }
    if let Some(components) = non_null(obj.get("components")) {
        if !components.is_array() {
            errors.push(format!("methods.{index}.components: expected an array"));
        }
    }
}

fn check_result_record(index: usize, record: &Value, errors: &mut Vec<String>) {
    let Some(obj) = record.as_object() else {
        errors.push(format!("results.{index}: expected an object"));
        return;
    };
    match obj.get("dataset") {
        Some(Value::String(_)) => {}
        _ => errors.push(format!("results.{index}.dataset: expected a string")),
    }
    match obj.get("metric") {
        Some(Value::String(_)) => {}
        _ => errors.push(format!("results.{index}.metric: expected a string")),
    }
    match obj.get("value") {
        Some(v) if v.is_number() => {}
        _ => errors.push(format!("results.{index}.value: expected a number")),
    }
    if let Some(conf) = non_null(obj.get("confidence")) {
        match conf.as_f64() {
            Some(v) if (0.0..=1.0).contains(&v) => {}
            Some(v) => errors.push(format!("results.{index}.confidence: {v} is outside [0,1]")),
            None => errors.push(format!(
                "results.{index}.confidence: expected a number or null"
            )),
        }
    }
    if let Some(hib) = non_null(obj.get("higher_is_better")) {
        if !hib.is_boolean() {
            errors.push(format!(
                "results.{index}.higher_is_better: expected a boolean"
            ));
        }
    }
}

fn check_evidence_items(field: &str, items: &Value, errors: &mut Vec<String>) {
    let Some(list) = items.as_array() else {
        errors.push(format!("evidence.{field}: expected an array"));
        return;
    };
    for (i, item) in list.iter().enumerate() {
        let Some(obj) = item.as_object() else {
            errors.push(format!("evidence.{field}.{i}: expected an object"));
            continue;
        };
        match obj.get("page").and_then(Value::as_i64) {
            Some(p) if p >= 1 => {}
            Some(p) => errors.push(format!(
                "evidence.{field}.{i}.page: {p} is not a positive page number"
            )),
            None => errors.push(format!(
                "evidence.{field}.{i}.page: expected a positive integer"
            )),
        }
        if !obj.get("snippet").map(Value::is_string).unwrap_or(false) {
            errors.push(format!("evidence.{field}.{i}.snippet: expected a string"));
        }
    }
}
