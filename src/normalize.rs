//! Number/unit normalization for loosely formatted result values.
//!
//! Model output frequently reports values as strings ("78.4%", "0.921",
//! "about 92 points"). This module pulls out the first signed decimal token
//! and a percent unit when one is present. Normalization is idempotent:
//! re-normalizing an already-normalized record changes nothing.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[+-]?\d+(?:\.\d+)?").expect("number regex"));

/// Parse a loosely formatted numeric string into `(value, unit)`.
///
/// - `"92.1%"` → `(Some(92.1), Some("%"))`
/// - `"0.921"` → `(Some(0.921), None)`
/// - free text containing one numeric token → first token, no unit
/// - no numeric token → `(None, None)`
pub fn parse_number_string(text: &str) -> (Option<f64>, Option<&'static str>) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return (None, None);
    }

    let unit = if trimmed.contains('%') { Some("%") } else { None };

    match NUMBER_RE.find(trimmed) {
        Some(m) => match m.as_str().parse::<f64>() {
            Ok(v) => (Some(v), unit),
            Err(_) => (None, None),
        },
        None => (None, None),
    }
}

/// Normalize one result record in place.
///
/// Overwrites `value` with the parsed float, sets `unit` only when a unit was
/// newly detected, and canonicalizes any unit string containing `%` to exactly
/// `"%"`. Records without a usable `value` are left untouched.
pub fn normalize_result_record(record: &mut Value) {
    let Some(obj) = record.as_object_mut() else {
        return;
    };

    let parsed = match obj.get("value") {
        Some(Value::String(s)) => parse_number_string(s),
        Some(Value::Number(n)) => (n.as_f64(), None),
        _ => (None, None),
    };

    if let (Some(v), unit) = parsed {
        if let Some(num) = serde_json::Number::from_f64(v) {
            obj.insert("value".into(), Value::Number(num));
        }
        if let Some(u) = unit {
            obj.insert("unit".into(), Value::String(u.into()));
        }
    }

    // Canonicalize "percent"-ish unit spellings to exactly "%".
    let percent_spelling = matches!(
        obj.get("unit"),
        Some(Value::String(u)) if u.contains('%') && u != "%"
    );
    if percent_spelling {
        obj.insert("unit".into(), Value::String("%".into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_percent_string() {
        assert_eq!(parse_number_string("92.1%"), (Some(92.1), Some("%")));
        assert_eq!(parse_number_string(" 78.4 % "), (Some(78.4), Some("%")));
    }

    #[test]
    fn parses_plain_decimal() {
        assert_eq!(parse_number_string("0.921"), (Some(0.921), None));
        assert_eq!(parse_number_string("-3.5"), (Some(-3.5), None));
    }

    #[test]
    fn parses_first_token_from_free_text() {
        assert_eq!(
            parse_number_string("accuracy of 78.4 on the test split"),
            (Some(78.4), None)
        );
    }

    #[test]
    fn percent_anywhere_forces_percent_unit() {
        assert_eq!(
            parse_number_string("roughly 12 % better"),
            (Some(12.0), Some("%"))
        );
    }

    #[test]
    fn no_numeric_token_yields_none() {
        assert_eq!(parse_number_string(""), (None, None));
        assert_eq!(parse_number_string("no numbers here"), (None, None));
    }

    #[test]
    fn normalizes_string_value_and_unit() {
        let mut rec = json!({"dataset": "D", "metric": "Accuracy", "value": "78.4%"});
        normalize_result_record(&mut rec);
        assert_eq!(rec["value"], json!(78.4));
        assert_eq!(rec["unit"], json!("%"));
    }

    #[test]
    fn preserves_existing_unit_for_plain_number() {
        let mut rec = json!({"value": "0.921", "unit": "F1"});
        normalize_result_record(&mut rec);
        assert_eq!(rec["value"], json!(0.921));
        assert_eq!(rec["unit"], json!("F1"));
    }

    #[test]
    fn canonicalizes_percent_unit_spelling() {
        let mut rec = json!({"value": 55.0, "unit": "% accuracy"});
        normalize_result_record(&mut rec);
        assert_eq!(rec["unit"], json!("%"));
    }

    #[test]
    fn normalization_is_idempotent() {
        let mut rec = json!({"dataset": "D", "metric": "Acc", "value": "78.4%"});
        normalize_result_record(&mut rec);
        let once = rec.clone();
        normalize_result_record(&mut rec);
        assert_eq!(rec, once);
    }

    #[test]
    fn leaves_unparseable_record_untouched() {
        let mut rec = json!({"value": "n/a"});
        let before = rec.clone();
        normalize_result_record(&mut rec);
        assert_eq!(rec, before);
    }

    #[test]
    fn non_object_record_is_a_no_op() {
        let mut rec = json!("not an object");
        normalize_result_record(&mut rec);
        assert_eq!(rec, json!("not an object"));
    }
}
