//! Evidence search over parsed pages.
//!
//! Matching runs in priority order per query: exact case-insensitive
//! substring in a block, fuzzy partial-ratio against the block, then the
//! same two at whole-page granularity. Numeric results get a dedicated
//! search ("<value> %" literal when the unit is percent, then any numeric
//! token within tolerance) before the dataset+metric text fallback.
//!
//! Pages are scanned in natural order and the first sufficiently
//! confident match wins. This biases evidence toward earlier pages; a
//! stronger match later in the paper is deliberately not preferred.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use crate::models::Page;

use super::{EvidenceConfig, EvidenceDetails, EvidenceReport};

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[+-]?\d+(?:\.\d+)?").unwrap_or_else(|e| panic!("numeric regex: {e}"))
});

/// One located piece of evidence.
#[derive(Debug)]
pub struct PageMatch {
    pub page: u32,
    pub snippet: String,
    pub score: f64,
}

/// Attach grounding evidence to `document` in place and report coverage.
///
/// Five claim categories are checked: title, each method (name, falling
/// back to its components), each numeric result, limitations, and the
/// first 200 characters of the summary. Existing evidence entries are
/// preserved; findings are appended.
pub fn attach_evidence(
    document: &mut Value,
    pages: &[Page],
    config: &EvidenceConfig,
) -> EvidenceReport {
    let mut found = 0usize;
    let mut missing = 0usize;
    let mut details = EvidenceDetails::default();
    let mut additions: Vec<(&'static str, PageMatch)> = Vec::new();

    let title = document
        .get("title")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty());
    if let Some(title) = title {
        match find_query_in_pages(pages, title, config) {
            Some(m) => {
                additions.push(("title", m));
                found += 1;
                details.title = Some(true);
            }
            None => {
                missing += 1;
                details.title = Some(false);
            }
        }
    }

    for method in iter_records(document, "methods") {
        let by_name = method
            .get("name")
            .and_then(Value::as_str)
            .and_then(|name| find_query_in_pages(pages, name, config));
        let hit = by_name.or_else(|| {
            method
                .get("components")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
                .find_map(|comp| find_query_in_pages(pages, comp, config))
        });
        match hit {
            Some(m) => {
                additions.push(("methods", m));
                found += 1;
                details.methods.push(true);
            }
            None => {
                missing += 1;
                details.methods.push(false);
            }
        }
    }

    for record in iter_records(document, "results") {
        let numeric = record.get("value").and_then(Value::as_f64).and_then(|value| {
            let unit = record.get("unit").and_then(Value::as_str);
            find_numeric_in_pages(pages, value, unit, config)
        });
        let hit = numeric.or_else(|| {
            let dataset = record.get("dataset").and_then(Value::as_str).unwrap_or("");
            let metric = record.get("metric").and_then(Value::as_str).unwrap_or("");
            let query = format!("{dataset} {metric}");
            let query = query.trim();
            if query.is_empty() {
                None
            } else {
                find_query_in_pages(pages, query, config)
            }
        });
        match hit {
            Some(m) => {
                additions.push(("results", m));
                found += 1;
                details.results.push(true);
            }
            None => {
                missing += 1;
                details.results.push(false);
            }
        }
    }

    let limitations = document
        .get("limitations")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty());
    if let Some(limitations) = limitations {
        match find_query_in_pages(pages, limitations, config) {
            Some(m) => {
                additions.push(("limitations", m));
                found += 1;
                details.limitations = Some(true);
            }
            None => {
                missing += 1;
                details.limitations = Some(false);
            }
        }
    }

    let summary = document
        .get("summary")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty());
    if let Some(summary) = summary {
        let head: String = summary.chars().take(200).collect();
        match find_query_in_pages(pages, &head, config) {
            Some(m) => {
                additions.push(("summary", m));
                found += 1;
                details.summary = Some(true);
            }
            None => {
                missing += 1;
                details.summary = Some(false);
            }
        }
    }

    append_evidence(document, additions);
    EvidenceReport::finish(found, missing, details)
}

/// Search pages for `query`: blocks first, then whole-page text.
pub fn find_query_in_pages(
    pages: &[Page],
    query: &str,
    config: &EvidenceConfig,
) -> Option<PageMatch> {
    if query.is_empty() {
        return None;
    }
    let query = collapse_whitespace(query);

    for page in pages {
        for block in &page.blocks {
            if block.text.is_empty() {
                continue;
            }
            if let Some((start, end)) = find_ci(&block.text, &query) {
                return Some(PageMatch {
                    page: page.page_no,
                    snippet: snippet_around(&block.text, start, end, config.snippet_window),
                    score: 100.0,
                });
            }
            let score = partial_ratio(&query, &block.text);
            if score >= config.fuzzy_threshold {
                return Some(PageMatch {
                    page: page.page_no,
                    snippet: leading_snippet(&block.text, config.snippet_window),
                    score,
                });
            }
        }

        let text = page.search_text();
        if text.is_empty() {
            continue;
        }
        if let Some((start, end)) = find_ci(text, &query) {
            return Some(PageMatch {
                page: page.page_no,
                snippet: snippet_around(text, start, end, config.snippet_window),
                score: 100.0,
            });
        }
        let score = partial_ratio(&query, text);
        if score >= config.fuzzy_threshold {
            return Some(PageMatch {
                page: page.page_no,
                snippet: leading_snippet(text, config.snippet_window),
                score,
            });
        }
    }
    None
}

/// Search pages for a numeric token near `target`.
pub fn find_numeric_in_pages(
    pages: &[Page],
    target: f64,
    unit: Option<&str>,
    config: &EvidenceConfig,
) -> Option<PageMatch> {
    let percent_re = if unit == Some("%") {
        Regex::new(&format!(r"{}\s*%", regex::escape(&format_number(target)))).ok()
    } else {
        None
    };

    for page in pages {
        let text = page.search_text();
        if text.is_empty() {
            continue;
        }

        if let Some(re) = &percent_re {
            if let Some(m) = re.find(text) {
                return Some(PageMatch {
                    page: page.page_no,
                    snippet: snippet_around(text, m.start(), m.end(), config.snippet_window),
                    score: 100.0,
                });
            }
        }

        for m in NUMBER_RE.find_iter(text) {
            let Ok(value) = m.as_str().parse::<f64>() else {
                continue;
            };
            if (value - target).abs() <= config.num_tolerance {
                return Some(PageMatch {
                    page: page.page_no,
                    snippet: snippet_around(text, m.start(), m.end(), config.snippet_window),
                    score: 100.0,
                });
            }
        }
    }
    None
}

/// Fuzzy similarity on a 0..100 scale: best normalized-Levenshtein score
/// of the shorter string against every equal-length window of the longer.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (short, long) = if a_chars.len() <= b_chars.len() {
        (a_chars, b_chars)
    } else {
        (b_chars, a_chars)
    };

    let needle: String = short.iter().collect();
    let mut best = 0.0f64;
    for start in 0..=(long.len() - short.len()) {
        let window: String = long[start..start + short.len()].iter().collect();
        let score = strsim::normalized_levenshtein(&needle, &window) * 100.0;
        if score > best {
            best = score;
        }
        if best >= 100.0 {
            break;
        }
    }
    best
}

fn iter_records<'a>(document: &'a Value, field: &str) -> Vec<&'a Map<String, Value>> {
    document
        .get(field)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .collect()
}

fn append_evidence(document: &mut Value, additions: Vec<(&'static str, PageMatch)>) {
    let Some(map) = document.as_object_mut() else {
        return;
    };
    let evidence = map.entry("evidence").or_insert_with(|| json!({}));
    if !evidence.is_object() {
        *evidence = json!({});
    }
    let Some(evidence) = evidence.as_object_mut() else {
        return;
    };
    for (field, m) in additions {
        let entries = evidence.entry(field).or_insert_with(|| json!([]));
        if let Some(entries) = entries.as_array_mut() {
            entries.push(json!({ "page": m.page, "snippet": m.snippet }));
        }
    }
}

/// Case-insensitive substring search. Byte offsets are reported against
/// the original text, so the search is skipped for the rare inputs where
/// lowercasing changes byte length (the fuzzy stage still covers those).
fn find_ci(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    let lowered = haystack.to_lowercase();
    if lowered.len() != haystack.len() {
        return None;
    }
    let idx = lowered.find(&needle.to_lowercase())?;
    Some((idx, idx + needle.to_lowercase().len()))
}

fn snippet_around(text: &str, start: usize, end: usize, window: usize) -> String {
    let mut s = start.saturating_sub(window);
    while s > 0 && !text.is_char_boundary(s) {
        s -= 1;
    }
    let mut e = (end + window).min(text.len());
    while e < text.len() && !text.is_char_boundary(e) {
        e += 1;
    }
    collapse_whitespace(text[s..e].trim())
}

fn leading_snippet(text: &str, window: usize) -> String {
    let head: String = text.chars().take(window * 2).collect();
    collapse_whitespace(head.trim())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn format_number(value: f64) -> String {
    // 78.4 -> "78.4", 75.0 -> "75"
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
