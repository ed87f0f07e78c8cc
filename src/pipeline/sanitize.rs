//! Response sanitization between the backend and the JSON parser.
//!
//! Models wrap JSON in code fences, append sentinel tokens, or preface the
//! payload with prose. The cleanup runs in a fixed order: strip fences and
//! sentinels, then — only if the text still does not parse on its face —
//! a bounded best-effort extraction of the outermost `{...}` or `[...]`
//! span. Anything beyond that is a parse error for the caller.

/// Sentinel tokens some instruction-tuned models emit after the payload.
const SENTINEL_TOKENS: &[&str] = &["<end_of_turn>", "<eos>", "<|im_end|>", "</s>"];

/// Strip code fences and sentinel tokens from a raw model response.
pub fn strip_response_wrappers(raw: &str) -> String {
    let mut text = raw.trim().to_string();

    for token in SENTINEL_TOKENS {
        text = text.replace(token, "");
    }

    // ```json ... ``` or bare ``` ... ``` fences: keep the inner content.
    if let Some(start) = text.find("```") {
        let after_fence = &text[start + 3..];
        // Skip an optional language tag on the fence line.
        let inner_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let inner = &after_fence[inner_start..];
        if let Some(end) = inner.find("```") {
            text = inner[..end].to_string();
        }
    }

    text.trim().to_string()
}

/// Best-effort extraction of the outermost JSON object or array span.
///
/// Used only after a direct parse of the cleaned text failed. Returns the
/// span between the first opening brace/bracket and its matching close,
/// tracked with a depth counter that respects string literals.
pub fn extract_json_span(text: &str) -> Option<&str> {
    let open_idx = text.find(['{', '['])?;
    let bytes = text.as_bytes();
    let open = bytes[open_idx];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open_idx) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            _ if b == open => depth += 1,
            _ if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[open_idx..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Full sanitization pipeline: wrappers stripped, then direct parse, then
/// the bounded span fallback.
pub fn clean_to_json(raw: &str) -> Option<serde_json::Value> {
    let cleaned = strip_response_wrappers(raw);
    if let Ok(value) = serde_json::from_str(&cleaned) {
        return Some(value);
    }
    let span = extract_json_span(&cleaned)?;
    serde_json::from_str(span).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_json_fence() {
        let raw = "```json\n{\"title\": \"T\"}\n```";
        assert_eq!(strip_response_wrappers(raw), "{\"title\": \"T\"}");
    }

    #[test]
    fn strips_bare_fence_and_sentinel() {
        let raw = "```\n{\"a\": 1}\n```<end_of_turn>";
        assert_eq!(strip_response_wrappers(raw), "{\"a\": 1}");
    }

    #[test]
    fn plain_json_passes_through() {
        assert_eq!(strip_response_wrappers("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn extracts_outermost_object_from_prose() {
        let text = "Here is the result: {\"a\": {\"b\": 2}} hope that helps";
        assert_eq!(extract_json_span(text), Some("{\"a\": {\"b\": 2}}"));
    }

    #[test]
    fn extracts_array_span() {
        let text = "Sure! [1, [2, 3]] done";
        assert_eq!(extract_json_span(text), Some("[1, [2, 3]]"));
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_depth() {
        let text = "x {\"note\": \"uses { and } freely\"} y";
        assert_eq!(
            extract_json_span(text),
            Some("{\"note\": \"uses { and } freely\"}")
        );
    }

    #[test]
    fn unbalanced_braces_yield_none() {
        assert_eq!(extract_json_span("{\"a\": 1"), None);
        assert_eq!(extract_json_span("no json here"), None);
    }

    #[test]
    fn clean_to_json_handles_fenced_prose_response() {
        let raw = "The extraction follows.\n```json\n{\"summary\": \"s\"}\n```\nDone.";
        assert_eq!(clean_to_json(raw), Some(json!({"summary": "s"})));
    }

    #[test]
    fn clean_to_json_falls_back_to_span() {
        let raw = "Model says: {\"year\": 2023} trailing words";
        assert_eq!(clean_to_json(raw), Some(json!({"year": 2023})));
    }

    #[test]
    fn clean_to_json_gives_up_on_garbage() {
        assert_eq!(clean_to_json("no structure at all"), None);
    }
}
