//! Per-head context excerpts.
//!
//! Each head reads a different slice of the paper: metadata lives on the
//! first page, limitations near the end, results anywhere. Budgets keep
//! prompts bounded regardless of paper length and make cache keys stable
//! for a given paper.

use std::collections::BTreeMap;

use crate::models::{HeadKind, Page};

const METADATA_BUDGET: usize = 800;
const METHODS_BUDGET: usize = 1200;
const RESULTS_BUDGET: usize = 1600;
const LIMITATIONS_BUDGET: usize = 800;
const SUMMARY_BUDGET: usize = 1200;

/// Build one bounded context string per head. Always returns an entry for
/// every head; an empty page list yields empty contexts.
pub fn build_contexts(pages: &[Page]) -> BTreeMap<HeadKind, String> {
    let mut contexts = BTreeMap::new();

    let first = pages.first().map(std::slice::from_ref).unwrap_or(&[]);
    let first_half = &pages[..pages.len().div_ceil(2)];
    let last_two = &pages[pages.len().saturating_sub(2)..];

    let first_and_last: Vec<&Page> = match (pages.first(), pages.last()) {
        (Some(f), Some(l)) if pages.len() > 1 => vec![f, l],
        (Some(f), _) => vec![f],
        _ => Vec::new(),
    };

    contexts.insert(HeadKind::Metadata, excerpt(first.iter(), METADATA_BUDGET));
    contexts.insert(HeadKind::Methods, excerpt(first_half.iter(), METHODS_BUDGET));
    contexts.insert(HeadKind::Results, excerpt(pages.iter(), RESULTS_BUDGET));
    contexts.insert(
        HeadKind::Limitations,
        excerpt(last_two.iter(), LIMITATIONS_BUDGET),
    );
    contexts.insert(
        HeadKind::Summary,
        excerpt(first_and_last.iter().copied(), SUMMARY_BUDGET),
    );

    contexts
}

fn excerpt<'a>(pages: impl Iterator<Item = &'a Page>, budget: usize) -> String {
    let joined = pages
        .map(Page::search_text)
        .collect::<Vec<_>>()
        .join("\n\n");
    truncate_chars(&joined, budget)
}

/// Char-boundary-safe prefix truncation.
fn truncate_chars(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(no: u32, text: &str) -> Page {
        Page {
            page_no: no,
            raw_text: text.to_string(),
            clean_text: text.to_string(),
            blocks: Vec::new(),
        }
    }

    #[test]
    fn every_head_gets_a_context() {
        let pages = vec![page(1, "intro"), page(2, "methods"), page(3, "conclusion")];
        let contexts = build_contexts(&pages);
        assert_eq!(contexts.len(), HeadKind::ALL.len());
    }

    #[test]
    fn metadata_uses_only_first_page() {
        let pages = vec![page(1, "Title page"), page(2, "Body")];
        let contexts = build_contexts(&pages);
        assert_eq!(contexts[&HeadKind::Metadata], "Title page");
    }

    #[test]
    fn limitations_uses_last_two_pages() {
        let pages = vec![page(1, "A"), page(2, "B"), page(3, "C"), page(4, "D")];
        let contexts = build_contexts(&pages);
        assert_eq!(contexts[&HeadKind::Limitations], "C\n\nD");
    }

    #[test]
    fn summary_combines_first_and_last() {
        let pages = vec![page(1, "First"), page(2, "Mid"), page(3, "Last")];
        let contexts = build_contexts(&pages);
        assert_eq!(contexts[&HeadKind::Summary], "First\n\nLast");

        let one = vec![page(1, "Only")];
        assert_eq!(build_contexts(&one)[&HeadKind::Summary], "Only");
    }

    #[test]
    fn budgets_bound_context_length() {
        let long = "x".repeat(5000);
        let pages = vec![page(1, &long), page(2, &long)];
        let contexts = build_contexts(&pages);
        assert_eq!(contexts[&HeadKind::Metadata].chars().count(), 800);
        assert_eq!(contexts[&HeadKind::Results].chars().count(), 1600);
    }

    #[test]
    fn empty_pages_yield_empty_contexts() {
        let contexts = build_contexts(&[]);
        for head in HeadKind::ALL {
            assert_eq!(contexts[&head], "");
        }
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "é".repeat(10);
        assert_eq!(truncate_chars(&text, 4), "éééé");
    }
}
