//! Grounding extracted claims back to source pages.
//!
//! Evidence is a `(page, snippet)` pair living on the document's
//! `evidence` map; the locator appends findings and reports coverage
//! without ever failing the document.

pub mod locator;

use serde::Serialize;

pub use locator::attach_evidence;

/// Tunables for evidence search.
#[derive(Debug, Clone)]
pub struct EvidenceConfig {
    /// Minimum fuzzy partial-ratio score (0..100) to accept a text match.
    pub fuzzy_threshold: f64,
    /// Absolute tolerance when matching numeric result values.
    pub num_tolerance: f64,
    /// Context characters kept on each side of a match.
    pub snippet_window: usize,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 85.0,
            num_tolerance: 0.5,
            snippet_window: 120,
        }
    }
}

/// Per-claim grounding outcome. Scalar fields are `None` when the
/// document had nothing to check; list fields hold one flag per record.
#[derive(Debug, Default, Serialize)]
pub struct EvidenceDetails {
    pub title: Option<bool>,
    pub methods: Vec<bool>,
    pub results: Vec<bool>,
    pub limitations: Option<bool>,
    pub summary: Option<bool>,
}

/// Coverage report for one document.
#[derive(Debug, Serialize)]
pub struct EvidenceReport {
    pub found: usize,
    pub missing: usize,
    pub details: EvidenceDetails,
    /// `found / (found + missing)`, `None` when nothing was checked.
    pub evidence_precision: Option<f64>,
}

impl EvidenceReport {
    pub(crate) fn finish(found: usize, missing: usize, details: EvidenceDetails) -> Self {
        let checked = found + missing;
        let evidence_precision = if checked > 0 {
            Some(found as f64 / checked as f64)
        } else {
            None
        };
        Self {
            found,
            missing,
            details,
            evidence_precision,
        }
    }
}
