//! Page-level input produced by the external PDF parser.
//!
//! Pages are created once per document and never mutated afterwards.
//! `clean_text` is whitespace-normalized; `blocks` preserve reading order
//! (sorted top-to-bottom, left-to-right by the parser).

use serde::{Deserialize, Serialize};

/// One positional text block on a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBlock {
    /// `[x0, y0, x1, y1]` in page coordinates; absent for line-based parsers.
    pub bbox: Option<[f64; 4]>,
    pub text: String,
}

/// One parsed page of a source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number.
    pub page_no: u32,
    pub raw_text: String,
    pub clean_text: String,
    #[serde(default)]
    pub blocks: Vec<TextBlock>,
}

impl Page {
    /// Preferred search text for this page: cleaned if non-empty, else raw.
    pub fn search_text(&self) -> &str {
        if self.clean_text.is_empty() {
            &self.raw_text
        } else {
            &self.clean_text
        }
    }
}
