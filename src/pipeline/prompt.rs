//! Prompt templates, one per head, with a `{context_text}` placeholder.
//!
//! Embedded defaults cover every head; a template directory can override
//! any of them (`<head>_prompt.txt`), which is how deployments iterate on
//! prompt wording without rebuilding.

use std::path::PathBuf;

use crate::models::HeadKind;

use super::GenerationError;

const CONTEXT_PLACEHOLDER: &str = "{context_text}";

const METADATA_PROMPT: &str = "\
Extract title, authors, publication year, venue, and arXiv id from the text below.
Return ONLY a JSON object with keys: \"title\", \"authors\" (array of strings),
\"year\" (integer), \"venue\", \"arxiv_id\". Use null for unknown fields.

TEXT:
{context_text}
";

const METHODS_PROMPT: &str = "\
From the METHODS/ARCHITECTURE sections below, extract the methods the paper
introduces or uses. Return ONLY a JSON object with key \"methods\": an array of
objects with keys \"name\", \"category\", \"components\" (array of strings),
\"description\". Use null for unknown fields.

TEXT:
{context_text}
";

const RESULTS_PROMPT: &str = "\
Extract evaluation results from the text below. Return ONLY a JSON array of
objects with keys \"dataset\", \"metric\", \"value\" (number), \"unit\", \"split\",
\"higher_is_better\" (boolean), \"baseline\", \"ours_is\", \"confidence\" (0..1).
Use null for unknown fields. Return [] when no numeric results are reported.

TEXT:
{context_text}
";

const LIMITATIONS_PROMPT: &str = "\
Extract the paper's limitations and any ethics statement from the text below.
Return ONLY a JSON object with keys \"limitations\" and \"ethics\" (strings or null).

TEXT:
{context_text}
";

const SUMMARY_PROMPT: &str = "\
Write a concise summary (2-4 sentences) of the paper described in the text
below. Return ONLY a JSON object with a single key \"summary\".

TEXT:
{context_text}
";

/// Loads head prompt templates and substitutes context text.
pub struct PromptStore {
    template_dir: Option<PathBuf>,
}

impl PromptStore {
    /// Embedded defaults only.
    pub fn embedded() -> Self {
        Self { template_dir: None }
    }

    /// Prefer `<head>_prompt.txt` files in `dir`, fall back to embedded.
    pub fn with_template_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: Some(dir.into()),
        }
    }

    fn template_for(&self, head: HeadKind) -> Result<String, GenerationError> {
        if let Some(dir) = &self.template_dir {
            let path = dir.join(format!("{head}_prompt.txt"));
            match std::fs::read_to_string(&path) {
                Ok(text) => return Ok(text),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(head = %head, path = %path.display(), error = %e,
                        "Failed to read prompt template, using embedded default");
                }
            }
        }
        Ok(match head {
            HeadKind::Metadata => METADATA_PROMPT,
            HeadKind::Methods => METHODS_PROMPT,
            HeadKind::Results => RESULTS_PROMPT,
            HeadKind::Limitations => LIMITATIONS_PROMPT,
            HeadKind::Summary => SUMMARY_PROMPT,
        }
        .to_string())
    }

    /// Build the final prompt for one head.
    pub fn render(&self, head: HeadKind, context: &str) -> Result<String, GenerationError> {
        let template = self.template_for(head)?;
        if !template.contains(CONTEXT_PLACEHOLDER) {
            return Err(GenerationError::PromptMissing(format!(
                "{head} (template lacks {CONTEXT_PLACEHOLDER})"
            )));
        }
        Ok(template.replace(CONTEXT_PLACEHOLDER, context))
    }
}
