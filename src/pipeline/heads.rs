//! Single-head execution: render prompt, call backend, sanitize, parse.
//!
//! Heads always run at temperature 0.0 — extraction wants determinism, and
//! deterministic outputs are what make the content-addressed cache useful.

use crate::models::{HeadKind, HeadOutput};

use super::llm::LlmClient;
use super::prompt::PromptStore;
use super::sanitize::clean_to_json;
use super::GenerationError;

const HEAD_TEMPERATURE: f32 = 0.0;
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Executes one head against a backend and produces its typed output.
pub struct HeadRunner<'a> {
    client: &'a dyn LlmClient,
    prompts: &'a PromptStore,
    max_tokens: u32,
}

impl<'a> HeadRunner<'a> {
    pub fn new(client: &'a dyn LlmClient, prompts: &'a PromptStore) -> Self {
        Self {
            client,
            prompts,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Run `head` over `context`. Parse failures are errors here — silent
    /// recovery is the repairer's job, not this layer's.
    pub fn run(&self, head: HeadKind, context: &str) -> Result<HeadOutput, GenerationError> {
        let prompt = self.prompts.render(head, context)?;
        tracing::debug!(head = %head, prompt_chars = prompt.len(), "Running extraction head");

        let raw = self
            .client
            .generate(&prompt, HEAD_TEMPERATURE, self.max_tokens)?;

        let payload = clean_to_json(&raw).ok_or_else(|| {
            GenerationError::JsonParsing(format!(
                "head '{head}' response is not JSON: {}",
                preview(&raw)
            ))
        })?;

        HeadOutput::from_payload(head, payload)
            .map_err(|e| GenerationError::JsonParsing(format!("head '{head}': {e}")))
    }
}

fn preview(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.char_indices().nth(120) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
