//! The extraction pipeline: prompt → backend call → parse → cache → merge
//! → repair. Heads run concurrently per document; a single document's run
//! is otherwise sequential (merge only after all heads settle, repair only
//! after merge).

pub mod cache;
pub mod context;
pub mod heads;
pub mod llm;
pub mod merge;
pub mod prompt;
pub mod repair;
pub mod runner;
pub mod sanitize;

pub use cache::{CacheStore, FsCacheStore, MemoryCacheStore};
pub use context::build_contexts;
pub use heads::HeadRunner;
pub use llm::{LlmClient, MockLlm, OpenRouterClient};
pub use merge::merge_heads;
pub use prompt::PromptStore;
pub use repair::{RepairConfig, RepairOutcome, Repairer};
pub use runner::Pipeline;

use thiserror::Error;

/// Backend invocation or response-parsing failure for one head.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Backend unreachable at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Backend returned error (status {status}): {body}")]
    Http { status: u16, body: String },

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),

    #[error("Prompt template not found for head '{0}'")]
    PromptMissing(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl GenerationError {
    /// Transient failures (rate-limit/quota signals) are retried by the
    /// batch driver with backoff; everything else propagates immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Http { status, body } => {
                *status == 429
                    || body.to_lowercase().contains("quota")
                    || body.to_lowercase().contains("rate limit")
            }
            GenerationError::Timeout(_) => true,
            _ => false,
        }
    }
}

/// Failure of a whole-document pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// One or more heads failed. Every head outcome was collected before
    /// this was raised; `(head name, error message)` per failed head.
    #[error("Head failures detected: {}", format_head_failures(.0))]
    HeadsFailed(Vec<(String, String)>),

    /// The merged document failed validation even after placeholder fills.
    /// Should not occur; signals a defect in the merger itself.
    #[error("Merged document failed validation: {}", .0.join("; "))]
    MergedDocumentInvalid(Vec<String>),

    #[error("Cache error: {0}")]
    Cache(String),
}

fn format_head_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(head, msg)| format!("{head}: {msg}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl PipelineError {
    /// True when any failed head carries a rate-limit/quota signal. The
    /// batch driver halts with a checkpoint on these instead of moving on.
    pub fn has_transient_signal(&self) -> bool {
        match self {
            PipelineError::HeadsFailed(failures) => failures.iter().any(|(_, msg)| {
                let lower = msg.to_lowercase();
                lower.contains("quota") || lower.contains("rate limit") || lower.contains("429")
            }),
            _ => false,
        }
    }
}
