//! Research-paper metadata extraction pipeline.
//!
//! Parsed pages go through five concurrently-prompted extraction heads
//! (metadata, methods, results, limitations, summary), whose outputs are
//! merged into one candidate document, repaired to structural validity,
//! and grounded with `(page, snippet)` evidence located in the source
//! text. A batch driver runs many documents with retry, checkpointing,
//! and a content-addressed paper store.

pub mod batch;
pub mod eval;
pub mod evidence;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod store;
pub mod validation;

pub use batch::{BatchConfig, BatchDocument, BatchRunner};
pub use evidence::{EvidenceConfig, EvidenceReport};
pub use models::{HeadKind, HeadOutput, Page, Paper};
pub use pipeline::{LlmClient, MockLlm, OpenRouterClient, Pipeline, PromptStore, Repairer};
pub use store::PaperStore;
pub use validation::validate;
