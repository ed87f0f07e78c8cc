//! Batch driver: run many documents through the full pipeline.
//!
//! Documents are processed sequentially. Transient generation errors
//! (rate limit, quota) are retried with exponential backoff; if retries
//! are exhausted the batch halts with a resumable checkpoint. Permanent
//! failures are recorded and the batch moves on. Pre-repair and final
//! documents are both persisted, so a later-stage failure never loses
//! the earlier stages' work.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::evidence::{attach_evidence, EvidenceConfig};
use crate::models::Page;
use crate::pipeline::{build_contexts, Pipeline, Repairer};
use crate::store::{PaperStore, StoreError};

const CHECKPOINT_FILE: &str = "checkpoint.json";

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Batch I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Quota exhausted after {completed} document(s); resume from {checkpoint}")]
    QuotaExhausted {
        completed: usize,
        checkpoint: PathBuf,
    },
}

/// Batch-level tunables.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub output_dir: PathBuf,
    /// Retries per document on transient errors before halting the batch.
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl BatchConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            max_retries: 3,
            initial_backoff: Duration::from_secs(2),
        }
    }
}

/// One input document: a name (used for output filenames) plus its pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDocument {
    pub name: String,
    pub pages: Vec<Page>,
}

#[derive(Debug, Serialize)]
pub enum DocumentStatus {
    Completed {
        paper_id: Option<String>,
        evidence_precision: Option<f64>,
        remaining_errors: usize,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<(String, DocumentStatus)>,
}

impl BatchReport {
    pub fn completed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, s)| matches!(s, DocumentStatus::Completed { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.completed()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Checkpoint {
    completed: Vec<String>,
    remaining: Vec<String>,
    halted_at: Option<String>,
}

/// Drives documents through heads, merge, repair, evidence, and storage.
pub struct BatchRunner {
    pipeline: Pipeline,
    repairer: Repairer,
    evidence_config: EvidenceConfig,
    store: Option<PaperStore>,
    config: BatchConfig,
}

impl BatchRunner {
    pub fn new(pipeline: Pipeline, repairer: Repairer, config: BatchConfig) -> Self {
        Self {
            pipeline,
            repairer,
            evidence_config: EvidenceConfig::default(),
            store: None,
            config,
        }
    }

    /// Also save valid final documents into `store`.
    pub fn with_store(mut self, store: PaperStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_evidence_config(mut self, config: EvidenceConfig) -> Self {
        self.evidence_config = config;
        self
    }

    /// Process `documents` in order. A checkpoint left by a previous
    /// halted run is honored: already-completed documents are skipped.
    pub fn run(&self, documents: &[BatchDocument]) -> Result<BatchReport, BatchError> {
        std::fs::create_dir_all(&self.config.output_dir).map_err(|e| BatchError::Io {
            path: self.config.output_dir.clone(),
            source: e,
        })?;

        let mut checkpoint = self.read_checkpoint()?;
        let mut report = BatchReport::default();

        for (position, document) in documents.iter().enumerate() {
            if checkpoint.completed.contains(&document.name) {
                tracing::info!(document = %document.name, "Skipping checkpointed document");
                continue;
            }

            tracing::info!(document = %document.name, "Processing document");
            let candidate = match self.run_heads_with_retry(document) {
                Ok(candidate) => candidate,
                Err(HeadsOutcome::Permanent(message)) => {
                    tracing::warn!(document = %document.name, error = %message,
                        "Document failed, continuing batch");
                    report
                        .outcomes
                        .push((document.name.clone(), DocumentStatus::Failed { error: message }));
                    continue;
                }
                Err(HeadsOutcome::Quota(message)) => {
                    tracing::error!(document = %document.name, error = %message,
                        "Quota exhausted, halting batch");
                    checkpoint.remaining = documents[position..]
                        .iter()
                        .map(|d| d.name.clone())
                        .collect();
                    checkpoint.halted_at = Some(Utc::now().to_rfc3339());
                    let path = self.write_checkpoint(&checkpoint)?;
                    return Err(BatchError::QuotaExhausted {
                        completed: checkpoint.completed.len(),
                        checkpoint: path,
                    });
                }
            };

            self.write_document(&document.name, "prerepair", &candidate)?;

            let outcome = self.repairer.repair(candidate);
            let mut final_doc = outcome.document;
            if !outcome.remaining.is_empty() {
                tracing::warn!(document = %document.name, errors = outcome.remaining.len(),
                    "Document still invalid after repair, flagging for review");
                annotate_meta(&mut final_doc, "remaining_errors", json!(outcome.remaining));
            }

            let evidence_report = attach_evidence(&mut final_doc, &document.pages, &self.evidence_config);
            annotate_meta(
                &mut final_doc,
                "evidence_report",
                serde_json::to_value(&evidence_report)?,
            );

            self.write_document(&document.name, "final", &final_doc)?;

            let paper_id = match (&self.store, outcome.remaining.is_empty()) {
                (Some(store), true) => Some(store.save(&final_doc)?),
                _ => None,
            };

            tracing::info!(
                document = %document.name,
                evidence_found = evidence_report.found,
                evidence_missing = evidence_report.missing,
                "Document completed"
            );
            report.outcomes.push((
                document.name.clone(),
                DocumentStatus::Completed {
                    paper_id,
                    evidence_precision: evidence_report.evidence_precision,
                    remaining_errors: outcome.remaining.len(),
                },
            ));
            checkpoint.completed.push(document.name.clone());
        }

        // Batch finished; a stale checkpoint would mask the next run.
        self.clear_checkpoint()?;
        Ok(report)
    }

    fn run_heads_with_retry(&self, document: &BatchDocument) -> Result<Value, HeadsOutcome> {
        let contexts = build_contexts(&document.pages);
        let mut backoff = self.config.initial_backoff;

        for attempt in 0..=self.config.max_retries {
            match self.pipeline.run(&contexts) {
                Ok(candidate) => return Ok(candidate),
                Err(e) if e.has_transient_signal() => {
                    if attempt == self.config.max_retries {
                        return Err(HeadsOutcome::Quota(e.to_string()));
                    }
                    tracing::warn!(document = %document.name, attempt, backoff_secs = backoff.as_secs(),
                        error = %e, "Transient failure, backing off");
                    std::thread::sleep(backoff);
                    backoff *= 2;
                }
                Err(e) => return Err(HeadsOutcome::Permanent(e.to_string())),
            }
        }
        Err(HeadsOutcome::Permanent("retry loop exhausted".into()))
    }

    fn write_document(&self, name: &str, stage: &str, document: &Value) -> Result<(), BatchError> {
        let path = self.config.output_dir.join(format!("{name}.{stage}.json"));
        let text = serde_json::to_string_pretty(document)?;
        std::fs::write(&path, text).map_err(|e| BatchError::Io { path, source: e })
    }

    fn checkpoint_path(&self) -> PathBuf {
        self.config.output_dir.join(CHECKPOINT_FILE)
    }

    fn read_checkpoint(&self) -> Result<Checkpoint, BatchError> {
        let path = self.checkpoint_path();
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Checkpoint::default()),
            Err(e) => Err(BatchError::Io { path, source: e }),
        }
    }

    fn write_checkpoint(&self, checkpoint: &Checkpoint) -> Result<PathBuf, BatchError> {
        let path = self.checkpoint_path();
        let text = serde_json::to_string_pretty(checkpoint)?;
        std::fs::write(&path, text).map_err(|e| BatchError::Io {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }

    fn clear_checkpoint(&self) -> Result<(), BatchError> {
        let path = self.checkpoint_path();
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BatchError::Io { path, source: e }),
        }
    }
}

enum HeadsOutcome {
    Permanent(String),
    Quota(String),
}

fn annotate_meta(document: &mut Value, key: &str, value: Value) {
    if let Some(map) = document.as_object_mut() {
        let meta = map.entry("_meta").or_insert_with(|| json!({}));
        if !meta.is_object() {
            *meta = json!({});
        }
        if let Some(meta) = meta.as_object_mut() {
            meta.insert(key.to_string(), value);
        }
    }
}

/// Load a batch document from a pages JSON file (an array of Page
/// objects); the file stem becomes the document name.
pub fn load_document(path: &Path) -> Result<BatchDocument, BatchError> {
    let text = std::fs::read_to_string(path).map_err(|e| BatchError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let pages: Vec<Page> = serde_json::from_str(&text)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    Ok(BatchDocument { name, pages })
}
