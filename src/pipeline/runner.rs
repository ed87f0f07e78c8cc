//! Whole-document pipeline: fan heads out, cache, collect, merge.
//!
//! Heads are I/O-bound blocking HTTP calls, so they run on scoped threads.
//! Every head outcome is collected before any error is raised — partial
//! failure is reported as one aggregated error naming each failed head,
//! never as the first failure alone.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::models::{HeadKind, HeadOutput};

use super::cache::{cache_key, CacheStore};
use super::heads::HeadRunner;
use super::llm::LlmClient;
use super::merge::merge_heads;
use super::prompt::PromptStore;
use super::{GenerationError, PipelineError};

enum HeadFailure {
    Generation(GenerationError),
    Cache(String),
}

/// Runs all heads for one document and merges their outputs.
pub struct Pipeline {
    client: Arc<dyn LlmClient>,
    prompts: PromptStore,
    cache: Box<dyn CacheStore>,
}

impl Pipeline {
    pub fn new(client: Arc<dyn LlmClient>, prompts: PromptStore, cache: Box<dyn CacheStore>) -> Self {
        Self {
            client,
            prompts,
            cache,
        }
    }

    /// Run every head in `contexts` concurrently and merge the outputs
    /// into one candidate document.
    ///
    /// A cache hit returns the stored payload without touching the
    /// backend. Cache read errors degrade to misses; write errors fail
    /// the run (a silently cold cache would hide real cost regressions).
    pub fn run(&self, contexts: &BTreeMap<HeadKind, String>) -> Result<Value, PipelineError> {
        let outcomes: Vec<(HeadKind, Result<HeadOutput, HeadFailure>)> =
            std::thread::scope(|scope| {
                let handles: Vec<_> = contexts
                    .iter()
                    .map(|(head, context)| {
                        let head = *head;
                        scope.spawn(move || (head, self.run_head(head, context)))
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|h| h.join())
                    .collect::<Result<Vec<_>, _>>()
            })
            .map_err(|_| PipelineError::Cache("head worker panicked".into()))?;

        let mut outputs: BTreeMap<HeadKind, HeadOutput> = BTreeMap::new();
        let mut generation_failures: Vec<(String, String)> = Vec::new();
        let mut cache_failures: Vec<String> = Vec::new();

        for (head, outcome) in outcomes {
            match outcome {
                Ok(output) => {
                    outputs.insert(head, output);
                }
                Err(HeadFailure::Generation(e)) => {
                    tracing::warn!(head = %head, error = %e, "Head failed");
                    generation_failures.push((head.to_string(), e.to_string()));
                }
                Err(HeadFailure::Cache(msg)) => {
                    tracing::error!(head = %head, error = %msg, "Cache failure");
                    cache_failures.push(format!("{head}: {msg}"));
                }
            }
        }

        if !cache_failures.is_empty() {
            return Err(PipelineError::Cache(cache_failures.join("; ")));
        }
        if !generation_failures.is_empty() {
            return Err(PipelineError::HeadsFailed(generation_failures));
        }

        let (document, repairs) = merge_heads(&outputs)?;
        if !repairs.is_empty() {
            tracing::info!(repairs = repairs.len(), "Merge applied placeholder fills");
        }
        Ok(document)
    }

    fn run_head(&self, head: HeadKind, context: &str) -> Result<HeadOutput, HeadFailure> {
        let key = cache_key(head.as_str(), context);

        match self.cache.get(&key) {
            Ok(Some(payload)) => {
                tracing::debug!(head = %head, "Cache hit");
                return HeadOutput::from_payload(head, payload).map_err(|e| {
                    HeadFailure::Generation(GenerationError::JsonParsing(format!(
                        "cached payload for '{head}': {e}"
                    )))
                });
            }
            Ok(None) => {}
            Err(msg) => {
                tracing::warn!(head = %head, error = %msg, "Cache read failed, treating as miss");
            }
        }

        let runner = HeadRunner::new(self.client.as_ref(), &self.prompts);
        let output = runner
            .run(head, context)
            .map_err(HeadFailure::Generation)?;

        self.cache
            .put(&key, &output.to_payload())
            .map_err(HeadFailure::Cache)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::super::cache::MemoryCacheStore;
    use super::super::llm::MockLlm;
    use super::*;

    struct CountingLlm {
        inner: MockLlm,
        calls: AtomicUsize,
    }

    impl CountingLlm {
        fn new() -> Self {
            Self {
                inner: MockLlm::new(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl LlmClient for CountingLlm {
        fn generate(
            &self,
            prompt: &str,
            temperature: f32,
            max_tokens: u32,
        ) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.generate(prompt, temperature, max_tokens)
        }
    }

    struct FailingLlm;

    impl LlmClient for FailingLlm {
        fn generate(&self, _: &str, _: f32, _: u32) -> Result<String, GenerationError> {
            Err(GenerationError::Http {
                status: 500,
                body: "boom".into(),
            })
        }
    }

    fn contexts() -> BTreeMap<HeadKind, String> {
        HeadKind::ALL
            .into_iter()
            .map(|h| (h, format!("context for {h}")))
            .collect()
    }

    #[test]
    fn all_heads_merge_into_candidate_document() {
        let pipeline = Pipeline::new(
            Arc::new(MockLlm::new()),
            PromptStore::embedded(),
            Box::new(MemoryCacheStore::new()),
        );
        let doc = pipeline.run(&contexts()).unwrap();
        assert_eq!(
            doc["title"],
            "Hybrid Attention for Efficient Image Classification"
        );
        assert_eq!(doc["results"][0]["value"], json!(78.4));
        assert!(crate::validation::validate(&doc).is_empty());
    }

    #[test]
    fn cache_hit_skips_backend_and_reproduces_document() {
        let client = Arc::new(CountingLlm::new());
        let pipeline = Pipeline::new(
            client.clone(),
            PromptStore::embedded(),
            Box::new(MemoryCacheStore::new()),
        );

        let ctx = contexts();
        let first = pipeline.run(&ctx).unwrap();
        let calls_after_first = client.calls.load(Ordering::SeqCst);
        assert_eq!(calls_after_first, HeadKind::ALL.len());

        let second = pipeline.run(&ctx).unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), calls_after_first);
        assert_eq!(first, second);
    }

    #[test]
    fn changed_context_misses_cache() {
        let client = Arc::new(CountingLlm::new());
        let pipeline = Pipeline::new(
            client.clone(),
            PromptStore::embedded(),
            Box::new(MemoryCacheStore::new()),
        );

        pipeline.run(&contexts()).unwrap();
        let mut altered = contexts();
        altered.insert(HeadKind::Summary, "different context".into());
        pipeline.run(&altered).unwrap();
        assert_eq!(
            client.calls.load(Ordering::SeqCst),
            HeadKind::ALL.len() + 1
        );
    }

    #[test]
    fn end_to_end_document_is_grounded() {
        use crate::evidence::{attach_evidence, EvidenceConfig};
        use crate::models::Page;

        let pipeline = Pipeline::new(
            Arc::new(MockLlm::new()),
            PromptStore::embedded(),
            Box::new(MemoryCacheStore::new()),
        );
        let mut ctx = BTreeMap::new();
        ctx.insert(
            HeadKind::Metadata,
            "Hybrid Attention for Efficient Image Classification\n\
             Bhavesh Kumar, Jane Doe\nImaginaryConf 2023\narXiv:2301.00001"
                .to_string(),
        );
        ctx.insert(
            HeadKind::Results,
            "Table 1: TinyImageNet test — HybridAttentionNet 78.4% vs ResNet18 75.0%."
                .to_string(),
        );
        ctx.insert(HeadKind::Summary, "intro and conclusion".to_string());

        let candidate = pipeline.run(&ctx).unwrap();
        let outcome = crate::pipeline::Repairer::new().repair(candidate);
        assert!(outcome.remaining.is_empty());

        let mut doc = outcome.document;
        assert!(doc["title"].as_str().unwrap().contains("Hybrid Attention"));
        assert_eq!(doc["results"][0]["value"], json!(78.4));
        assert_eq!(doc["results"][0]["unit"], "%");

        let pages = vec![Page {
            page_no: 1,
            raw_text: String::new(),
            clean_text: "Hybrid Attention for Efficient Image Classification. \
                         Table 1: TinyImageNet test — HybridAttentionNet 78.4% vs \
                         ResNet18 75.0%."
                .to_string(),
            blocks: Vec::new(),
        }];
        let report = attach_evidence(&mut doc, &pages, &EvidenceConfig::default());
        assert!(report.found > 0);
        let snippets: Vec<&str> = doc["evidence"]["results"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|e| e["snippet"].as_str())
            .collect();
        assert!(snippets.iter().any(|s| s.contains("78.4")));
    }

    #[test]
    fn every_failed_head_is_reported_together() {
        let pipeline = Pipeline::new(
            Arc::new(FailingLlm),
            PromptStore::embedded(),
            Box::new(MemoryCacheStore::new()),
        );
        let err = pipeline.run(&contexts()).unwrap_err();
        match err {
            PipelineError::HeadsFailed(failures) => {
                assert_eq!(failures.len(), HeadKind::ALL.len());
            }
            other => panic!("Expected HeadsFailed, got {other:?}"),
        }
    }
}
