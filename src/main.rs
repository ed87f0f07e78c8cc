//! Batch extraction driver.
//!
//! Reads one pages-JSON file per paper, runs the full pipeline over each
//! (heads, merge, repair, evidence), writes pre-repair and final documents
//! to the output directory, and optionally saves valid papers into a
//! content-addressed store.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use paperlens::batch::{load_document, BatchConfig, BatchDocument, BatchRunner};
use paperlens::evidence::EvidenceConfig;
use paperlens::pipeline::{FsCacheStore, LlmClient, MockLlm, OpenRouterClient, PromptStore};
use paperlens::{PaperStore, Pipeline, Repairer};

#[derive(Parser, Debug)]
#[command(name = "paperlens", version, about = "Extract structured metadata from research-paper pages")]
struct Args {
    /// Pages JSON files (one per paper, an array of page objects).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory for pre-repair and final documents.
    #[arg(long, default_value = "out")]
    out: PathBuf,

    /// Head-output cache directory.
    #[arg(long, default_value = "cache")]
    cache: PathBuf,

    /// Save valid papers into this store directory.
    #[arg(long)]
    store: Option<PathBuf>,

    /// Directory of prompt template overrides (<head>_prompt.txt).
    #[arg(long)]
    prompts: Option<PathBuf>,

    /// Run against the deterministic offline mock backend.
    #[arg(long)]
    offline: bool,

    /// OpenRouter model id.
    #[arg(long, default_value = "meta-llama/llama-3.1-8b-instruct")]
    model: String,

    /// OpenRouter API key; falls back to OPENROUTER_API_KEY.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, default_value_t = 120)]
    timeout: u64,

    /// Retries per document on transient (rate-limit/quota) failures.
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Fuzzy evidence-match threshold (0..100).
    #[arg(long, default_value_t = 85.0)]
    fuzzy_threshold: f64,

    /// Absolute tolerance for numeric evidence matching.
    #[arg(long, default_value_t = 0.5)]
    num_tolerance: f64,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Batch run failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let client: Arc<dyn LlmClient> = if args.offline {
        tracing::info!("Using offline mock backend");
        Arc::new(MockLlm::new())
    } else {
        let api_key = args
            .api_key
            .as_deref()
            .ok_or("an API key is required unless --offline is set")?;
        Arc::new(OpenRouterClient::new(api_key, &args.model, args.timeout)?)
    };

    let prompts = match &args.prompts {
        Some(dir) => PromptStore::with_template_dir(dir),
        None => PromptStore::embedded(),
    };
    let cache = FsCacheStore::new(&args.cache)?;
    let pipeline = Pipeline::new(client, prompts, Box::new(cache));

    let mut batch_config = BatchConfig::new(&args.out);
    batch_config.max_retries = args.max_retries;
    batch_config.initial_backoff = Duration::from_secs(2);

    let mut runner = BatchRunner::new(pipeline, Repairer::new(), batch_config)
        .with_evidence_config(EvidenceConfig {
            fuzzy_threshold: args.fuzzy_threshold,
            num_tolerance: args.num_tolerance,
            ..EvidenceConfig::default()
        });
    if let Some(store_dir) = &args.store {
        runner = runner.with_store(PaperStore::new(store_dir)?);
    }

    let documents: Vec<BatchDocument> = args
        .inputs
        .iter()
        .map(|path| load_document(path))
        .collect::<Result<_, _>>()?;

    let report = runner.run(&documents)?;
    tracing::info!(
        completed = report.completed(),
        failed = report.failed(),
        "Batch finished"
    );

    if report.failed() > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
