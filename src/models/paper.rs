//! The whole-paper record assembled by the merger and persisted by the store.
//!
//! `Paper` is the typed view of the structural contract that
//! `validation::validate` checks on raw JSON. The `_meta` side-channel
//! (repair log, evidence report) deliberately lives outside this struct —
//! it travels on the JSON document and is not part of the public schema.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Train/val/test sizes for a dataset, when the paper reports them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetSplit {
    pub train: Option<u64>,
    pub val: Option<u64>,
    pub test: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub size: Option<u64>,
    pub split: Option<DatasetSplit>,
}

/// A method or architecture the paper introduces or uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub category: Option<String>,
    #[serde(default)]
    pub components: Vec<String>,
    pub description: Option<String>,
}

/// One numeric evaluation result.
///
/// Invariant: `confidence`, when present, lies in [0,1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub dataset: String,
    pub metric: String,
    pub value: f64,
    pub unit: Option<String>,
    pub split: Option<String>,
    pub higher_is_better: Option<bool>,
    pub baseline: Option<String>,
    pub ours_is: Option<String>,
    pub confidence: Option<f64>,
}

/// A (page, snippet) pair grounding one claim back to the source text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceItem {
    pub page: u32,
    pub snippet: String,
}

/// The merged whole-paper document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    pub title: String,
    pub authors: Vec<String>,
    pub year: i32,
    pub venue: Option<String>,
    pub arxiv_id: Option<String>,
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default)]
    pub datasets: Vec<Dataset>,
    #[serde(default)]
    pub methods: Vec<Method>,
    #[serde(default)]
    pub results: Vec<ResultRecord>,
    #[serde(default)]
    pub ablations: Vec<String>,
    pub limitations: Option<String>,
    pub ethics: Option<String>,
    pub open_source: Option<BTreeMap<String, Option<String>>>,
    pub novelty: Option<String>,
    pub summary: String,
    pub evidence: BTreeMap<String, Vec<EvidenceItem>>,
    pub confidence: Option<BTreeMap<String, Option<f64>>>,
}
