//! Typed per-head outputs and the tagged union the merger consumes.
//!
//! Each head has a fixed schema independent of the others. `HeadOutput`
//! gives the merger one shape to program against whether a value came from
//! a fresh backend call or a cached JSON payload.

use serde::{Deserialize, Serialize};

use super::paper::{Method, ResultRecord};

/// One independently-prompted extraction task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HeadKind {
    Metadata,
    Methods,
    Results,
    Limitations,
    Summary,
}

impl HeadKind {
    pub const ALL: [HeadKind; 5] = [
        HeadKind::Metadata,
        HeadKind::Methods,
        HeadKind::Results,
        HeadKind::Limitations,
        HeadKind::Summary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HeadKind::Metadata => "metadata",
            HeadKind::Methods => "methods",
            HeadKind::Results => "results",
            HeadKind::Limitations => "limitations",
            HeadKind::Summary => "summary",
        }
    }

    pub fn parse(name: &str) -> Option<HeadKind> {
        match name {
            "metadata" => Some(HeadKind::Metadata),
            "methods" => Some(HeadKind::Methods),
            "results" => Some(HeadKind::Results),
            "limitations" => Some(HeadKind::Limitations),
            "summary" => Some(HeadKind::Summary),
            _ => None,
        }
    }
}

impl std::fmt::Display for HeadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bibliographic fields owned by the metadata head.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataOutput {
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub arxiv_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MethodsOutput {
    #[serde(default)]
    pub methods: Vec<Method>,
}

/// The results head returns a bare JSON array of result records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultsOutput {
    pub results: Vec<ResultRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitationsOutput {
    pub limitations: Option<String>,
    pub ethics: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryOutput {
    pub summary: String,
}

/// Uniform shape for one head's parsed result, regardless of provenance.
#[derive(Debug, Clone)]
pub enum HeadOutput {
    Metadata(MetadataOutput),
    Methods(MethodsOutput),
    Results(ResultsOutput),
    Limitations(LimitationsOutput),
    Summary(SummaryOutput),
}

impl HeadOutput {
    pub fn kind(&self) -> HeadKind {
        match self {
            HeadOutput::Metadata(_) => HeadKind::Metadata,
            HeadOutput::Methods(_) => HeadKind::Methods,
            HeadOutput::Results(_) => HeadKind::Results,
            HeadOutput::Limitations(_) => HeadKind::Limitations,
            HeadOutput::Summary(_) => HeadKind::Summary,
        }
    }

    /// Parse a JSON payload into the typed output for `kind`.
    ///
    /// This is the single place cached payloads and fresh backend responses
    /// converge to one attribute-access shape.
    pub fn from_payload(
        kind: HeadKind,
        payload: serde_json::Value,
    ) -> Result<HeadOutput, serde_json::Error> {
        Ok(match kind {
            HeadKind::Metadata => HeadOutput::Metadata(serde_json::from_value(payload)?),
            HeadKind::Methods => HeadOutput::Methods(serde_json::from_value(payload)?),
            HeadKind::Results => HeadOutput::Results(serde_json::from_value(payload)?),
            HeadKind::Limitations => HeadOutput::Limitations(serde_json::from_value(payload)?),
            HeadKind::Summary => HeadOutput::Summary(serde_json::from_value(payload)?),
        })
    }

    /// Serialize back to the cacheable JSON payload.
    pub fn to_payload(&self) -> serde_json::Value {
        match self {
            HeadOutput::Metadata(v) => serde_json::to_value(v),
            HeadOutput::Methods(v) => serde_json::to_value(v),
            HeadOutput::Results(v) => serde_json::to_value(v),
            HeadOutput::Limitations(v) => serde_json::to_value(v),
            HeadOutput::Summary(v) => serde_json::to_value(v),
        }
        .unwrap_or(serde_json::Value::Null)
    }
}
