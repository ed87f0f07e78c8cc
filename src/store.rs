//! Content-addressed paper store.
//!
//! Papers are keyed by a hash of their title and author list, so saving
//! the same paper twice overwrites deterministically instead of
//! duplicating. One JSON file per paper plus an `index.json` with short
//! listing entries.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::validation::validate;

const INDEX_FILE: &str = "index.json";
const SUMMARY_EXCERPT_CHARS: usize = 400;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Document failed validation: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("Paper not found: {0}")]
    NotFound(String),
}

/// Short listing entry kept in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub title: String,
    pub authors: Vec<String>,
    pub year: i32,
    pub summary: String,
}

/// Filesystem-backed paper store rooted at one directory.
pub struct PaperStore {
    root: PathBuf,
}

impl PaperStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let papers_dir = root.join("papers");
        std::fs::create_dir_all(&papers_dir).map_err(|e| StoreError::Io {
            path: papers_dir,
            source: e,
        })?;
        let store = Self { root };
        if !store.index_path().exists() {
            store.write_index(&BTreeMap::new())?;
        }
        Ok(store)
    }

    /// Deterministic id: hex sha256 of `title || "||" || authors.join("|")`.
    pub fn paper_id(document: &Value) -> String {
        let title = document
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim();
        let authors = document
            .get("authors")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .map(|a| a.as_str().map(str::to_string).unwrap_or_else(|| a.to_string()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let base = format!("{title}||{}", authors.join("|"));
        let mut hasher = Sha256::new();
        hasher.update(base.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Validate and persist `document`, updating the index. Returns the id.
    pub fn save(&self, document: &Value) -> Result<String, StoreError> {
        let errors = validate(document);
        if !errors.is_empty() {
            return Err(StoreError::Invalid(errors));
        }

        let id = Self::paper_id(document);
        let path = self.paper_path(&id);
        let text = serde_json::to_string_pretty(document)?;
        std::fs::write(&path, text).map_err(|e| StoreError::Io {
            path: path.clone(),
            source: e,
        })?;

        let mut index = self.list()?;
        index.insert(id.clone(), index_entry(document));
        self.write_index(&index)?;

        tracing::info!(paper_id = %id, "Paper saved");
        Ok(id)
    }

    pub fn load(&self, id: &str) -> Result<Value, StoreError> {
        let path = self.paper_path(id);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => return Err(StoreError::Io { path, source: e }),
        };
        Ok(serde_json::from_str(&text)?)
    }

    pub fn list(&self) -> Result<BTreeMap<String, IndexEntry>, StoreError> {
        let path = self.index_path();
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new())
            }
            Err(e) => return Err(StoreError::Io { path, source: e }),
        };
        Ok(serde_json::from_str(&text)?)
    }

    /// Remove a paper and its index entry. Returns whether it existed.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let path = self.paper_path(id);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(StoreError::Io { path, source: e }),
        }
        let mut index = self.list()?;
        index.remove(id);
        self.write_index(&index)?;
        Ok(true)
    }

    fn paper_path(&self, id: &str) -> PathBuf {
        self.root.join("papers").join(format!("{id}.json"))
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn write_index(&self, index: &BTreeMap<String, IndexEntry>) -> Result<(), StoreError> {
        let path = self.index_path();
        let text = serde_json::to_string_pretty(index)?;
        std::fs::write(&path, text).map_err(|e| StoreError::Io { path, source: e })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn index_entry(document: &Value) -> IndexEntry {
    let summary = document
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or("");
    IndexEntry {
        title: document
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        authors: document
            .get("authors")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        year: document.get("year").and_then(Value::as_i64).unwrap_or(0) as i32,
        summary: summary.chars().take(SUMMARY_EXCERPT_CHARS).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_paper() -> Value {
        json!({
            "title": "Hybrid Attention",
            "authors": ["Bhavesh Kumar", "Jane Doe"],
            "year": 2023,
            "summary": "A short summary.",
            "evidence": {}
        })
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = PaperStore::new(dir.path()).unwrap();
        let paper = sample_paper();
        let id = store.save(&paper).unwrap();
        assert_eq!(store.load(&id).unwrap(), paper);
    }

    #[test]
    fn id_is_deterministic_for_title_and_authors() {
        let a = PaperStore::paper_id(&sample_paper());
        let b = PaperStore::paper_id(&sample_paper());
        assert_eq!(a, b);

        let mut other = sample_paper();
        other["authors"] = json!(["Different Author"]);
        assert_ne!(a, PaperStore::paper_id(&other));
    }

    #[test]
    fn invalid_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = PaperStore::new(dir.path()).unwrap();
        let err = store.save(&json!({"title": "no other fields"})).unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[test]
    fn index_carries_excerpted_summary() {
        let dir = tempfile::tempdir().unwrap();
        let store = PaperStore::new(dir.path()).unwrap();
        let mut paper = sample_paper();
        paper["summary"] = json!("long ".repeat(200));
        let id = store.save(&paper).unwrap();

        let index = store.list().unwrap();
        let entry = &index[&id];
        assert_eq!(entry.title, "Hybrid Attention");
        assert_eq!(entry.summary.chars().count(), 400);
    }

    #[test]
    fn delete_removes_paper_and_index_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = PaperStore::new(dir.path()).unwrap();
        let id = store.save(&sample_paper()).unwrap();

        assert!(store.delete(&id).unwrap());
        assert!(!store.delete(&id).unwrap());
        assert!(matches!(store.load(&id), Err(StoreError::NotFound(_))));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn saving_same_paper_twice_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = PaperStore::new(dir.path()).unwrap();
        let id1 = store.save(&sample_paper()).unwrap();
        let mut updated = sample_paper();
        updated["summary"] = json!("Updated summary.");
        let id2 = store.save(&updated).unwrap();

        assert_eq!(id1, id2);
        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(store.load(&id1).unwrap()["summary"], "Updated summary.");
    }
}
