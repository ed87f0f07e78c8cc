//! Content-addressed head-output cache.
//!
//! The key is derived from the head name and the exact context text fed to
//! it, so a cached entry is valid only for that precise input. Entries are
//! small JSON files carrying the parsed head payload plus a timestamp; the
//! timestamp is informational and never consulted for expiry.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Cache key for one (head, context) pair: hex sha256 over
/// `head_name \0 context_text`.
pub fn cache_key(head_name: &str, context_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(head_name.as_bytes());
    hasher.update(b"\0");
    hasher.update(context_text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Storage backend for head outputs.
///
/// `get` returns `Ok(None)` on a miss; corrupt entries are treated as
/// misses so a damaged cache degrades to recomputation, never to failure.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, String>;
    fn put(&self, key: &str, payload: &Value) -> Result<(), String>;
}

/// Filesystem cache: one `<key>.json` file per entry under a root dir.
pub struct FsCacheStore {
    root: PathBuf,
}

impl FsCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, String> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| format!("Failed to create cache dir {}: {e}", root.display()))?;
        Ok(Self { root })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl CacheStore for FsCacheStore {
    fn get(&self, key: &str) -> Result<Option<Value>, String> {
        let path = self.entry_path(key);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(format!("Failed to read cache entry {}: {e}", path.display())),
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(entry) => match entry.get("payload") {
                Some(payload) => Ok(Some(payload.clone())),
                None => {
                    tracing::warn!(path = %path.display(), "Cache entry missing payload, ignoring");
                    Ok(None)
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Corrupt cache entry, ignoring");
                Ok(None)
            }
        }
    }

    fn put(&self, key: &str, payload: &Value) -> Result<(), String> {
        let entry = json!({
            "cached_at": Utc::now().to_rfc3339(),
            "payload": payload,
        });
        let path = self.entry_path(key);
        let text = serde_json::to_string_pretty(&entry)
            .map_err(|e| format!("Failed to serialize cache entry: {e}"))?;
        std::fs::write(&path, text)
            .map_err(|e| format!("Failed to write cache entry {}: {e}", path.display()))
    }
}

/// In-memory cache for tests and one-shot runs.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Result<Option<Value>, String> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| "cache lock poisoned".to_string())?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, payload: &Value) -> Result<(), String> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| "cache lock poisoned".to_string())?;
        entries.insert(key.to_string(), payload.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_sensitive_to_head_and_context() {
        let a = cache_key("metadata", "page one text");
        let b = cache_key("metadata", "page one text");
        assert_eq!(a, b);
        assert_ne!(a, cache_key("summary", "page one text"));
        assert_ne!(a, cache_key("metadata", "page one text."));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fs_store_round_trips_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCacheStore::new(dir.path()).unwrap();
        let key = cache_key("results", "context");
        assert!(store.get(&key).unwrap().is_none());

        let payload = json!([{"dataset": "TinyImageNet", "value": 78.4}]);
        store.put(&key, &payload).unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(payload));
    }

    #[test]
    fn fs_entry_carries_timestamp_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCacheStore::new(dir.path()).unwrap();
        let key = cache_key("summary", "ctx");
        store.put(&key, &json!({"summary": "s"})).unwrap();

        let raw = std::fs::read_to_string(dir.path().join(format!("{key}.json"))).unwrap();
        let entry: Value = serde_json::from_str(&raw).unwrap();
        assert!(entry["cached_at"].is_string());
        assert_eq!(entry["payload"]["summary"], "s");
    }

    #[test]
    fn corrupt_fs_entry_reads_as_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCacheStore::new(dir.path()).unwrap();
        let key = cache_key("metadata", "ctx");
        std::fs::write(dir.path().join(format!("{key}.json")), "{not json").unwrap();
        assert!(store.get(&key).unwrap().is_none());
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryCacheStore::new();
        assert!(store.is_empty());
        store.put("k", &json!({"a": 1})).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!({"a": 1})));
        assert_eq!(store.len(), 1);
    }
}
