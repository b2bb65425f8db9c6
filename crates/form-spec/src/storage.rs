//! Durable key → string storage for in-progress form data.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Key patterns that mark identity-verification entries.
pub const DEFAULT_SENSITIVE_PATTERNS: &[&str] = &["*verification*", "*veriff*", "*kyc*"];

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("stored value for '{key}' is not valid form data: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode form data: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Durable string store the orchestrator persists into.
pub trait FormStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Process-local storage; clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, String>) -> T,
    ) -> Result<T, StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage lock poisoned".into()))?;
        Ok(f(&mut entries))
    }
}

impl FormStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_entries(|entries| entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.with_entries(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.with_entries(|entries| {
            entries.remove(key);
        })
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Keeps ASCII alphanumerics and `-`; every other byte becomes `_XX`,
    /// so distinct keys never share a file.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut file_name = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                file_name.push(char::from(byte));
            } else {
                file_name.push_str(&format!("_{:02X}", byte));
            }
        }
        self.root.join(format!("{}.json", file_name))
    }
}

impl FormStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let io_error = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };
        fs::create_dir_all(&self.root).map_err(io_error)?;
        fs::write(self.path_for(key), value).map_err(io_error)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

/// Drops identity-verification payloads before form data is persisted.
///
/// An entry is dropped when its key matches one of the (case-insensitive)
/// glob patterns and its value is an object carrying a `sessionId`.
#[derive(Debug, Clone)]
pub struct SensitiveFilter {
    matcher: GlobSet,
}

impl SensitiveFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            match GlobBuilder::new(pattern.as_ref())
                .case_insensitive(true)
                .build()
            {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(err) => warn!(pattern = pattern.as_ref(), %err, "ignoring invalid sensitive key pattern"),
            }
        }
        let matcher = builder.build().unwrap_or_else(|err| {
            warn!(%err, "failed to build sensitive key matcher; nothing will be filtered");
            GlobSet::empty()
        });
        Self { matcher }
    }

    pub fn is_sensitive(&self, key: &str, value: &Value) -> bool {
        self.matcher.is_match(key)
            && value
                .as_object()
                .is_some_and(|entry| entry.contains_key("sessionId"))
    }

    pub fn filter(&self, data: &Map<String, Value>) -> Map<String, Value> {
        data.iter()
            .filter(|(key, value)| {
                let sensitive = self.is_sensitive(key, value);
                if sensitive {
                    debug!(key = %key, "withholding identity verification entry from storage");
                }
                !sensitive
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

impl Default for SensitiveFilter {
    fn default() -> Self {
        Self::new(DEFAULT_SENSITIVE_PATTERNS)
    }
}

pub fn encode_form_data(data: &Map<String, Value>) -> Result<String, StorageError> {
    serde_json::to_string(data).map_err(StorageError::Encode)
}

pub fn decode_form_data(key: &str, raw: &str) -> Result<Map<String, Value>, StorageError> {
    serde_json::from_str(raw).map_err(|source| StorageError::Decode {
        key: key.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn filter_drops_verification_sessions_only() {
        let filter = SensitiveFilter::default();
        let data = map(json!({
            "idVerification": { "sessionId": "X", "completed": true },
            "kycStatus": "pending",
            "VeriffResult": { "completed": true },
            "fullName": "A"
        }));
        assert_eq!(
            Value::Object(filter.filter(&data)),
            json!({ "kycStatus": "pending", "VeriffResult": { "completed": true }, "fullName": "A" })
        );
    }

    #[test]
    fn memory_storage_clones_share_entries() {
        let storage = MemoryStorage::new();
        let other = storage.clone();
        storage.set("k", "v").unwrap();
        assert_eq!(other.get("k").unwrap().as_deref(), Some("v"));
        other.remove("k").unwrap();
        assert_eq!(storage.get("k").unwrap(), None);
    }

    #[test]
    fn file_storage_round_trips_and_ignores_missing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let storage = FileStorage::new(dir.path().join("forms"));
        assert_eq!(storage.get("multi-step/form").unwrap(), None);
        storage.set("multi-step/form", "{\"a\":1}").unwrap();
        assert!(dir.path().join("forms").join("multi-step_2Fform.json").exists());
        assert_eq!(
            storage.get("multi-step/form").unwrap().as_deref(),
            Some("{\"a\":1}")
        );
        storage.remove("multi-step/form").unwrap();
        storage.remove("multi-step/form").unwrap();
        assert_eq!(storage.get("multi-step/form").unwrap(), None);
    }

    #[test]
    fn file_storage_keeps_similar_keys_apart() {
        let dir = tempfile::tempdir().expect("temp dir");
        let storage = FileStorage::new(dir.path());
        storage.set("a/b", "slash").expect("set");
        storage.set("a_b", "underscore").expect("set");
        storage.set("a_2Fb", "literal").expect("set");

        assert_eq!(storage.get("a/b").expect("get").as_deref(), Some("slash"));
        assert_eq!(storage.get("a_b").expect("get").as_deref(), Some("underscore"));
        assert_eq!(storage.get("a_2Fb").expect("get").as_deref(), Some("literal"));
    }

    #[test]
    fn decode_rejects_non_object_payloads() {
        assert!(decode_form_data("k", "[1,2]").is_err());
        assert_eq!(decode_form_data("k", "{\"a\":1}").unwrap()["a"], 1);
    }
}
