/// Durable storage for the translation cache.
///
/// The whole cache is one JSON blob shaped `{ contentHash: { lang: text } }`,
/// read once at startup and rewritten after every successful fill.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

/// `content_hash -> language code -> translated text`.
pub type CacheBlob = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache blob is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Persistent key-value slot holding the cache blob.
pub trait CacheStore: Send + Sync {
    /// Read the blob. A store that was never written yields an empty blob.
    fn load(&self) -> Result<CacheBlob, StoreError>;

    /// Replace the stored blob.
    fn save(&self, blob: &CacheBlob) -> Result<(), StoreError>;
}

// ── JSON file ────────────────────────────────────────────────────────

/// Cache blob kept in a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for JsonFileStore {
    fn load(&self) -> Result<CacheBlob, StoreError> {
        if !self.path.exists() {
            return Ok(CacheBlob::new());
        }
        let data = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn save(&self, blob: &CacheBlob) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string(blob)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

// ── In-memory ────────────────────────────────────────────────────────

/// Store backed by a string in memory, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    raw: Mutex<Option<String>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an arbitrary serialized blob, valid or not.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
            saves: Mutex::new(0),
        }
    }

    /// The serialized blob as last written.
    pub fn raw(&self) -> Option<String> {
        self.raw.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// How many times `save` has been called.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CacheStore for MemoryStore {
    fn load(&self) -> Result<CacheBlob, StoreError> {
        match self.raw() {
            Some(data) => Ok(serde_json::from_str(&data)?),
            None => Ok(CacheBlob::new()),
        }
    }

    fn save(&self, blob: &CacheBlob) -> Result<(), StoreError> {
        let data = serde_json::to_string(blob)?;
        *self.raw.lock().unwrap_or_else(PoisonError::into_inner) = Some(data);
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CacheBlob {
        let mut blob = CacheBlob::new();
        blob.entry("tr_1cc1r".to_string())
            .or_default()
            .insert("kn".to_string(), "ಮುಖಪುಟ".to_string());
        blob
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(temp.path().join("cache.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let temp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(temp.path().join("nested/cache.json"));
        store.save(&sample()).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded["tr_1cc1r"]["kn"], "ಮುಖಪುಟ");

        // On-disk schema is the plain nested object
        let raw = fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, r#"{"tr_1cc1r":{"kn":"ಮುಖಪುಟ"}}"#);
    }

    #[test]
    fn test_file_store_corrupt() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("cache.json");
        fs::write(&path, "{\"tr_1\": [1, 2").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_empty());
        store.save(&sample()).unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.load().unwrap(), sample());

        let corrupt = MemoryStore::with_raw("not json");
        assert!(corrupt.load().is_err());
    }
}
