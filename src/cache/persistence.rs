//! Storage backends for the exact response cache

use super::response_cache::CacheEntry;
use crate::error::{ContextError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Directory under the home directory holding persisted state
pub const DEFAULT_DIR_NAME: &str = ".context-engine";
pub const DEFAULT_FILE_NAME: &str = "response-cache.json";

/// Persistence backend for cache entries
///
/// `load` reports whatever could be read; callers treat errors as
/// "start empty". `save` rewrites the full document.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self) -> Result<Vec<CacheEntry>>;

    async fn save(&self, entries: &[CacheEntry]) -> Result<()>;
}

/// Default cache file location (`~/.context-engine/response-cache.json`)
pub fn default_cache_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DIR_NAME)
        .join(DEFAULT_FILE_NAME)
}

/// Single JSON document holding an ordered array of entries
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for JsonFileStore {
    fn default() -> Self {
        Self::new(default_cache_path())
    }
}

#[async_trait]
impl CacheStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<CacheEntry>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No persisted cache at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        // Records that fail to parse are skipped individually
        let values: Vec<serde_json::Value> = serde_json::from_str(&raw)?;
        let total = values.len();
        let entries: Vec<CacheEntry> = values
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect();

        if entries.len() < total {
            warn!(
                "Skipped {} malformed cache records in {}",
                total - entries.len(),
                self.path.display()
            );
        }
        debug!("Loaded {} cache entries from {}", entries.len(), self.path.display());
        Ok(entries)
    }

    async fn save(&self, entries: &[CacheEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&self.path, body).await?;
        debug!("Saved {} cache entries to {}", entries.len(), self.path.display());
        Ok(())
    }
}

/// In-process store, used for tests and memory-only setups
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<CacheEntry>>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose writes always fail
    pub fn failing() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            fail_writes: true,
        }
    }

    pub async fn snapshot(&self) -> Vec<CacheEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn load(&self) -> Result<Vec<CacheEntry>> {
        Ok(self.entries.lock().await.clone())
    }

    async fn save(&self, entries: &[CacheEntry]) -> Result<()> {
        if self.fail_writes {
            return Err(ContextError::Internal("store is read-only".to_string()));
        }
        *self.entries.lock().await = entries.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();
        let store = JsonFileStore::new(&path);
        assert!(store.load().await.is_err());
    }

    #[tokio::test]
    async fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        let store = JsonFileStore::new(&path);
        store.save(&[]).await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "[]");
    }

    #[test]
    fn test_failing_memory_store_keeps_previous_contents() {
        let store = MemoryStore::failing();
        assert!(tokio_test::block_on(store.save(&[])).is_err());
        assert!(tokio_test::block_on(store.load()).unwrap().is_empty());
    }

    #[test]
    fn test_default_path_under_dotfile_dir() {
        let path = default_cache_path();
        assert!(path.ends_with(".context-engine/response-cache.json"));
    }
}
