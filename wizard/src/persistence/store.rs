// Key/value storage backends
//
// The draft store only needs string values under a handful of fixed keys. `FileStore` keeps
// one file per key under the data folder; `MemoryStore` backs tests and ephemeral sessions.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

// =============================================================================
// Memory
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

// =============================================================================
// Files
// =============================================================================

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<key>.json`, with anything outside `[A-Za-z0-9_-]` replaced.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{}.json", safe))
    }

    async fn write_atomic(&self, path: &Path, value: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create data folder: {:?}", self.root))?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value.as_bytes())
            .await
            .with_context(|| format!("Failed to write {:?}", tmp))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("Failed to replace {:?}", path))?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", path)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let retry_strategy = ExponentialBackoff::from_millis(50)
            .factor(2)
            .max_delay(std::time::Duration::from_millis(750))
            .take(3)
            .map(jitter);

        RetryIf::spawn(
            retry_strategy,
            || self.write_atomic(&path, value),
            is_transient_io_error,
        )
        .await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {:?}", path)),
        }
    }
}

/// Lock/sharing violations and interrupted writes are worth another attempt.
fn is_transient_io_error(err: &anyhow::Error) -> bool {
    let kind_is_transient = err.chain().any(|cause| {
        cause.downcast_ref::<std::io::Error>().is_some_and(|io| {
            matches!(
                io.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
            )
        })
    });
    let msg = err.to_string().to_ascii_lowercase();
    kind_is_transient
        || msg.contains("used by another process")
        || msg.contains("access is denied")
        || msg.contains("sharing violation")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("formStep").await.expect("get"), None);
        store.set("formStep", "3").await.expect("set");
        assert_eq!(store.get("formStep").await.expect("get").as_deref(), Some("3"));
        store.remove("formStep").await.expect("remove");
        assert_eq!(store.get("formStep").await.expect("get"), None);
    }

    #[tokio::test]
    async fn file_store_creates_folder_and_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().join("nested"));

        store.set("formState", "{\"a\":1}").await.expect("first write");
        store.set("formState", "{\"a\":2}").await.expect("second write");
        assert_eq!(
            store.get("formState").await.expect("get").as_deref(),
            Some("{\"a\":2}")
        );
        assert!(!store.path_for("formState").with_extension("json.tmp").exists());

        store.remove("formState").await.expect("remove");
        store.remove("formState").await.expect("remove is idempotent");
        assert_eq!(store.get("formState").await.expect("get"), None);
    }

    #[test]
    fn keys_are_sanitized_into_file_names() {
        let store = FileStore::new("/data");
        assert_eq!(
            store.path_for("../evil key"),
            PathBuf::from("/data/___evil_key.json")
        );
    }

    #[test]
    fn transient_classification() {
        let interrupted = anyhow::Error::new(std::io::Error::from(std::io::ErrorKind::Interrupted))
            .context("Failed to write");
        assert!(is_transient_io_error(&interrupted));

        let missing = anyhow::Error::new(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(!is_transient_io_error(&missing));
    }
}
