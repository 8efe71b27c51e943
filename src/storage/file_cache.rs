// src/storage/file_cache.rs
//! Local working directory for synchronized bundle data.
//!
//! The cache holds three kinds of files side by side:
//! - one file per content hash with the raw bundle document list
//! - the last fetched index file, under its published name
//! - the cache data file with the last seen index ETag
//!
//! All operations are asynchronous (`tokio::fs`) so they never block the
//! caller's runtime thread.

use crate::error::Result;
use crate::utils::serialization::{deserialize, serialize};
use log::{debug, info};
use serde::{de::DeserializeOwned, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;

/// Cheap to clone handle on a cache directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    /// Working directory holding every cached file
    root: PathBuf,
}

impl FileCache {
    /// Creates a cache handle rooted at `root`. Nothing is touched on disk
    /// until [`FileCache::ensure_dir`] or a write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Full path of a cache entry.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Creates the working directory if it is missing. Idempotent.
    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Writes raw bytes under `name`, replacing any previous content.
    ///
    /// # Arguments
    /// * `name` - File name inside the cache directory
    /// * `data` - Content to write
    pub async fn store_data(&self, name: &str, data: &[u8]) -> Result<()> {
        fs::write(self.path_of(name), data).await?;
        debug!("Saved {} bytes to cache entry {}", data.len(), name);
        Ok(())
    }

    /// Reads the raw bytes stored under `name`.
    ///
    /// # Returns
    /// - `Ok(Some(bytes))` when the entry exists
    /// - `Ok(None)` when it does not
    /// - `Err` for any other I/O failure
    pub async fn retrieve_data(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_of(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("Cache entry {} not found", name);
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Serializes `value` as JSON and stores it under `name`.
    pub async fn store_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let json = serialize(value)?;
        self.store_data(name, json.as_bytes()).await
    }

    /// Loads and deserializes the JSON entry `name`, `None` when missing.
    pub async fn retrieve_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.retrieve_data(name).await? {
            Some(bytes) => {
                let json = String::from_utf8_lossy(&bytes);
                Ok(Some(deserialize(&json)?))
            }
            None => Ok(None),
        }
    }

    /// Deletes the entry `name`.
    ///
    /// # Returns
    /// `true` if a file was deleted, `false` if there was nothing to delete
    pub async fn remove(&self, name: &str) -> Result<bool> {
        match fs::remove_file(self.path_of(name)).await {
            Ok(()) => {
                info!("Removed cache entry {}", name);
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn exists(&self, name: &str) -> bool {
        fs::metadata(self.path_of(name)).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_store_and_retrieve_json() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("oca"));
        cache.ensure_dir().await.unwrap();
        cache.ensure_dir().await.unwrap();

        let mut value = BTreeMap::new();
        value.insert("indexFileEtag".to_string(), "v1".to_string());
        cache.store_json("oca-cache-data.json", &value).await.unwrap();

        let back: Option<BTreeMap<String, String>> =
            cache.retrieve_json("oca-cache-data.json").await.unwrap();
        assert_eq!(back, Some(value));
    }

    #[tokio::test]
    async fn test_missing_entries() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path());

        assert_eq!(cache.retrieve_data("nope").await.unwrap(), None);
        assert!(!cache.remove("nope").await.unwrap());
        assert!(!cache.exists("nope").await);
    }

    #[test]
    fn test_remove_existing_entry() {
        tokio_test::block_on(async {
            let dir = tempdir().unwrap();
            let cache = FileCache::new(dir.path());
            cache.store_data("abc123", b"[]").await.unwrap();
            assert!(cache.exists("abc123").await);
            assert!(cache.remove("abc123").await.unwrap());
            assert!(!cache.exists("abc123").await);
        });
    }

    #[tokio::test]
    async fn test_malformed_json_is_an_error() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        cache.store_data("broken.json", b"{\"a\":").await.unwrap();
        let parsed: Result<Option<BTreeMap<String, String>>> = cache.retrieve_json("broken.json").await;
        assert!(parsed.is_err());
    }
}
