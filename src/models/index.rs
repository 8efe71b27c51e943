// src/models/index.rs
//! Remote bundle catalogue and the persisted synchronization state.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Location and content hash of one published bundle file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BundleIndexEntry {
    /// Path relative to the bundle origin's base url
    pub path: String,
    /// Hex sha256 of the bundle file; also its file name in the local cache
    pub sha256: String,
}

/// Identifier to bundle file mapping published as `ocabundles.json`.
///
/// Several identifiers may share one bundle file, so hashes rather than
/// identifiers are the unit of synchronization.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct BundleIndex {
    entries: IndexMap<String, BundleIndexEntry>,
}

impl BundleIndex {
    pub fn new(entries: IndexMap<String, BundleIndexEntry>) -> Self {
        Self { entries }
    }

    pub fn get(&self, identifier: &str) -> Option<&BundleIndexEntry> {
        self.entries.get(identifier)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BundleIndexEntry)> {
        self.entries.iter()
    }

    /// Distinct content hashes referenced by the index.
    pub fn hashes(&self) -> BTreeSet<&str> {
        self.entries
            .values()
            .map(|entry| entry.sha256.as_str())
            .collect()
    }

    /// Path of the first entry pointing at `sha256`.
    pub fn path_for_hash(&self, sha256: &str) -> Option<&str> {
        self.entries
            .values()
            .find(|entry| entry.sha256 == sha256)
            .map(|entry| entry.path.as_str())
    }
}

/// Synchronization metadata persisted next to the cached bundles.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CacheDataFile {
    pub index_file_etag: String,
    pub updated_at: DateTime<Utc>,
}

impl CacheDataFile {
    /// Cache data for an ETag observed now.
    pub fn observed(index_file_etag: impl Into<String>) -> Self {
        Self {
            index_file_etag: index_file_etag.into(),
            updated_at: Utc::now(),
        }
    }
}
