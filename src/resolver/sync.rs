// src/resolver/sync.rs
//! Index reconciliation: which bundle files to fetch and which to evict.
//!
//! Bundle files are content addressed, so diffing works on the distinct set
//! of hashes rather than on identifiers. Several identifiers sharing one file
//! produce a single operation.

use crate::models::index::BundleIndex;
use serde::Serialize;
use std::fmt;

/// One unit of cache work, keyed by content hash.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "op", content = "sha256", rename_all = "lowercase")]
pub enum SyncOperation {
    /// Fetch the bundle file with this hash into the cache
    Add(String),
    /// Delete the cached bundle file with this hash
    Remove(String),
}

impl SyncOperation {
    pub fn hash(&self) -> &str {
        match self {
            SyncOperation::Add(hash) | SyncOperation::Remove(hash) => hash,
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOperation::Add(hash) => write!(f, "add {}", hash),
            SyncOperation::Remove(hash) => write!(f, "remove {}", hash),
        }
    }
}

/// Operations turning the cache for `old` into the cache for `new`.
///
/// Removes come first, then adds; each group is sorted by hash.
///
/// # Arguments
/// * `old` - Index the local cache currently mirrors
/// * `new` - Freshly fetched index
pub fn diff_indexes(old: &BundleIndex, new: &BundleIndex) -> Vec<SyncOperation> {
    let old_hashes = old.hashes();
    let new_hashes = new.hashes();

    let removes = old_hashes
        .difference(&new_hashes)
        .map(|hash| SyncOperation::Remove((*hash).to_string()));
    let adds = new_hashes
        .difference(&old_hashes)
        .map(|hash| SyncOperation::Add((*hash).to_string()));
    removes.chain(adds).collect()
}

/// Outcome of one queue run.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueReport {
    pub succeeded: Vec<SyncOperation>,
    pub failed: Vec<SyncOperation>,
}

impl QueueReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::index::BundleIndexEntry;
    use indexmap::IndexMap;

    fn index(entries: &[(&str, &str)]) -> BundleIndex {
        BundleIndex::new(
            entries
                .iter()
                .map(|(id, hash)| {
                    (
                        id.to_string(),
                        BundleIndexEntry {
                            path: format!("bundles/{}.json", id),
                            sha256: hash.to_string(),
                        },
                    )
                })
                .collect::<IndexMap<_, _>>(),
        )
    }

    #[test]
    fn test_diff_by_content_hash() {
        let old = index(&[("A", "h1"), ("B", "h2")]);
        let new = index(&[("A", "h1"), ("B", "h3"), ("C", "h4")]);
        assert_eq!(
            diff_indexes(&old, &new),
            vec![
                SyncOperation::Remove("h2".to_string()),
                SyncOperation::Add("h3".to_string()),
                SyncOperation::Add("h4".to_string()),
            ]
        );
    }

    #[test]
    fn test_shared_hashes_produce_one_operation() {
        let old = index(&[]);
        let new = index(&[("cred-def", "h1"), ("schema", "h1"), ("other", "h2")]);
        assert_eq!(
            diff_indexes(&old, &new),
            vec![
                SyncOperation::Add("h1".to_string()),
                SyncOperation::Add("h2".to_string()),
            ]
        );
    }

    #[test]
    fn test_identical_indexes_have_no_operations() {
        let old = index(&[("A", "h1"), ("B", "h2")]);
        assert!(diff_indexes(&old, &old.clone()).is_empty());
    }

    #[test]
    fn test_renamed_identifier_keeps_file() {
        let old = index(&[("A", "h1")]);
        let new = index(&[("A2", "h1")]);
        assert!(diff_indexes(&old, &new).is_empty());
    }

    #[test]
    fn test_report_counts() {
        let report = QueueReport {
            succeeded: vec![SyncOperation::Add("h1".to_string())],
            failed: vec![SyncOperation::Remove("h2".to_string())],
        };
        assert_eq!(report.total(), 2);
        assert!(!report.is_clean());
        assert_eq!(report.failed[0].to_string(), "remove h2");
        assert_eq!(report.failed[0].hash(), "h2");
    }
}
