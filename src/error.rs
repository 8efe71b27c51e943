// src/error.rs
//! Error types for the OCA bundle engine.
//!
//! Network and parse failures inside the synchronization engine are mostly
//! recovered locally (see [`crate::resolver::remote`]); this type is what the
//! lower layers return so the engine can decide what to swallow.

use thiserror::Error;

/// Errors produced while parsing, caching or fetching overlay bundles.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure talking to the remote bundle origin
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote origin answered with a non-success status
    #[error("unexpected status {status} fetching {url}")]
    Status { status: u16, url: String },

    /// Local cache directory or file access failed
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON in an index, cache data file or bundle
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration could not be assembled
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// A bundle accessor was used on a bundle without a capture base
    #[error("capture base must be defined")]
    MissingCaptureBase,

    /// An add operation referenced a hash that no index entry points at
    #[error("no index entry for content hash {0}")]
    UnknownContentHash(String),

    /// An index entry carries something other than a hex sha256 digest
    #[error("invalid content hash {0:?}")]
    InvalidContentHash(String),

    /// Downloaded bundle content does not hash to the advertised value
    #[error("content hash mismatch: expected {expected}, got {actual}")]
    ContentHashMismatch { expected: String, actual: String },

    /// An indexed bundle has not been downloaded into the local cache
    #[error("bundle file {0} is not in the local cache")]
    MissingCacheEntry(String),

    /// A cached bundle file contained no bundle documents
    #[error("bundle file for {0} contains no bundle documents")]
    EmptyBundle(String),
}

/// Convenience result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
