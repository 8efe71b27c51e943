// src/utils/crypto.rs
//! Content hashing for cached bundle files.
//!
//! Bundle indexes address bundle content by its SHA-256 digest, so the same
//! digest doubles as the local cache file name.

use crate::error::{Error, Result};
use ring::digest::{digest, SHA256};

/// Computes the SHA-256 digest of the input data.
///
/// # Arguments
/// * `data` - Binary data to hash (as bytes slice)
///
/// # Returns
/// Fixed-size 32-byte array (`[u8; 32]`) containing the hash.
pub fn hash_data(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(digest(&SHA256, data).as_ref());
    out
}

/// Computes the lowercase hex SHA-256 digest, the form used in bundle indexes.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(hash_data(data))
}

/// Checks that `hash` is a hex encoded SHA-256 digest before it is used as a
/// cache file name.
///
/// # Errors
/// Returns [`Error::InvalidContentHash`] for anything else, including path
/// separators and the names of the cache's own metadata files.
pub fn validate_content_hash(hash: &str) -> Result<()> {
    match hex::decode(hash) {
        Ok(bytes) if bytes.len() == 32 => Ok(()),
        _ => Err(Error::InvalidContentHash(hash.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_data_length_and_determinism() {
        let first = hash_data(b"bundle");
        assert_eq!(first.len(), 32);
        assert_eq!(first, hash_data(b"bundle"));
        assert_ne!(first, hash_data(b"bundles"));
    }

    #[test]
    fn test_validate_content_hash() {
        assert!(validate_content_hash(&sha256_hex(b"abc")).is_ok());
        assert!(validate_content_hash(&sha256_hex(b"abc").to_uppercase()).is_ok());

        for bad in ["", "deadbeef", "../escaped.json", "oca-cache-data.json", "ocabundles.json"] {
            assert!(
                matches!(validate_content_hash(bad), Err(Error::InvalidContentHash(_))),
                "{} should be rejected",
                bad
            );
        }
    }
}
