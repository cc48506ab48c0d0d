//! SHA-256 content digest for applied scripts.

use sha2::{Digest, Sha256};

/// Compute the lowercase hex SHA-256 digest of a migration script.
pub fn compute_checksum(script: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(script.as_bytes());
    format!("{:x}", hasher.finalize())
}
