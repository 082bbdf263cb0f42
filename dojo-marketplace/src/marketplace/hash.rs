//! SHA-256 content digests for downloaded archives.

use sha2::{Digest, Sha256};

/// Compute the lowercase hex SHA-256 digest of `bytes`.
pub fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Check `bytes` against a publisher-declared digest.
///
/// Both sides are compared as trimmed, ASCII-lowercased hex.
pub fn verify(bytes: &[u8], expected: &str) -> bool {
    matches_digest(&digest(bytes), expected)
}

/// Compare an already computed digest with an expected one.
pub(crate) fn matches_digest(actual: &str, expected: &str) -> bool {
    normalize(actual) == normalize(expected)
}

fn normalize(hex_digest: &str) -> String {
    hex_digest.trim().to_ascii_lowercase()
}
