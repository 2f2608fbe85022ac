//! Fingerprint generation for cache keys.

use sha2::{Digest, Sha256};

use super::normalize::normalize_query;

/// Compute the cache fingerprint for a query at a location.
///
/// Hashes `normalize(query) | lower(state) | lower(city)` with SHA-256 and
/// returns the lowercase hex digest.
pub fn fingerprint(query: &str, state: &str, city: &str) -> String {
    fingerprint_normalized(&normalize_query(query), state, city)
}

/// Fingerprint for a query that is already normalized.
pub(crate) fn fingerprint_normalized(normalized: &str, state: &str, city: &str) -> String {
    let key = format!(
        "{}|{}|{}",
        normalized,
        state.trim().to_lowercase(),
        city.trim().to_lowercase()
    );
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}
