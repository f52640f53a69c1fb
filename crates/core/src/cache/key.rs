//! Opaque request key generation.
//!
//! A cache entry is identified by its read-only method and canonical URL,
//! hashed into a fixed-width key. Header-based variance is deliberately not
//! part of the key.

use sha2::{Digest, Sha256};

/// Compute the cache key for a request.
pub fn request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
