// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content fingerprints used as cache keys.

use sha2::{Digest, Sha256};

/// Hex SHA-256 of raw bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Hash of a game document that ignores formatting and key order.
///
/// `serde_json::Value` objects are backed by a sorted map, so serializing the
/// parsed value yields one canonical form per document.
pub fn game_json_hash(game: &serde_json::Value) -> String {
    content_hash(game.to_string().as_bytes())
}

/// Combine key parts into one hash. Parts are length-prefixed so
/// `["ab", "c"]` and `["a", "bc"]` never collide.
pub fn cache_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
#[path = "hash_tests.rs"]
mod tests;
