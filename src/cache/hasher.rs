//! Key hashing for cache file names
//!
//! Cache keys are arbitrary strings that may contain path separators or be
//! longer than a filesystem allows. Each key is reduced to the hex SHA-256 of
//! its UTF-8 bytes, which is fixed-width and only uses `[0-9a-f]`.

use sha2::{Digest, Sha256};

/// File extension for serialized cache entries
pub const ENTRY_EXTENSION: &str = "json";

/// Length of a hashed key in characters
pub const HASH_LEN: usize = 64;

/// Hashes a cache key into a fixed-width, filesystem-safe identifier
///
/// The same key always maps to the same identifier, across calls and across
/// process restarts.
pub fn hash_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Returns the file name under which the entry for `key` is stored
pub fn file_name(key: &str) -> String {
    format!("{}.{}", hash_key(key), ENTRY_EXTENSION)
}
