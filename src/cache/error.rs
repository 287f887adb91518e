//! Error types for cache storage

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by [`CacheStore`](super::CacheStore)
///
/// Expired, corrupt, or undecodable entries are not errors; they are reported
/// as misses after the offending file is removed.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache directory cannot be created or accessed
    #[error("Cache directory unavailable at {}: {source}", path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An entry could not be persisted
    #[error("Failed to write cache entry {}: {source}", path.display())]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An entry or the cache directory could not be read, for a reason other
    /// than the entry being absent
    #[error("Failed to read cache entry {}: {source}", path.display())]
    StorageRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The value handed to `set` could not be serialized
    #[error("Failed to encode cache value: {0}")]
    Encode(#[from] serde_json::Error),
}
