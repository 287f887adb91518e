//! Disk-backed cache with per-entry expiry
//!
//! This module provides a cache store that persists serializable values to the
//! filesystem, one JSON file per key. Keys are hashed into fixed-width file
//! names, entries carry an absolute expiry, and any entry found expired or
//! malformed is deleted and treated as a miss. Caching is always optional:
//! callers are expected to carry on without it when it fails.

mod error;
pub mod hasher;
mod store;

pub use error::CacheError;
pub use store::CacheStore;
