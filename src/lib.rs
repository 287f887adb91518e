//! diskcache library
//!
//! Exposes the cache store, the fetch helpers built on it, and the CLI
//! configuration for use by the binary and by integration tests.

pub mod cache;
pub mod cli;
pub mod fetch;
