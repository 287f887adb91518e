//! Command-line interface parsing for diskcache
//!
//! This module handles parsing of CLI arguments using clap and resolves them,
//! together with their environment variable fallbacks, into the configuration
//! the cache store is opened with.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use serde_json::Value;
use thiserror::Error;

/// Default entry lifetime in seconds (15 minutes)
pub const DEFAULT_TTL_SECS: u64 = 15 * 60;

/// Name of the cache directory created under the system temp directory
const DEFAULT_DIR_NAME: &str = "diskcache";

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The TTL is not a whole number of seconds
    #[error("Invalid ttl: '{0}'. Expected a whole number of seconds")]
    InvalidTtl(String),
}

/// diskcache - a disk-backed key/value cache with per-entry expiry
#[derive(Parser, Debug)]
#[command(name = "diskcache")]
#[command(about = "Disk-backed key/value cache with per-entry expiry")]
#[command(version)]
pub struct Cli {
    /// Directory holding cache entries [default: <system temp dir>/diskcache]
    #[arg(long, global = true, env = "DISKCACHE_DIR", value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// How long new entries stay fresh, in seconds
    #[arg(
        long,
        global = true,
        env = "DISKCACHE_TTL",
        value_name = "SECONDS",
        default_value_t = DEFAULT_TTL_SECS.to_string()
    )]
    pub ttl: String,

    /// Skip the cache entirely when fetching
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Increase log verbosity (-v for info, -vv for debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Operations exposed on the command line
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the value cached under KEY; exits with status 1 on a miss
    Get {
        /// Cache key
        key: String,
    },
    /// Cache VALUE under KEY (parsed as JSON when valid, otherwise stored as a string)
    Set {
        /// Cache key
        key: String,
        /// Value to store
        value: String,
    },
    /// Remove expired and corrupt entries, printing how many were removed
    Sweep,
    /// Print the file that holds the entry for KEY
    Path {
        /// Cache key
        key: String,
    },
    /// Fetch URL over HTTP, serving the body from the cache when fresh
    Fetch {
        /// Address to fetch
        url: String,
    },
}

/// Cache configuration resolved from CLI arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Directory the store is opened in
    pub dir: PathBuf,
    /// Lifetime of newly written entries
    pub ttl: Duration,
    /// Whether fetches go through the cache
    pub enabled: bool,
}

/// Returns the fallback cache directory under the system temp directory
pub fn default_cache_dir() -> PathBuf {
    env::temp_dir().join(DEFAULT_DIR_NAME)
}

/// Parses a TTL argument given in whole seconds.
///
/// # Returns
/// * `Ok(Duration)` for a non-negative integer
/// * `Err(CliError::InvalidTtl)` otherwise
pub fn parse_ttl_arg(s: &str) -> Result<Duration, CliError> {
    s.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| CliError::InvalidTtl(s.to_string()))
}

/// Interprets a `set` value: JSON when it parses, otherwise a plain string
pub fn parse_value_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Log filter directive for the given `-v` count
pub fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "diskcache=warn",
        1 => "diskcache=info",
        _ => "diskcache=debug",
    }
}

impl CacheConfig {
    /// Creates a CacheConfig from parsed CLI arguments.
    ///
    /// The directory falls back to [`default_cache_dir`] when neither `--dir`
    /// nor `DISKCACHE_DIR` is given.
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        Ok(CacheConfig {
            dir: cli.dir.clone().unwrap_or_else(default_cache_dir),
            ttl: parse_ttl_arg(&cli.ttl)?,
            enabled: !cli.no_cache,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ttl_arg_accepts_seconds() {
        assert_eq!(parse_ttl_arg("900").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_ttl_arg("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_ttl_arg(" 60 ").unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_ttl_arg_invalid() {
        for bad in ["", "abc", "-5", "1.5", "15m"] {
            let err = parse_ttl_arg(bad).unwrap_err();
            assert!(err.to_string().contains("Invalid ttl"));
        }
    }

    #[test]
    fn test_parse_value_arg_prefers_json() {
        assert_eq!(parse_value_arg("42"), Value::from(42));
        assert_eq!(parse_value_arg("[1,2]"), serde_json::json!([1, 2]));
        assert_eq!(parse_value_arg("\"quoted\""), Value::from("quoted"));
    }

    #[test]
    fn test_parse_value_arg_falls_back_to_string() {
        assert_eq!(parse_value_arg("hello world"), Value::from("hello world"));
        assert_eq!(parse_value_arg("{broken"), Value::from("{broken"));
    }

    #[test]
    fn test_log_filter_levels() {
        assert_eq!(log_filter(0), "diskcache=warn");
        assert_eq!(log_filter(1), "diskcache=info");
        assert_eq!(log_filter(2), "diskcache=debug");
        assert_eq!(log_filter(7), "diskcache=debug");
    }

    #[test]
    fn test_cli_parse_get() {
        let cli = Cli::parse_from(["diskcache", "get", "films:alien:10"]);
        assert_eq!(
            cli.command,
            Command::Get {
                key: "films:alien:10".to_string()
            }
        );
    }

    #[test]
    fn test_cli_parse_set() {
        let cli = Cli::parse_from(["diskcache", "set", "k", "{\"a\":1}"]);
        assert_eq!(
            cli.command,
            Command::Set {
                key: "k".to_string(),
                value: "{\"a\":1}".to_string()
            }
        );
    }

    #[test]
    fn test_cli_parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "diskcache", "fetch", "https://example.com", "--dir", "/tmp/x", "--ttl", "30",
            "--no-cache", "-vv",
        ]);
        assert_eq!(cli.dir, Some(PathBuf::from("/tmp/x")));
        assert_eq!(cli.ttl, "30");
        assert!(cli.no_cache);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_cache_config_from_cli_explicit() {
        let cli = Cli::parse_from(["diskcache", "--dir", "/tmp/cache", "--ttl", "120", "sweep"]);
        let config = CacheConfig::from_cli(&cli).unwrap();
        assert_eq!(config.dir, PathBuf::from("/tmp/cache"));
        assert_eq!(config.ttl, Duration::from_secs(120));
        assert!(config.enabled);
    }

    #[test]
    fn test_cache_config_from_cli_no_cache() {
        let cli = Cli::parse_from(["diskcache", "--no-cache", "fetch", "https://example.com"]);
        let config = CacheConfig::from_cli(&cli).unwrap();
        assert!(!config.enabled);
    }

    #[test]
    fn test_cache_config_from_cli_invalid_ttl() {
        let cli = Cli::parse_from(["diskcache", "--ttl", "soon", "sweep"]);
        assert!(CacheConfig::from_cli(&cli).is_err());
    }

    #[test]
    fn test_default_cache_dir_is_under_temp_dir() {
        let dir = default_cache_dir();
        assert!(dir.starts_with(env::temp_dir()));
        assert!(dir.ends_with("diskcache"));
    }
}
