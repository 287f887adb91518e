//! diskcache - inspect and drive a disk-backed key/value cache
//!
//! Reads and writes entries, sweeps expired ones, and fetches URLs through
//! the cache. Command output goes to stdout; logs go to stderr.

use std::error::Error;
use std::process::ExitCode;

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use diskcache::cache::CacheStore;
use diskcache::cli::{self, CacheConfig, Cli, Command};
use diskcache::fetch::{self, HttpFetcher};

/// Exit status for a `get` that found nothing
const EXIT_MISS: u8 = 1;

/// Exit status for any failure
const EXIT_ERROR: u8 = 2;

/// Installs the stderr log subscriber; `RUST_LOG` takes precedence over `-v`
fn init_logging(verbose: u8) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli::log_filter(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Runs one command against the configured cache
async fn run(cli: &Cli) -> Result<ExitCode, Box<dyn Error>> {
    let config = CacheConfig::from_cli(cli)?;
    let open = || CacheStore::open(&config.dir, config.ttl);

    match &cli.command {
        Command::Get { key } => match open()?.get::<serde_json::Value>(key)? {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => {
                eprintln!("cache miss: {}", key);
                return Ok(ExitCode::from(EXIT_MISS));
            }
        },
        Command::Set { key, value } => open()?.set(key, &cli::parse_value_arg(value))?,
        Command::Sweep => println!("{}", open()?.remove_expired()?),
        Command::Path { key } => println!("{}", open()?.path_for(key).display()),
        Command::Fetch { url } => {
            // A broken cache only costs speed here, never the fetch itself
            let cache = if config.enabled {
                open()
                    .map_err(|err| warn!("continuing without cache: {}", err))
                    .ok()
            } else {
                None
            };
            let fetcher = HttpFetcher::new()?;
            let body = fetch::fetch_cached(cache.as_ref(), &fetcher, url).await?;
            print!("{}", body);
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
