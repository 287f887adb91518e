//! Fetching remote content through the cache
//!
//! Defines the `Fetcher` contract the cache sits in front of, an HTTP
//! implementation of it, and get-or-fetch helpers. The cache never retries or
//! interprets fetch failures; they are handed back to the caller as-is and are
//! never cached.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::CacheStore;

/// Timeout applied to every HTTP request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Prefix for cache keys of fetched documents
const FETCH_KEY_PREFIX: &str = "fetch:";

/// Errors that can occur when fetching a document
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status} fetching {locator}")]
    Status { status: StatusCode, locator: String },
}

/// Source of documents that can be placed behind the cache
pub trait Fetcher {
    /// Fetches the document at `locator` as text
    fn fetch(&self, locator: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// Fetcher that performs a single HTTP GET per call
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a new HttpFetcher with a 10 second request timeout
    ///
    /// # Returns
    /// * `Err(FetchError::Request)` if the HTTP client cannot be built
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client })
    }

    /// Create a new HttpFetcher with a custom HTTP client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, locator: &str) -> Result<String, FetchError> {
        let response = self.client.get(locator).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                locator: locator.to_string(),
            });
        }
        Ok(response.text().await?)
    }
}

/// Returns the value cached under `key`, producing and caching it on a miss
///
/// Without a cache every call goes to `produce`. A failed cache read counts
/// as a miss and a failed cache write is logged; neither reaches the caller.
/// Errors from `produce` are returned unchanged and nothing is cached.
pub async fn cached<T, E, F, Fut>(
    cache: Option<&CacheStore>,
    key: &str,
    produce: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    if let Some(cache) = cache {
        match cache.get::<T>(key) {
            Ok(Some(value)) => {
                debug!(key, "cache hit");
                return Ok(value);
            }
            Ok(None) => debug!(key, "cache miss"),
            Err(err) => warn!("cache read failed, treating as miss: {}", err),
        }
    }

    let value = produce().await?;

    if let Some(cache) = cache {
        if let Err(err) = cache.set(key, &value) {
            warn!("cache write failed: {}", err);
        }
    }

    Ok(value)
}

/// Fetches `locator` with `fetcher`, serving and storing the body via `cache`
pub async fn fetch_cached<F: Fetcher>(
    cache: Option<&CacheStore>,
    fetcher: &F,
    locator: &str,
) -> Result<String, FetchError> {
    let key = format!("{}{}", FETCH_KEY_PREFIX, locator);
    cached(cache, &key, || fetcher.fetch(locator)).await
}
