//! Cache store for persisting serializable values to disk
//!
//! Every entry lives in its own JSON file named after the hash of its key.
//! The file holds the serialized value and the instant it expires. Reads judge
//! each entry on the spot: expired, corrupt, or undecodable entries are
//! deleted and reported as misses, so a bad file never outlives the read that
//! found it.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::value::RawValue;
use tracing::{debug, warn};

use super::error::CacheError;
use super::hasher;

/// Prefix of the temp files `set` writes before renaming them into place
const TEMP_PREFIX: &str = ".";

/// Suffix of the temp files `set` writes before renaming them into place
const TEMP_SUFFIX: &str = ".tmp";

/// Age below which the sweep assumes a temp file belongs to a write still in
/// flight; older temp files are left over from a crashed writer and removed
const TEMP_GRACE: Duration = Duration::from_secs(5 * 60);

/// Envelope stored on disk for each cache entry
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    /// The serialized value, left unparsed until a caller asks for it
    data: Box<RawValue>,
    /// When the entry stops being served
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Disk-backed key/value store with a fixed time-to-live per entry
///
/// The store keeps no entries in memory; it is only a directory and a TTL, so
/// cloning it is cheap and several processes may share one directory. Writes
/// go through a temp file that is renamed over the target, so readers see
/// either the previous entry or the new one in full.
#[derive(Debug, Clone)]
pub struct CacheStore {
    /// Directory where entry files are stored
    dir: PathBuf,
    /// Lifetime given to each entry at write time
    ttl: Duration,
}

impl CacheStore {
    /// Opens a store rooted at `dir`, creating the directory if needed
    ///
    /// The directory is created with owner-only permissions. Opening also
    /// sweeps expired entries; a failed sweep is logged and otherwise ignored.
    ///
    /// # Returns
    /// * `Ok(CacheStore)` once the directory exists
    /// * `Err(CacheError::StorageUnavailable)` if it cannot be created
    pub fn open(dir: impl Into<PathBuf>, ttl: Duration) -> Result<Self, CacheError> {
        let dir = dir.into();
        create_private_dir(&dir).map_err(|source| CacheError::StorageUnavailable {
            path: dir.clone(),
            source,
        })?;

        let store = Self { dir, ttl };
        match store.remove_expired() {
            Ok(removed) if removed > 0 => {
                debug!(removed, dir = %store.dir.display(), "swept expired cache entries");
            }
            Ok(_) => {}
            Err(err) => warn!("cache sweep on open failed: {}", err),
        }

        Ok(store)
    }

    /// Directory holding the entry files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lifetime given to entries written by this store
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the path of the file that holds the entry for `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(hasher::file_name(key))
    }

    /// Reads the value cached under `key`
    ///
    /// Absent, expired, corrupt, and undecodable entries all come back as
    /// `Ok(None)`; the last three are deleted first. An undecodable entry is
    /// usually one written by an older build with a different value shape.
    ///
    /// # Returns
    /// * `Ok(Some(T))` on a hit
    /// * `Ok(None)` on a miss
    /// * `Err(CacheError::StorageRead)` if the file exists but reading it failed
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::StorageRead { path, source }),
        };

        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(err) => {
                debug!(key, error = %err, "discarding corrupt cache entry");
                discard(&path);
                return Ok(None);
            }
        };

        if entry.is_expired(Utc::now()) {
            debug!(key, expires_at = %entry.expires_at, "discarding expired cache entry");
            discard(&path);
            return Ok(None);
        }

        match serde_json::from_str(entry.data.get()) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                debug!(key, error = %err, "discarding cache entry with unexpected shape");
                discard(&path);
                Ok(None)
            }
        }
    }

    /// Stores `value` under `key`, replacing any previous entry
    ///
    /// The entry expires `ttl` after this call.
    ///
    /// # Returns
    /// * `Ok(())` once the entry is on disk
    /// * `Err(CacheError::Encode)` if `value` cannot be serialized
    /// * `Err(CacheError::StorageWrite)` if the file cannot be written
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let entry = CacheEntry {
            data: serde_json::value::to_raw_value(value)?,
            expires_at: expiry_after(Utc::now(), self.ttl),
        };
        let json = serde_json::to_vec(&entry)?;

        let path = self.path_for(key);
        self.write_atomic(&path, &json)
            .map_err(|source| CacheError::StorageWrite { path, source })
    }

    /// Deletes every expired or corrupt entry in the cache directory
    ///
    /// Files that cannot be read, including ones another process removed
    /// mid-sweep, are skipped, as are subdirectories. Temp files from `set`
    /// are kept while younger than the grace period and removed after it;
    /// any other file that does not parse as an entry is removed.
    ///
    /// # Returns
    /// * `Ok(usize)` - the number of files removed
    /// * `Err(CacheError::StorageRead)` if the directory cannot be listed
    pub fn remove_expired(&self) -> Result<usize, CacheError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| CacheError::StorageRead {
            path: self.dir.clone(),
            source,
        })?;

        let now = Utc::now();
        let mut removed = 0;

        for dir_entry in entries.flatten() {
            match dir_entry.file_type() {
                Ok(file_type) if !file_type.is_dir() => {}
                _ => continue,
            }
            let path = dir_entry.path();
            if is_temp_name(&dir_entry.file_name().to_string_lossy()) {
                let recent = match dir_entry.metadata().and_then(|meta| meta.modified()) {
                    Ok(modified) => is_recent(modified),
                    Err(_) => continue,
                };
                if !recent && discard(&path) {
                    removed += 1;
                }
                continue;
            }

            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "skipping unreadable cache file");
                    continue;
                }
            };

            let stale = match serde_json::from_slice::<CacheEntry>(&bytes) {
                Ok(entry) => entry.is_expired(now),
                Err(_) => true,
            };
            if stale && discard(&path) {
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Writes `contents` to a temp file beside `path`, then renames it over `path`
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        // tempfile creates the file with mode 0o600 on Unix
        let mut file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.dir)?;
        file.write_all(contents)?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|err| err.error)?;
        Ok(())
    }
}

/// Whether `name` has the shape of a temp file written by `set`
fn is_temp_name(name: &str) -> bool {
    name.len() > TEMP_PREFIX.len() + TEMP_SUFFIX.len()
        && name.starts_with(TEMP_PREFIX)
        && name.ends_with(TEMP_SUFFIX)
}

/// Whether a file modified at `modified` is still within the temp grace period
fn is_recent(modified: SystemTime) -> bool {
    // A timestamp in the future counts as recent
    SystemTime::now()
        .duration_since(modified)
        .map(|age| age < TEMP_GRACE)
        .unwrap_or(true)
}

/// Computes `now + ttl`, saturating at the latest representable instant
fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Creates `dir` and any missing parents, readable only by the owner
fn create_private_dir(dir: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}

/// Removes an invalid entry file, returning whether this call deleted it
///
/// A file that is already gone was most likely removed by a concurrent reader
/// or sweep. Any other failure is worth a warning but never fails the caller.
fn discard(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "cache file already removed");
            false
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to remove invalid cache file");
            false
        }
    }
}
