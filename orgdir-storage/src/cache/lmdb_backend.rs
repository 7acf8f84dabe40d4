//! LMDB-backed cache backend.
//!
//! Uses the heed crate (Rust bindings for LMDB) for a memory-mapped,
//! persistent key-value store that survives process restarts.
//!
//! # Value Format
//!
//! `[cached_at millis: 8 bytes LE][expires_at millis: 8 bytes LE][payload]`
//!
//! Expired entries are reported as misses and deleted on the next read.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use orgdir_core::{CacheError, OrgdirError, OrgdirResult};

use super::traits::{BackendStats, CacheBackend, CachedEntry};

const HEADER_LEN: usize = 16;

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Stored bytes do not follow the value format.
    #[error("Corrupt entry {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for OrgdirError {
    fn from(e: LmdbCacheError) -> Self {
        match e {
            LmdbCacheError::Corrupt { key, reason } => {
                OrgdirError::Cache(CacheError::Corrupt { key, reason })
            }
            other => OrgdirError::Cache(CacheError::Unavailable {
                backend: "lmdb".to_string(),
                reason: other.to_string(),
            }),
        }
    }
}

fn txn_err(e: heed::Error) -> LmdbCacheError {
    LmdbCacheError::Transaction(e.to_string())
}

/// LMDB-backed cache backend.
///
/// # Example
///
/// ```ignore
/// let backend = LmdbCacheBackend::new("/var/cache/orgdir", 64)?;
/// backend.set("orgdir:building:get:ab12", b"{}", Duration::from_secs(60)).await?;
/// ```
pub struct LmdbCacheBackend {
    env: Env,
    db: Database<Bytes, Bytes>,
    expired: AtomicU64,
}

impl LmdbCacheBackend {
    /// Create a new LMDB cache backend.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per directory by this process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_err)?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;
        wtxn.commit().map_err(txn_err)?;

        Ok(Self {
            env,
            db,
            expired: AtomicU64::new(0),
        })
    }

    fn encode(entry: &CachedEntry) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + entry.value.len());
        bytes.extend_from_slice(&entry.cached_at.timestamp_millis().to_le_bytes());
        bytes.extend_from_slice(&entry.expires_at.timestamp_millis().to_le_bytes());
        bytes.extend_from_slice(&entry.value);
        bytes
    }

    fn decode(key: &str, bytes: &[u8]) -> Result<CachedEntry, LmdbCacheError> {
        let corrupt = |reason: &str| LmdbCacheError::Corrupt {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        if bytes.len() < HEADER_LEN {
            return Err(corrupt("entry shorter than header"));
        }
        let millis = |range: std::ops::Range<usize>| -> Result<DateTime<Utc>, LmdbCacheError> {
            let raw: [u8; 8] = bytes[range]
                .try_into()
                .map_err(|_| corrupt("invalid timestamp"))?;
            DateTime::from_timestamp_millis(i64::from_le_bytes(raw))
                .ok_or_else(|| corrupt("timestamp out of range"))
        };
        Ok(CachedEntry {
            cached_at: millis(0..8)?,
            expires_at: millis(8..16)?,
            value: bytes[HEADER_LEN..].to_vec(),
        })
    }

    /// Iterate over keys matching a prefix and collect them.
    fn collect_keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, LmdbCacheError> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let mut keys = Vec::new();
        for result in self.db.iter(&rtxn).map_err(txn_err)? {
            let (key, _) = result.map_err(txn_err)?;
            if key.starts_with(prefix) {
                keys.push(key.to_vec());
            }
        }
        Ok(keys)
    }

    fn remove_keys(&self, keys: &[Vec<u8>]) -> Result<u64, LmdbCacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let mut deleted = 0u64;
        for key in keys {
            if self.db.delete(&mut wtxn, key).map_err(txn_err)? {
                deleted += 1;
            }
        }
        wtxn.commit().map_err(txn_err)?;
        Ok(deleted)
    }

    /// Remove every expired entry. Returns how many were dropped.
    pub fn sweep_expired(&self) -> Result<u64, LmdbCacheError> {
        let now = Utc::now();
        let expired_keys = {
            let rtxn = self.env.read_txn().map_err(txn_err)?;
            let mut keys = Vec::new();
            for result in self.db.iter(&rtxn).map_err(txn_err)? {
                let (key, bytes) = result.map_err(txn_err)?;
                let key_str = String::from_utf8_lossy(key);
                let stale = match Self::decode(&key_str, bytes) {
                    Ok(entry) => entry.is_expired_at(now),
                    Err(_) => true,
                };
                if stale {
                    keys.push(key.to_vec());
                }
            }
            keys
        };
        let removed = self.remove_keys(&expired_keys)?;
        self.expired.fetch_add(removed, Ordering::Relaxed);
        Ok(removed)
    }

    fn get_sync(&self, key: &str) -> Result<Option<CachedEntry>, LmdbCacheError> {
        let entry = {
            let rtxn = self.env.read_txn().map_err(txn_err)?;
            match self.db.get(&rtxn, key.as_bytes()).map_err(txn_err)? {
                Some(bytes) => Self::decode(key, bytes)?,
                None => return Ok(None),
            }
        };
        if entry.is_expired() {
            if self.remove_keys(&[key.as_bytes().to_vec()])? > 0 {
                self.expired.fetch_add(1, Ordering::Relaxed);
            }
            return Ok(None);
        }
        Ok(Some(entry))
    }

    fn set_sync(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), LmdbCacheError> {
        let entry = CachedEntry::new(value.to_vec(), Utc::now(), ttl);
        let bytes = Self::encode(&entry);
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        self.db
            .put(&mut wtxn, key.as_bytes(), &bytes)
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(())
    }

    fn stats_sync(&self) -> Result<BackendStats, LmdbCacheError> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let mut stats = BackendStats {
            expired: self.expired.load(Ordering::Relaxed),
            ..Default::default()
        };
        for result in self.db.iter(&rtxn).map_err(txn_err)? {
            let (key, bytes) = result.map_err(txn_err)?;
            stats.entry_count += 1;
            stats.memory_bytes += (key.len() + bytes.len()) as u64;
        }
        Ok(stats)
    }
}

#[async_trait]
impl CacheBackend for LmdbCacheBackend {
    fn name(&self) -> &'static str {
        "lmdb"
    }

    async fn get(&self, key: &str) -> OrgdirResult<Option<CachedEntry>> {
        Ok(self.get_sync(key)?)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> OrgdirResult<()> {
        Ok(self.set_sync(key, value, ttl)?)
    }

    async fn delete(&self, key: &str) -> OrgdirResult<bool> {
        Ok(self.remove_keys(&[key.as_bytes().to_vec()])? > 0)
    }

    async fn delete_prefix(&self, prefix: &str) -> OrgdirResult<u64> {
        let keys = self.collect_keys_with_prefix(prefix.as_bytes())?;
        Ok(self.remove_keys(&keys)?)
    }

    async fn purge_expired(&self) -> OrgdirResult<u64> {
        Ok(self.sweep_expired()?)
    }

    async fn stats(&self) -> OrgdirResult<BackendStats> {
        Ok(self.stats_sync()?)
    }
}
