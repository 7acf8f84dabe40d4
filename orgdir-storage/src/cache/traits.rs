//! Cache backend trait and statistics types.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orgdir_core::OrgdirResult;

/// A raw cache entry as stored by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    /// Serialized value.
    pub value: Vec<u8>,
    /// When the value was stored.
    pub cached_at: DateTime<Utc>,
    /// When the value stops being served.
    pub expires_at: DateTime<Utc>,
}

impl CachedEntry {
    /// Build an entry that expires `ttl` after `cached_at`.
    pub fn new(value: Vec<u8>, cached_at: DateTime<Utc>, ttl: Duration) -> Self {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| cached_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            value,
            cached_at,
            expires_at,
        }
    }

    /// Returns true once `now` has reached the expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Key-value store with per-key TTL.
///
/// Keys are opaque strings produced by [`super::QueryFingerprint`]. Backends
/// must treat expired entries as absent. Expired keys that are never read
/// again are reclaimed by [`CacheBackend::purge_expired`], which
/// [`super::CacheSweeper`] calls periodically.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short backend name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Get a live entry.
    async fn get(&self, key: &str) -> OrgdirResult<Option<CachedEntry>>;

    /// Store a value with a time-to-live.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> OrgdirResult<()>;

    /// Delete one key. Returns true if it existed.
    async fn delete(&self, key: &str) -> OrgdirResult<bool>;

    /// Delete every key starting with `prefix`. Returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> OrgdirResult<u64>;

    /// Remove every expired entry. Returns how many were dropped.
    async fn purge_expired(&self) -> OrgdirResult<u64>;

    /// Backend-level statistics.
    async fn stats(&self) -> OrgdirResult<BackendStats>;
}

/// Statistics reported by a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendStats {
    /// Number of entries currently stored (expired entries may be included
    /// until they are swept).
    pub entry_count: u64,
    /// Approximate payload size in bytes.
    pub memory_bytes: u64,
    /// Entries removed because their TTL elapsed.
    pub expired: u64,
}

/// Counters kept by the result cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the backend.
    pub hits: u64,
    /// Lookups that found nothing live.
    pub misses: u64,
    /// Callers that joined a computation already in flight.
    pub shared: u64,
    /// Computations actually run.
    pub computations: u64,
    /// Backend faults (unavailable, corrupt entries, failed writes).
    pub backend_errors: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
