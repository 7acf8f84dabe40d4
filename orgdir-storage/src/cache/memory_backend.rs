//! In-process cache backend on a concurrent hash map.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use orgdir_core::OrgdirResult;

use super::traits::{BackendStats, CacheBackend, CachedEntry};

/// Process-local backend. Expired entries are dropped on read and by
/// [`InMemoryCacheBackend::sweep_expired`], which a running
/// [`super::CacheSweeper`] calls periodically.
#[derive(Debug, Default)]
pub struct InMemoryCacheBackend {
    entries: DashMap<String, CachedEntry>,
    expired: AtomicU64,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every expired entry. Returns how many were dropped.
    pub fn sweep_expired(&self) -> u64 {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before.saturating_sub(self.entries.len()) as u64;
        self.expired.fetch_add(removed, Ordering::Relaxed);
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> OrgdirResult<Option<CachedEntry>> {
        let now = Utc::now();
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => return Ok(Some(entry.value().clone())),
            Some(_) => {}
            None => return Ok(None),
        }
        // shard guard released above; safe to take the write lock
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired_at(now))
            .is_some()
        {
            self.expired.fetch_add(1, Ordering::Relaxed);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> OrgdirResult<()> {
        self.entries.insert(
            key.to_string(),
            CachedEntry::new(value.to_vec(), Utc::now(), ttl),
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> OrgdirResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> OrgdirResult<u64> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before.saturating_sub(self.entries.len()) as u64)
    }

    async fn purge_expired(&self) -> OrgdirResult<u64> {
        Ok(self.sweep_expired())
    }

    async fn stats(&self) -> OrgdirResult<BackendStats> {
        let memory_bytes = self
            .entries
            .iter()
            .map(|entry| (entry.key().len() + entry.value().value.len()) as u64)
            .sum();
        Ok(BackendStats {
            entry_count: self.entries.len() as u64,
            memory_bytes,
            expired: self.expired.load(Ordering::Relaxed),
        })
    }
}
