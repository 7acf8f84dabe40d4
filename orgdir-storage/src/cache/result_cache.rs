//! Cache-aside result cache with TTL expiry and single-flight computation.
//!
//! Lookup order for [`ResultCache::get_or_compute`]:
//!
//! 1. Live backend entry: deserialize and return it.
//! 2. Miss, expiry or backend fault: join the flight for this key, or start
//!    one. The flight runs `compute` on its own task, stores a successful
//!    result with the TTL and publishes the outcome to every waiter.
//!
//! Errors from `compute` reach every waiter and are never stored. Backend
//! faults are logged and counted, never returned.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use orgdir_core::{CacheError, OrgdirError, OrgdirResult};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::cache_read::{CacheOrigin, CacheRead};
use super::fingerprint::{CacheNamespace, QueryFingerprint};
use super::traits::{BackendStats, CacheBackend, CacheStats};

/// Configuration for the result cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false every call computes directly.
    pub enabled: bool,
    /// TTL for namespaces without an override.
    pub default_ttl: Duration,
    /// Prefix of every backend key owned by this cache.
    pub key_prefix: String,
    /// Per-namespace TTL overrides.
    pub namespace_ttls: HashMap<CacheNamespace, Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::from_secs(3600),
            key_prefix: "orgdir".to_string(),
            namespace_ttls: HashMap::new(),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// A config that bypasses the cache entirely.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Set the default TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Override the TTL of one namespace.
    pub fn with_namespace_ttl(mut self, namespace: CacheNamespace, ttl: Duration) -> Self {
        self.namespace_ttls.insert(namespace, ttl);
        self
    }

    /// Enable or disable caching.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Effective TTL for a namespace.
    pub fn ttl_for(&self, namespace: CacheNamespace) -> Duration {
        self.namespace_ttls
            .get(&namespace)
            .copied()
            .unwrap_or(self.default_ttl)
    }
}

/// Outcome published by a flight. `None` while the computation runs.
type Outcome = Option<Result<Arc<[u8]>, OrgdirError>>;

type FlightMap = Arc<Mutex<HashMap<String, watch::Receiver<Outcome>>>>;

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    shared: AtomicU64,
    computations: AtomicU64,
    backend_errors: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Removes a flight from the in-flight map when its task ends, including
/// by panic.
struct FlightGuard {
    flights: FlightMap,
    key: String,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if let Ok(mut flights) = self.flights.lock() {
            flights.remove(&self.key);
        }
    }
}

/// Cache-aside result cache keyed by [`QueryFingerprint`].
///
/// Cheap to clone; clones share the backend, counters and in-flight map.
#[derive(Clone)]
pub struct ResultCache {
    backend: Arc<dyn CacheBackend>,
    config: CacheConfig,
    flights: FlightMap,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish()
    }
}

impl ResultCache {
    /// Create a new result cache.
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        Self {
            backend,
            config,
            flights: Arc::new(Mutex::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Create a new result cache with default configuration.
    pub fn with_defaults(backend: Arc<dyn CacheBackend>) -> Self {
        Self::new(backend, CacheConfig::default())
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a reference to the cache backend.
    pub fn backend(&self) -> &dyn CacheBackend {
        self.backend.as_ref()
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            shared: self.counters.shared.load(Ordering::Relaxed),
            computations: self.counters.computations.load(Ordering::Relaxed),
            backend_errors: self.counters.backend_errors.load(Ordering::Relaxed),
        }
    }

    /// Statistics reported by the backend.
    pub async fn backend_stats(&self) -> OrgdirResult<BackendStats> {
        self.backend.stats().await
    }

    /// Number of computations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.flights.lock().map(|f| f.len()).unwrap_or(0)
    }

    /// Like [`Self::get_or_compute`] with the namespace's configured TTL.
    pub async fn fetch<T, F, Fut>(
        &self,
        fingerprint: &QueryFingerprint,
        compute: F,
    ) -> OrgdirResult<CacheRead<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = OrgdirResult<T>> + Send + 'static,
    {
        let ttl = self.config.ttl_for(fingerprint.namespace());
        self.get_or_compute(fingerprint, ttl, compute).await
    }

    /// Return the cached value for `fingerprint`, computing and storing it
    /// on a miss. At most one computation per fingerprint runs at a time.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        fingerprint: &QueryFingerprint,
        ttl: Duration,
        compute: F,
    ) -> OrgdirResult<CacheRead<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = OrgdirResult<T>> + Send + 'static,
    {
        if !self.config.enabled {
            return compute()
                .await
                .map(|value| CacheRead::fresh(value, CacheOrigin::Bypassed));
        }

        let key = fingerprint.key(&self.config.key_prefix);

        if let Some(read) = self.lookup::<T>(&key).await {
            Counters::bump(&self.counters.hits);
            debug!(key = %key, "cache hit");
            return Ok(read);
        }
        Counters::bump(&self.counters.misses);

        let (mut rx, origin) = self.join_or_lead(&key, ttl, compute)?;

        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(published) => published.clone(),
            Err(_) => None,
        };

        match outcome {
            Some(Ok(bytes)) => {
                let value: T = serde_json::from_slice(&bytes).map_err(|e| {
                    OrgdirError::Cache(CacheError::Serialization {
                        reason: e.to_string(),
                    })
                })?;
                Ok(CacheRead::fresh(value, origin))
            }
            Some(Err(err)) => Err(err),
            None => Err(OrgdirError::internal(format!(
                "computation for {} ended without a result",
                key
            ))),
        }
    }

    /// Live, decodable entry for `key`, if any. Faults are logged and
    /// treated as misses.
    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<CacheRead<T>> {
        let entry = match self.backend.get(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                self.record_fault(key, &e);
                return None;
            }
        };
        if entry.is_expired() {
            return None;
        }
        match serde_json::from_slice::<T>(&entry.value) {
            Ok(value) => Some(CacheRead::from_cache(value, entry.cached_at)),
            Err(e) => {
                self.record_fault(
                    key,
                    &OrgdirError::Cache(CacheError::Corrupt {
                        key: key.to_string(),
                        reason: e.to_string(),
                    }),
                );
                if let Err(e) = self.backend.delete(key).await {
                    self.record_fault(key, &e);
                }
                None
            }
        }
    }

    /// Subscribe to the flight for `key`, starting it if none is running.
    fn join_or_lead<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> OrgdirResult<(watch::Receiver<Outcome>, CacheOrigin)>
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = OrgdirResult<T>> + Send + 'static,
    {
        let mut flights = self
            .flights
            .lock()
            .map_err(|_| OrgdirError::internal("in-flight map lock poisoned"))?;

        if let Some(rx) = flights.get(key) {
            Counters::bump(&self.counters.shared);
            debug!(key = %key, "joining in-flight computation");
            return Ok((rx.clone(), CacheOrigin::Shared));
        }

        let (tx, rx) = watch::channel::<Outcome>(None);
        flights.insert(key.to_string(), rx.clone());
        drop(flights);

        let guard = FlightGuard {
            flights: Arc::clone(&self.flights),
            key: key.to_string(),
        };
        let backend = Arc::clone(&self.backend);
        let counters = Arc::clone(&self.counters);
        let key = key.to_string();

        tokio::spawn(async move {
            let _guard = guard;
            Counters::bump(&counters.computations);

            let outcome = match compute().await {
                Ok(value) => match serde_json::to_vec(&value) {
                    Ok(bytes) => {
                        if let Err(e) = backend.set(&key, &bytes, ttl).await {
                            Counters::bump(&counters.backend_errors);
                            warn!(key = %key, error = %e, "cache write failed");
                        }
                        Ok(Arc::<[u8]>::from(bytes))
                    }
                    Err(e) => Err(OrgdirError::Cache(CacheError::Serialization {
                        reason: e.to_string(),
                    })),
                },
                Err(err) => {
                    debug!(key = %key, error = %err, "computation failed; not cached");
                    Err(err)
                }
            };

            // No receivers left is fine: the value is already stored.
            let _ = tx.send(Some(outcome));
        });

        Ok((rx, CacheOrigin::Computed))
    }

    fn record_fault(&self, key: &str, err: &OrgdirError) {
        Counters::bump(&self.counters.backend_errors);
        warn!(
            backend = self.backend.name(),
            key = %key,
            error = %err,
            "cache backend fault; computing directly"
        );
    }

    /// Delete every entry of a namespace. Returns how many were removed.
    pub async fn invalidate(&self, namespace: CacheNamespace) -> OrgdirResult<u64> {
        let prefix = namespace.key_prefix(&self.config.key_prefix);
        let removed = self.backend.delete_prefix(&prefix).await?;
        debug!(namespace = %namespace, removed, "cache namespace invalidated");
        Ok(removed)
    }

    /// Drop expired entries from the backend. Returns how many were removed.
    pub async fn purge_expired(&self) -> OrgdirResult<u64> {
        let removed = self.backend.purge_expired().await?;
        if removed > 0 {
            debug!(backend = self.backend.name(), removed, "expired cache entries purged");
        }
        Ok(removed)
    }

    /// Delete every entry owned by this cache.
    pub async fn invalidate_all(&self) -> OrgdirResult<u64> {
        let prefix = format!("{}:", self.config.key_prefix);
        let removed = self.backend.delete_prefix(&prefix).await?;
        debug!(removed, "cache cleared");
        Ok(removed)
    }
}
