//! Cache-aside layer for query results.
//!
//! Results are stored under a canonical [`QueryFingerprint`] with a TTL.
//! [`ResultCache`] runs at most one computation per fingerprint at a time
//! (single-flight) and hands the outcome to every concurrent caller.
//!
//! The cache never fails a query: backend faults are logged, counted and
//! the value is computed directly.
//!
//! # Example
//!
//! ```ignore
//! let gateway = Arc::clone(&gateway);
//! let fp = QueryFingerprint::new(CacheNamespace::Organization, "get").int("id", 7);
//! let read = cache
//!     .get_or_compute(&fp, Duration::from_secs(60), move || async move {
//!         gateway
//!             .organization_get(7)
//!             .await?
//!             .ok_or_else(|| OrgdirError::not_found(EntityKind::Organization, 7))
//!     })
//!     .await?;
//!
//! if read.was_cache_hit() {
//!     tracing::debug!("served from cache");
//! }
//! ```

pub mod cache_read;
pub mod fingerprint;
pub mod lmdb_backend;
pub mod memory_backend;
pub mod result_cache;
pub mod sweeper;
pub mod traits;

pub use cache_read::{CacheOrigin, CacheRead};
pub use fingerprint::{CacheNamespace, QueryFingerprint};
pub use lmdb_backend::{LmdbCacheBackend, LmdbCacheError};
pub use memory_backend::InMemoryCacheBackend;
pub use result_cache::{CacheConfig, ResultCache};
pub use sweeper::{CacheSweeper, SweepMetrics, SweepSnapshot, DEFAULT_SWEEP_INTERVAL};
pub use traits::{BackendStats, CacheBackend, CacheStats, CachedEntry};
