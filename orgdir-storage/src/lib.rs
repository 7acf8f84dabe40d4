//! Orgdir Storage - Gateway Trait, In-Memory Gateway and Result Cache
//!
//! Defines the storage abstraction the query engine consumes. The PostgreSQL
//! implementation lives in orgdir-api; [`InMemoryGateway`] backs tests and
//! local development.

pub mod cache;
pub mod gateway;
pub mod memory;

pub use gateway::StorageGateway;
pub use memory::InMemoryGateway;

// Re-export cache types for planner and API integration
pub use cache::{
    BackendStats, CacheBackend, CacheConfig, CacheNamespace, CacheOrigin, CacheRead, CacheStats,
    CacheSweeper, CachedEntry, InMemoryCacheBackend, LmdbCacheBackend, LmdbCacheError,
    QueryFingerprint, ResultCache, SweepSnapshot, DEFAULT_SWEEP_INTERVAL,
};
