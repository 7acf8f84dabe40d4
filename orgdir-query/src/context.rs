//! Explicitly constructed engine context.
//!
//! Owns the gateway, the result cache and the planner built over them.
//! There is no global state: every consumer receives a `DirectoryEngine`
//! (or a clone of it) from whoever wired the process together.

use std::sync::Arc;
use std::time::Duration;

use orgdir_core::OrgdirResult;
use orgdir_storage::{
    BackendStats, CacheBackend, CacheConfig, CacheStats, CacheSweeper, InMemoryCacheBackend,
    ResultCache, StorageGateway,
};
use tracing::info;

use crate::planner::{PlannerConfig, QueryPlanner};

/// Wired-up query engine. Cheap to clone.
#[derive(Clone)]
pub struct DirectoryEngine {
    planner: QueryPlanner,
    cache: ResultCache,
    gateway: Arc<dyn StorageGateway>,
}

impl DirectoryEngine {
    pub fn new(
        gateway: Arc<dyn StorageGateway>,
        backend: Arc<dyn CacheBackend>,
        cache_config: CacheConfig,
        planner_config: PlannerConfig,
    ) -> Self {
        info!(
            backend = backend.name(),
            cache_enabled = cache_config.enabled,
            ttl_secs = cache_config.default_ttl.as_secs(),
            "directory engine initialized"
        );
        let cache = ResultCache::new(backend, cache_config);
        let planner = QueryPlanner::new(gateway.clone(), cache.clone(), planner_config);
        Self {
            planner,
            cache,
            gateway,
        }
    }

    /// Engine over `gateway` with an in-process cache and default limits.
    pub fn in_memory(gateway: Arc<dyn StorageGateway>) -> Self {
        Self::new(
            gateway,
            Arc::new(InMemoryCacheBackend::new()),
            CacheConfig::default(),
            PlannerConfig::default(),
        )
    }

    pub fn planner(&self) -> &QueryPlanner {
        &self.planner
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub async fn backend_stats(&self) -> OrgdirResult<BackendStats> {
        self.cache.backend_stats().await
    }

    /// Start reclaiming expired cache entries every `every` on the current
    /// runtime. Stop the returned handle on shutdown.
    pub fn spawn_cache_sweeper(&self, every: Duration) -> CacheSweeper {
        CacheSweeper::spawn(self.cache.clone(), every)
    }

    /// Readiness probe against the storage gateway.
    pub async fn ping_storage(&self) -> OrgdirResult<()> {
        self.gateway.ping().await
    }
}

impl std::fmt::Debug for DirectoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryEngine")
            .field("planner", &self.planner)
            .finish_non_exhaustive()
    }
}
