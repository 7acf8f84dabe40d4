//! Behavioural tests for the result cache: hits, expiry, single-flight,
//! error propagation, invalidation and degraded backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use orgdir_core::{CacheError, EntityKind, OrgdirError, OrgdirResult, StorageError};
use orgdir_storage::{
    BackendStats, CacheBackend, CacheConfig, CacheNamespace, CacheOrigin, CachedEntry,
    CacheSweeper, InMemoryCacheBackend, QueryFingerprint, ResultCache,
};

const TTL: Duration = Duration::from_secs(60);

fn cache() -> (ResultCache, Arc<InMemoryCacheBackend>) {
    let backend = Arc::new(InMemoryCacheBackend::new());
    let cache = ResultCache::new(backend.clone(), CacheConfig::default());
    (cache, backend)
}

fn org_fp(id: i64) -> QueryFingerprint {
    QueryFingerprint::new(CacheNamespace::Organization, "get").int("id", id)
}

fn counting(
    calls: &Arc<AtomicUsize>,
    value: Vec<i64>,
) -> impl FnOnce() -> std::pin::Pin<Box<dyn std::future::Future<Output = OrgdirResult<Vec<i64>>> + Send>>
       + Send
       + 'static {
    let calls = calls.clone();
    move || {
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        })
    }
}

#[tokio::test]
async fn test_second_lookup_is_served_from_cache() {
    let (cache, _backend) = cache();
    let calls = Arc::new(AtomicUsize::new(0));

    let first = cache
        .get_or_compute(&org_fp(1), TTL, counting(&calls, vec![1, 2, 3]))
        .await
        .expect("first lookup should succeed");
    assert_eq!(first.origin(), CacheOrigin::Computed);

    let second = cache
        .get_or_compute(&org_fp(1), TTL, counting(&calls, vec![9]))
        .await
        .expect("second lookup should succeed");
    assert!(second.was_cache_hit());
    assert_eq!(second.into_value(), vec![1, 2, 3]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.computations, 1);
}

#[tokio::test]
async fn test_distinct_fingerprints_do_not_share_entries() {
    let (cache, _backend) = cache();
    let calls = Arc::new(AtomicUsize::new(0));

    let a = cache
        .get_or_compute(&org_fp(1), TTL, counting(&calls, vec![1]))
        .await
        .expect("lookup");
    let b = cache
        .get_or_compute(&org_fp(2), TTL, counting(&calls, vec![2]))
        .await
        .expect("lookup");
    assert_eq!(a.into_value(), vec![1]);
    assert_eq!(b.into_value(), vec![2]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_expired_entry_is_recomputed() {
    let (cache, _backend) = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let ttl = Duration::from_millis(50);

    cache
        .get_or_compute(&org_fp(1), ttl, counting(&calls, vec![1]))
        .await
        .expect("lookup");
    tokio::time::sleep(Duration::from_millis(120)).await;
    let again = cache
        .get_or_compute(&org_fp(1), ttl, counting(&calls, vec![2]))
        .await
        .expect("lookup");

    assert_eq!(again.origin(), CacheOrigin::Computed);
    assert_eq!(again.into_value(), vec![2]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_one_computation() {
    let (cache, _backend) = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let fp = org_fp(42);

    let lookups = (0..16).map(|_| {
        let cache = cache.clone();
        let calls = calls.clone();
        let fp = fp.clone();
        tokio::spawn(async move {
            cache
                .get_or_compute(&fp, TTL, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok::<_, OrgdirError>(vec![4, 2])
                })
                .await
        })
    });

    let results = join_all(lookups).await;
    for result in results {
        let read = result
            .expect("task should not panic")
            .expect("lookup should succeed");
        assert_eq!(read.into_value(), vec![4, 2]);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().computations, 1);
    assert_eq!(cache.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_leader_does_not_abort_computation() {
    let (cache, backend) = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let fp = org_fp(7);

    let leader = {
        let cache = cache.clone();
        let calls = calls.clone();
        let fp = fp.clone();
        tokio::spawn(async move {
            cache
                .get_or_compute(&fp, TTL, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(80)).await;
                    Ok::<_, OrgdirError>("done".to_string())
                })
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    leader.abort();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(backend.len(), 1, "shared computation should still populate the cache");

    let read = cache
        .get_or_compute(&fp, TTL, move || async move {
            Ok::<_, OrgdirError>("recomputed".to_string())
        })
        .await
        .expect("lookup should succeed");
    assert!(read.was_cache_hit());
    assert_eq!(read.into_value(), "done");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_errors_reach_every_waiter_and_are_not_cached() {
    let (cache, backend) = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let fp = org_fp(404);

    let lookups = (0..4).map(|_| {
        let cache = cache.clone();
        let calls = calls.clone();
        let fp = fp.clone();
        tokio::spawn(async move {
            cache
                .get_or_compute(&fp, TTL, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(80)).await;
                    Err::<Vec<i64>, _>(OrgdirError::not_found(EntityKind::Organization, 404))
                })
                .await
        })
    });

    for result in join_all(lookups).await {
        let err = result
            .expect("task should not panic")
            .expect_err("lookup should fail");
        assert!(err.is_not_found());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(backend.is_empty());

    let retry = cache
        .get_or_compute(&fp, TTL, counting(&calls, vec![1]))
        .await
        .expect("retry should compute again");
    assert_eq!(retry.origin(), CacheOrigin::Computed);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_invalidate_namespace_only_touches_that_namespace() {
    let (cache, _backend) = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let list_fp =
        QueryFingerprint::new(CacheNamespace::Organizations, "by_building").int("building_id", 1);

    cache
        .get_or_compute(&org_fp(1), TTL, counting(&calls, vec![1]))
        .await
        .expect("lookup");
    cache
        .get_or_compute(&list_fp, TTL, counting(&calls, vec![1, 2]))
        .await
        .expect("lookup");

    let removed = cache
        .invalidate(CacheNamespace::Organization)
        .await
        .expect("invalidate should succeed");
    assert_eq!(removed, 1);

    let single = cache
        .get_or_compute(&org_fp(1), TTL, counting(&calls, vec![1]))
        .await
        .expect("lookup");
    let list = cache
        .get_or_compute(&list_fp, TTL, counting(&calls, vec![0]))
        .await
        .expect("lookup");

    assert_eq!(single.origin(), CacheOrigin::Computed);
    assert!(list.was_cache_hit());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_invalidate_all_clears_prefix() {
    let (cache, backend) = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    cache
        .get_or_compute(&org_fp(1), TTL, counting(&calls, vec![1]))
        .await
        .expect("lookup");
    backend
        .set("other:organization:get:x", b"[]", TTL)
        .await
        .expect("set");

    assert_eq!(cache.invalidate_all().await.expect("invalidate_all"), 1);
    assert_eq!(backend.len(), 1);
}

#[tokio::test]
async fn test_corrupt_entry_is_recomputed() {
    let (cache, backend) = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = org_fp(1).key(&cache.config().key_prefix);
    backend.set(&key, b"not json", TTL).await.expect("set");

    let read = cache
        .get_or_compute(&org_fp(1), TTL, counting(&calls, vec![1]))
        .await
        .expect("lookup should succeed despite corrupt entry");
    assert_eq!(read.origin(), CacheOrigin::Computed);
    assert_eq!(cache.stats().backend_errors, 1);

    let again = cache
        .get_or_compute(&org_fp(1), TTL, counting(&calls, vec![2]))
        .await
        .expect("lookup");
    assert!(again.was_cache_hit());
    assert_eq!(again.into_value(), vec![1]);
}

#[tokio::test]
async fn test_disabled_cache_always_computes() {
    let backend = Arc::new(InMemoryCacheBackend::new());
    let cache = ResultCache::new(backend.clone(), CacheConfig::disabled());
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let read = cache
            .get_or_compute(&org_fp(1), TTL, counting(&calls, vec![1]))
            .await
            .expect("lookup");
        assert_eq!(read.origin(), CacheOrigin::Bypassed);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(backend.is_empty());
}

#[tokio::test]
async fn test_namespace_ttl_override() {
    let config = CacheConfig::new()
        .with_ttl(Duration::from_secs(3600))
        .with_namespace_ttl(CacheNamespace::Buildings, Duration::from_secs(5));
    assert_eq!(config.ttl_for(CacheNamespace::Buildings), Duration::from_secs(5));
    assert_eq!(config.ttl_for(CacheNamespace::Building), Duration::from_secs(3600));
}

/// Backend that fails every operation.
struct FailingBackend;

fn unavailable() -> OrgdirError {
    OrgdirError::Cache(CacheError::Unavailable {
        backend: "failing".to_string(),
        reason: "connection refused".to_string(),
    })
}

#[async_trait]
impl CacheBackend for FailingBackend {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn get(&self, _key: &str) -> OrgdirResult<Option<CachedEntry>> {
        Err(unavailable())
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> OrgdirResult<()> {
        Err(unavailable())
    }

    async fn delete(&self, _key: &str) -> OrgdirResult<bool> {
        Err(unavailable())
    }

    async fn delete_prefix(&self, _prefix: &str) -> OrgdirResult<u64> {
        Err(unavailable())
    }

    async fn purge_expired(&self) -> OrgdirResult<u64> {
        Err(unavailable())
    }

    async fn stats(&self) -> OrgdirResult<BackendStats> {
        Err(unavailable())
    }
}

#[tokio::test]
async fn test_failing_backend_degrades_to_direct_computation() {
    let cache = ResultCache::with_defaults(Arc::new(FailingBackend));
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let read = cache
            .get_or_compute(&org_fp(1), TTL, counting(&calls, vec![1]))
            .await
            .expect("backend faults must not fail the lookup");
        assert_eq!(read.into_value(), vec![1]);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    // one failed read and one failed write per lookup
    assert_eq!(cache.stats().backend_errors, 4);
    assert!(cache.invalidate(CacheNamespace::Organization).await.is_err());
}

#[tokio::test]
async fn test_storage_errors_pass_through_unchanged() {
    let (cache, _backend) = cache();
    let err = cache
        .get_or_compute(&org_fp(1), TTL, || async {
            Err::<Vec<i64>, _>(OrgdirError::Storage(StorageError::Unavailable {
                reason: "db down".to_string(),
            }))
        })
        .await
        .expect_err("lookup should fail");
    assert!(matches!(
        err,
        OrgdirError::Storage(StorageError::Unavailable { .. })
    ));
}

fn radius_fp(latitude: f64) -> QueryFingerprint {
    QueryFingerprint::new(CacheNamespace::Organizations, "in_radius")
        .float("latitude", latitude)
        .float("longitude", 37.6173)
        .float("radius_km", 2.0)
}

#[tokio::test]
async fn test_purge_reclaims_expired_keys_that_are_never_read_again() {
    let (cache, backend) = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let short = Duration::from_millis(10);

    for i in 0..10_000 {
        cache
            .get_or_compute(&radius_fp(55.0 + i as f64 * 1e-5), short, counting(&calls, vec![i]))
            .await
            .expect("lookup should succeed");
    }
    cache
        .get_or_compute(&org_fp(1), TTL, counting(&calls, vec![1]))
        .await
        .expect("lookup should succeed");
    assert_eq!(backend.len(), 10_001);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let removed = cache.purge_expired().await.expect("purge should succeed");

    assert_eq!(removed, 10_000);
    assert_eq!(backend.len(), 1);
    let stats = cache.backend_stats().await.expect("stats");
    assert_eq!(stats.entry_count, 1);
    assert_eq!(stats.expired, 10_000);
}

#[tokio::test]
async fn test_sweeper_survives_a_failing_backend() {
    let cache = ResultCache::with_defaults(Arc::new(FailingBackend));
    let sweeper = CacheSweeper::spawn(cache, Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = sweeper.stop().await;
    assert!(snapshot.cycles >= 1);
    assert_eq!(snapshot.errors, snapshot.cycles);
    assert_eq!(snapshot.reclaimed, 0);
}
