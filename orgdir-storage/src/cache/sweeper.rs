//! Background reclamation of expired cache entries.
//!
//! Backends drop an expired entry when its key is read again. Keys that are
//! never read again, such as radius queries over arbitrary coordinates, stay
//! resident until a sweep removes them. [`CacheSweeper`] runs
//! [`ResultCache::purge_expired`] on a fixed interval until it is stopped.
//!
//! ```ignore
//! let sweeper = CacheSweeper::spawn(cache.clone(), Duration::from_secs(60));
//! // ... serve requests ...
//! let snapshot = sweeper.stop().await;
//! tracing::info!(reclaimed = snapshot.reclaimed, "sweeper stopped");
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::result_cache::ResultCache;

/// Default pause between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Counters updated by the sweep task.
#[derive(Debug, Default)]
pub struct SweepMetrics {
    pub cycles: AtomicU64,
    pub reclaimed: AtomicU64,
    pub errors: AtomicU64,
}

/// Point-in-time copy of [`SweepMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSnapshot {
    pub cycles: u64,
    pub reclaimed: u64,
    pub errors: u64,
}

impl SweepMetrics {
    pub fn snapshot(&self) -> SweepSnapshot {
        SweepSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            reclaimed: self.reclaimed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Handle to a running sweep task.
#[derive(Debug)]
pub struct CacheSweeper {
    shutdown_tx: watch::Sender<bool>,
    metrics: Arc<SweepMetrics>,
    handle: JoinHandle<()>,
}

impl CacheSweeper {
    /// Start sweeping `cache` every `every` on the current runtime.
    ///
    /// A zero interval is raised to one millisecond.
    pub fn spawn(cache: ResultCache, every: Duration) -> Self {
        let every = every.max(Duration::from_millis(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let metrics = Arc::new(SweepMetrics::default());
        let handle = tokio::spawn(sweep_task(cache, every, metrics.clone(), shutdown_rx));
        Self {
            shutdown_tx,
            metrics,
            handle,
        }
    }

    /// Counters so far.
    pub fn snapshot(&self) -> SweepSnapshot {
        self.metrics.snapshot()
    }

    /// Signal the task to stop and wait for it to finish.
    pub async fn stop(self) -> SweepSnapshot {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "cache sweep task ended abnormally");
        }
        self.metrics.snapshot()
    }
}

async fn sweep_task(
    cache: ResultCache,
    every: Duration,
    metrics: Arc<SweepMetrics>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        backend = cache.backend().name(),
        interval_ms = every.as_millis() as u64,
        "cache sweep task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                sweep_once(&cache, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    info!(
        cycles = snapshot.cycles,
        reclaimed = snapshot.reclaimed,
        errors = snapshot.errors,
        "cache sweep task stopped"
    );
}

async fn sweep_once(cache: &ResultCache, metrics: &SweepMetrics) {
    metrics.cycles.fetch_add(1, Ordering::Relaxed);
    match cache.purge_expired().await {
        Ok(removed) => {
            metrics.reclaimed.fetch_add(removed, Ordering::Relaxed);
            debug!(removed, "cache sweep cycle finished");
        }
        Err(e) => {
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            warn!(backend = cache.backend().name(), error = %e, "cache sweep failed");
        }
    }
}
