//! Values returned by the result cache, tagged with their origin.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Where a cached read came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOrigin {
    /// Served from a live backend entry.
    Cache,
    /// Computed by this caller's flight.
    Computed,
    /// Joined a computation another caller started.
    Shared,
    /// Caching disabled; computed directly.
    Bypassed,
}

/// Result of a cache lookup, carrying its origin and production time.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    produced_at: DateTime<Utc>,
    origin: CacheOrigin,
}

impl<T> CacheRead<T> {
    /// A value read from the backend.
    pub fn from_cache(value: T, cached_at: DateTime<Utc>) -> Self {
        Self {
            value,
            produced_at: cached_at,
            origin: CacheOrigin::Cache,
        }
    }

    /// A freshly produced value.
    pub fn fresh(value: T, origin: CacheOrigin) -> Self {
        Self {
            value,
            produced_at: Utc::now(),
            origin,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn origin(&self) -> CacheOrigin {
        self.origin
    }

    pub fn produced_at(&self) -> DateTime<Utc> {
        self.produced_at
    }

    /// Check if this was served from the backend.
    pub fn was_cache_hit(&self) -> bool {
        self.origin == CacheOrigin::Cache
    }

    /// Age of the value.
    pub fn staleness(&self) -> Duration {
        (Utc::now() - self.produced_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Map the inner value to a new type.
    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            produced_at: self.produced_at,
            origin: self.origin,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cache_is_hit() {
        let cached_at = Utc::now() - chrono::Duration::seconds(5);
        let read = CacheRead::from_cache(42, cached_at);
        assert!(read.was_cache_hit());
        assert!(read.staleness() >= Duration::from_secs(4));
        assert_eq!(read.produced_at(), cached_at);
    }

    #[test]
    fn test_fresh_and_map() {
        let read = CacheRead::fresh(vec![1, 2], CacheOrigin::Shared);
        assert!(!read.was_cache_hit());
        let len = read.map(|v| v.len());
        assert_eq!(len.origin(), CacheOrigin::Shared);
        assert_eq!(len.into_value(), 2);
    }
}
