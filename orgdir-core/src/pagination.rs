//! Offset pagination

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Default page size when the caller does not supply one.
pub const DEFAULT_PAGE_LIMIT: i64 = 100;

/// Largest page size accepted.
pub const MAX_PAGE_LIMIT: i64 = 500;

/// A validated `skip`/`limit` window.
///
/// Out-of-range values are rejected rather than clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Page {
    skip: i64,
    limit: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Page {
    /// Validate `skip >= 0` and `1 <= limit <= MAX_PAGE_LIMIT`.
    pub fn new(skip: i64, limit: i64) -> Result<Self, ValidationError> {
        if skip < 0 {
            return Err(ValidationError::out_of_range("skip", skip, 0, i64::MAX));
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(ValidationError::out_of_range("limit", limit, 1, MAX_PAGE_LIMIT));
        }
        Ok(Self { skip, limit })
    }

    /// Build from optional query parameters, applying defaults.
    pub fn from_params(skip: Option<i64>, limit: Option<i64>) -> Result<Self, ValidationError> {
        Self::new(skip.unwrap_or(0), limit.unwrap_or(DEFAULT_PAGE_LIMIT))
    }

    pub fn skip(&self) -> i64 {
        self.skip
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Take this page's window out of an already ordered list.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let skip = usize::try_from(self.skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.limit).unwrap_or(usize::MAX);
        items.into_iter().skip(skip).take(limit).collect()
    }
}
