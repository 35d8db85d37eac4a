//! Limit/offset pagination.

use serde::{Deserialize, Serialize};

/// Page size when the caller does not send `limit`.
pub const DEFAULT_LIMIT: i64 = 10;

/// Largest page a caller may request.
pub const MAX_LIMIT: i64 = 1000;

/// A validated limit/offset window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    /// Rows per page, within `1..=MAX_LIMIT`.
    pub limit: i64,
    /// Rows to skip.
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Page {
    /// Build a page from raw query values, clamping out-of-range input.
    #[must_use]
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }

    /// Slice an in-memory, already ordered result set.
    #[must_use]
    pub fn slice<T: Clone>(&self, rows: &[T]) -> Vec<T> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // both clamped non-negative
        let (offset, limit) = (self.offset as usize, self.limit as usize);
        rows.iter().skip(offset).take(limit).cloned().collect()
    }
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paged<T> {
    /// Matching rows across all pages.
    pub count: i64,
    /// Rows of this page.
    pub results: Vec<T>,
}

impl<T> Paged<T> {
    /// Transform each row while keeping the count.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paged<U> {
        Paged {
            count: self.count,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}
