//! Pagination types for list endpoints.

use serde::{Deserialize, Serialize};

/// Default page size.
pub const DEFAULT_PAGE_SIZE: u64 = 20;
/// Maximum page size.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Request parameters for limit/offset paginated queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageRequest {
    /// Maximum number of items to return.
    #[serde(default = "default_limit")]
    pub limit: u64,
    /// Number of items to skip.
    #[serde(default)]
    pub offset: u64,
}

impl PageRequest {
    /// Create a new page request, clamping the limit to `1..=MAX_PAGE_SIZE`.
    pub fn new(limit: u64, offset: u64) -> Self {
        Self {
            limit: limit.clamp(1, MAX_PAGE_SIZE),
            offset,
        }
    }

    /// Re-clamp the limit against a configured ceiling.
    pub fn clamped(self, max_limit: u64) -> Self {
        Self {
            limit: self.limit.clamp(1, max_limit.max(1)),
            offset: self.offset,
        }
    }

    /// Return the SQL `LIMIT` value.
    pub fn limit(&self) -> i64 {
        self.limit as i64
    }

    /// Return the SQL `OFFSET` value.
    pub fn offset(&self) -> i64 {
        self.offset as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

fn default_limit() -> u64 {
    DEFAULT_PAGE_SIZE
}
