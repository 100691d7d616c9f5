//! Pagination query parameter extractor.

use serde::{Deserialize, Serialize};

use civicpulse_core::types::pagination::{DEFAULT_PAGE_SIZE, PageRequest};

/// Query parameters for paginated endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaginationParams {
    /// Items per page (default: 20).
    pub limit: Option<u64>,
    /// Items to skip (default: 0).
    pub offset: Option<u64>,
}

impl PaginationParams {
    /// Converts to a `PageRequest`, capping the limit at `max_limit`.
    pub fn into_page_request(self, max_limit: u64) -> PageRequest {
        PageRequest {
            limit: self.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            offset: self.offset.unwrap_or(0),
        }
        .clamped(max_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_cap() {
        let page = PaginationParams::default().into_page_request(100);
        assert_eq!((page.limit, page.offset), (DEFAULT_PAGE_SIZE, 0));

        let page = PaginationParams {
            limit: Some(500),
            offset: Some(40),
        }
        .into_page_request(50);
        assert_eq!((page.limit, page.offset), (50, 40));

        let page = PaginationParams {
            limit: Some(0),
            offset: None,
        }
        .into_page_request(50);
        assert_eq!(page.limit, 1);
    }
}
