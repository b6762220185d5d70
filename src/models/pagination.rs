//! Pagination parameters and results

use serde::{Deserialize, Serialize};

/// Page size used when the client does not ask for one
pub const DEFAULT_PAGE_SIZE: u32 = 15;

/// Largest page size a client may request
pub const MAX_PAGE_SIZE: u32 = 50;

/// Pagination parameters for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ListParams {
    /// Page size is clamped to `1..=MAX_PAGE_SIZE`; the page number is kept
    /// as given so that out-of-range pages can be rejected by the caller.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page,
            per_page: per_page.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    /// Number of pages; an empty result still has one (empty) page.
    pub fn total_pages(&self) -> u32 {
        total_pages(self.total, self.per_page)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// False for page 0 and for pages past the last one.
    pub fn is_valid_page(&self) -> bool {
        self.page >= 1 && self.page <= self.total_pages()
    }
}

/// `ceil(total / per_page)`, at least 1
pub fn total_pages(total: i64, per_page: u32) -> u32 {
    if per_page == 0 || total <= 0 {
        return 1;
    }
    let per_page = per_page as i64;
    ((total + per_page - 1) / per_page) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_list_params_clamps_page_size() {
        assert_eq!(ListParams::new(1, 0).per_page, 1);
        assert_eq!(ListParams::new(1, 500).per_page, MAX_PAGE_SIZE);
        assert_eq!(ListParams::new(3, 10).offset(), 20);
    }

    #[test]
    fn test_empty_result_has_one_page() {
        let result: PagedResult<i32> = PagedResult::new(vec![], 0, &ListParams::new(1, 10));
        assert_eq!(result.total_pages(), 1);
        assert!(result.is_valid_page());
        assert!(!result.has_next());
        assert!(!result.has_prev());
    }

    #[test]
    fn test_page_past_end_is_invalid() {
        let result: PagedResult<i32> = PagedResult::new(vec![], 20, &ListParams::new(3, 10));
        assert!(!result.is_valid_page());
        let zero: PagedResult<i32> = PagedResult::new(vec![], 20, &ListParams::new(0, 10));
        assert!(!zero.is_valid_page());
    }

    proptest! {
        #[test]
        fn total_pages_is_ceiling(total in 1i64..10_000, per_page in 1u32..=MAX_PAGE_SIZE) {
            let pages = total_pages(total, per_page) as i64;
            prop_assert!(pages * per_page as i64 >= total);
            prop_assert!((pages - 1) * (per_page as i64) < total);
        }

        #[test]
        fn offsets_partition_the_range(total in 0i64..500, per_page in 1u32..=MAX_PAGE_SIZE) {
            let pages = total_pages(total, per_page);
            let mut covered = 0i64;
            for page in 1..=pages {
                let params = ListParams::new(page, per_page);
                prop_assert_eq!(params.offset(), covered);
                covered += params.limit().min(total - covered);
            }
            prop_assert_eq!(covered, total);
        }
    }
}
