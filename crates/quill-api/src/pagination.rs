//! Standard list response wrapper.

use serde::Serialize;

use quill_core::defaults;

use crate::error::ApiError;

/// Pagination metadata for list responses.
#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    /// Total number of items matching the query (across all pages)
    pub total: usize,
    /// Maximum number of items per page
    pub limit: usize,
    /// Number of items skipped
    pub offset: usize,
    /// Whether more items are available after this page
    pub has_more: bool,
}

/// `{data, pagination}` envelope used by every list endpoint.
#[derive(Debug, Serialize)]
pub struct ListResponse<T: Serialize> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T: Serialize> ListResponse<T> {
    /// `has_more` is derived from offset, page length and total.
    pub fn new(data: Vec<T>, total: usize, limit: usize, offset: usize) -> Self {
        let has_more = offset + data.len() < total;
        Self {
            data,
            pagination: PaginationMeta {
                total,
                limit,
                offset,
                has_more,
            },
        }
    }
}

/// Resolve `limit`/`offset` query values, rejecting out-of-range input.
pub fn page_params(limit: Option<i64>, offset: Option<i64>) -> Result<(i64, i64), ApiError> {
    let limit = limit.unwrap_or(defaults::PAGE_LIMIT);
    if !(1..=defaults::PAGE_LIMIT_MAX).contains(&limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            defaults::PAGE_LIMIT_MAX
        )));
    }
    let offset = offset.unwrap_or(defaults::PAGE_OFFSET);
    if offset < 0 {
        return Err(ApiError::BadRequest("offset must not be negative".into()));
    }
    Ok((limit, offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_more() {
        let page = ListResponse::new(vec![1, 2], 5, 2, 0);
        assert!(page.pagination.has_more);
        let last = ListResponse::new(vec![5], 5, 2, 4);
        assert!(!last.pagination.has_more);
    }

    #[test]
    fn test_empty_page_past_end() {
        let page: ListResponse<i32> = ListResponse::new(vec![], 3, 10, 20);
        assert!(!page.pagination.has_more);
        assert_eq!(page.pagination.total, 3);
    }

    #[test]
    fn test_page_params_defaults() {
        assert_eq!(
            page_params(None, None).unwrap(),
            (defaults::PAGE_LIMIT, defaults::PAGE_OFFSET)
        );
    }

    #[test]
    fn test_page_params_rejects_out_of_range() {
        assert!(page_params(Some(0), None).is_err());
        assert!(page_params(Some(defaults::PAGE_LIMIT_MAX + 1), None).is_err());
        assert!(page_params(Some(10), Some(-1)).is_err());
        assert!(page_params(Some(defaults::PAGE_LIMIT_MAX), Some(0)).is_ok());
    }
}
