//! Pagination types

use serde::{Deserialize, Serialize};

use super::{ValidationError, ValidationErrors};

/// Largest `limit` a client may ask for before validation fails
const MAX_REQUESTED_LIMIT: i64 = 100;

/// Pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Page number (1-indexed)
    pub page: u32,
    /// Items per page
    pub limit: u32,
}

impl Pagination {
    /// Create pagination, clamping page to at least 1 and limit to `1..=max_limit`.
    pub fn new(page: u32, limit: u32, max_limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, max_limit.max(1)),
        }
    }

    /// Validate raw query parameters, then apply defaults and the listing cap.
    ///
    /// `page` must be ≥ 1 and `limit` within 1..=100 when present.
    pub fn from_params(
        params: &PaginationParams,
        default_limit: u32,
        max_limit: u32,
    ) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(page) = params.page {
            if page < 1 {
                errors.push(ValidationError::OutOfRange {
                    field: "page",
                    min: 1,
                    max: i64::from(u32::MAX),
                });
            }
        }
        if let Some(limit) = params.limit {
            if !(1..=MAX_REQUESTED_LIMIT).contains(&limit) {
                errors.push(ValidationError::OutOfRange {
                    field: "limit",
                    min: 1,
                    max: MAX_REQUESTED_LIMIT,
                });
            }
        }
        errors.finish()?;

        let page = params.page.map_or(1, |p| p.min(i64::from(u32::MAX)) as u32);
        let limit = params.limit.map_or(default_limit, |l| l as u32);
        Ok(Self::new(page, limit, max_limit))
    }

    /// Calculate SQL OFFSET value.
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }

    /// Get LIMIT value.
    pub fn limit(&self) -> i64 {
        i64::from(self.limit)
    }

    /// Total taken from a `COUNT(*) OVER()` column on the page's first row.
    ///
    /// `None` means the page came back empty past page 1, where the window
    /// has no rows to report on and the caller has to count separately.
    pub fn window_total(&self, first_row_total: Option<i64>) -> Option<i64> {
        match first_row_total {
            Some(total) => Some(total),
            None if self.page == 1 => Some(0),
            None => None,
        }
    }
}

/// One page of results plus the total across all pages
#[derive(Debug, Clone)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: Pagination,
}

impl<T> Paginated<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
        }
    }

    /// Pagination block for the response envelope.
    pub fn meta(&self) -> PaginationMeta {
        PaginationMeta::new(self.page, self.total)
    }
}

/// `pagination` member of list responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl PaginationMeta {
    pub fn new(page: Pagination, total: i64) -> Self {
        let limit = i64::from(page.limit);
        Self {
            page: page.page,
            limit: page.limit,
            total,
            total_pages: (total.max(0) + limit - 1) / limit,
        }
    }
}

/// Query parameters for pagination
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<i64>, limit: Option<i64>) -> PaginationParams {
        PaginationParams { page, limit }
    }

    #[test]
    fn offset_calculation() {
        assert_eq!(Pagination::new(1, 10, 50).offset(), 0);
        assert_eq!(Pagination::new(2, 10, 50).offset(), 10);
        assert_eq!(Pagination::new(3, 25, 50).offset(), 50);
    }

    #[test]
    fn defaults_apply() {
        let p = Pagination::from_params(&params(None, None), 10, 50).unwrap();
        assert_eq!(p, Pagination { page: 1, limit: 10 });
    }

    #[test]
    fn limit_is_capped_after_validation() {
        let p = Pagination::from_params(&params(Some(2), Some(80)), 10, 50).unwrap();
        assert_eq!(p.limit, 50);
        assert_eq!(p.page, 2);
    }

    #[test]
    fn rejects_out_of_range() {
        let errors = Pagination::from_params(&params(Some(0), Some(101)), 10, 50).unwrap_err();
        let fields = errors.by_field();
        assert!(fields.contains_key("page"));
        assert!(fields.contains_key("limit"));
    }

    #[test]
    fn window_total_needs_a_recount_only_past_the_first_page() {
        let first = Pagination::new(1, 10, 50);
        assert_eq!(first.window_total(Some(3)), Some(3));
        assert_eq!(first.window_total(None), Some(0));

        let beyond = Pagination::new(99, 10, 50);
        assert_eq!(beyond.window_total(Some(1000)), Some(1000));
        assert_eq!(beyond.window_total(None), None);
    }

    #[test]
    fn total_pages() {
        let page = Pagination::new(1, 10, 50);
        assert_eq!(PaginationMeta::new(page, 0).total_pages, 0);
        assert_eq!(PaginationMeta::new(page, 25).total_pages, 3);
        assert_eq!(PaginationMeta::new(page, 100).total_pages, 10);
    }
}
