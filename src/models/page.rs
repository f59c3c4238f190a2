//! Page-based pagination shared by list endpoints

use serde::Serialize;
use utoipa::ToSchema;

use super::{book::BookSummary, user::UserResponse};
use crate::error::{AppError, AppResult};

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

/// Validated page/limit pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> AppResult<Self> {
        let page = page.unwrap_or(DEFAULT_PAGE);
        let limit = limit.unwrap_or(DEFAULT_LIMIT);

        if page < 1 || limit < 1 {
            return Err(AppError::BadRequest(
                "Page and limit must be greater than 0".to_string(),
            ));
        }
        if limit > MAX_LIMIT {
            return Err(AppError::BadRequest(format!(
                "Limit must not exceed {}",
                MAX_LIMIT
            )));
        }
        // offset() and the `next` flag multiply page by limit
        if page.checked_mul(limit).is_none() {
            return Err(AppError::BadRequest("Page is out of range".to_string()));
        }

        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// Paginated response wrapper
#[derive(Debug, Serialize, ToSchema)]
#[aliases(BookPage = PaginatedResponse<BookSummary>, UserPage = PaginatedResponse<UserResponse>)]
pub struct PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// Total number of matching records
    pub count: i64,
    /// Current page number
    pub page: i64,
    /// True if there are more records
    pub next: bool,
    /// True if this is not the first page
    pub prev: bool,
    pub results: Vec<T>,
}

impl<T> PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub fn new(results: Vec<T>, count: i64, request: PageRequest) -> Self {
        Self {
            count,
            page: request.page,
            next: request.page * request.limit < count,
            prev: request.page > 1,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_defaults_and_bounds() {
        assert_eq!(
            PageRequest::new(None, None).unwrap(),
            PageRequest { page: 1, limit: 10 }
        );
        assert_eq!(PageRequest::new(Some(3), Some(5)).unwrap().offset(), 10);
        assert!(matches!(
            PageRequest::new(Some(0), None),
            Err(AppError::BadRequest(_))
        ));
        assert!(PageRequest::new(None, Some(0)).is_err());
    }

    #[test]
    fn test_page_request_rejects_overflowing_values() {
        assert!(matches!(
            PageRequest::new(Some(i64::MAX / 2), Some(10)),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            PageRequest::new(Some(1), Some(101)),
            Err(AppError::BadRequest(_))
        ));

        let far = PageRequest::new(Some(i64::MAX / 100), Some(100)).unwrap();
        assert_eq!(far.offset(), (i64::MAX / 100 - 1) * 100);
        let response = PaginatedResponse::<BookSummary>::new(Vec::new(), 5, far);
        assert!(!response.next);
        assert!(response.prev);
    }

    #[test]
    fn test_next_and_prev_flags() {
        let first = PaginatedResponse::<BookSummary>::new(Vec::new(), 25, PageRequest::new(Some(1), Some(10)).unwrap());
        assert!(first.next);
        assert!(!first.prev);

        let last = PaginatedResponse::<BookSummary>::new(Vec::new(), 25, PageRequest::new(Some(3), Some(10)).unwrap());
        assert!(!last.next);
        assert!(last.prev);
    }
}
