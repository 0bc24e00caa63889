//! Pagination query parameters.

use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Pagination query parameters.
///
/// Uses `serde_with` to parse page numbers from query strings as integers.
#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub page: Option<u32>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl PaginationParams {
    /// Returns the 1-indexed `(page, page_size)`.
    ///
    /// Defaults: page 1, page size 20. Page must be > 0 and page size in `[1, 100]`.
    pub fn page_and_size(&self) -> Result<(i64, i64), String> {
        let page = self.page.unwrap_or(1);
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);

        if page == 0 {
            return Err("Page must be greater than 0".to_string());
        }

        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(format!("Page size must be between 1 and {MAX_PAGE_SIZE}"));
        }

        Ok((i64::from(page), i64::from(page_size)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<u32>, page_size: Option<u32>) -> PaginationParams {
        PaginationParams { page, page_size }
    }

    #[test]
    fn test_defaults() {
        assert_eq!(params(None, None).page_and_size().unwrap(), (1, 20));
    }

    #[test]
    fn test_custom_page_and_size() {
        assert_eq!(params(Some(3), Some(50)).page_and_size().unwrap(), (3, 50));
    }

    #[test]
    fn test_page_zero_is_error() {
        assert!(params(Some(0), None).page_and_size().is_err());
    }

    #[test]
    fn test_page_size_bounds() {
        assert!(params(None, Some(0)).page_and_size().is_err());
        assert!(params(None, Some(1)).page_and_size().is_ok());
        assert!(params(None, Some(100)).page_and_size().is_ok());
        assert!(params(None, Some(101)).page_and_size().is_err());
    }

    #[test]
    fn test_parses_from_query_strings() {
        let p: PaginationParams = serde_json::from_str(r#"{"page": "2", "page_size": "10"}"#).unwrap();
        assert_eq!(p.page_and_size().unwrap(), (2, 10));
    }
}
