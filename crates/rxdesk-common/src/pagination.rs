//! Page/offset pagination shared by list endpoints.

use serde::{Deserialize, Serialize};

const DEFAULT_PER_PAGE: i64 = 20;
const MAX_PER_PAGE: i64 = 100;

/// `?page=&per_page=` query parameters. Both are 1-based / clamped.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    pub fn limit(&self) -> i64 {
        self.per_page()
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.per_page()
    }
}

/// A page of results plus the total count.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: &Pagination) -> Self {
        let per_page = pagination.per_page();
        Self {
            items,
            total,
            page: pagination.page(),
            per_page,
            total_pages: (total + per_page - 1) / per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_clamping() {
        let p = Pagination::default();
        assert_eq!((p.page(), p.per_page(), p.offset()), (1, 20, 0));

        let p = Pagination {
            page: Some(0),
            per_page: Some(1000),
        };
        assert_eq!((p.page(), p.per_page()), (1, 100));

        let p = Pagination {
            page: Some(3),
            per_page: Some(25),
        };
        assert_eq!(p.offset(), 50);
    }

    #[test]
    fn test_total_pages() {
        let p = Pagination {
            page: Some(1),
            per_page: Some(10),
        };
        assert_eq!(Page::new(Vec::<u8>::new(), 0, &p).total_pages, 0);
        assert_eq!(Page::new(Vec::<u8>::new(), 10, &p).total_pages, 1);
        assert_eq!(Page::new(Vec::<u8>::new(), 11, &p).total_pages, 2);
    }
}
