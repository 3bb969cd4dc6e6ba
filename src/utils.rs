use serde::Deserialize;

/// Ceiling on the page number; anything past this is a garbage request,
/// and clamping keeps skip arithmetic away from u64 overflow.
const MAX_PAGE: u64 = 100_000;

/// Query-string pagination shared by listing endpoints.
#[derive(Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

impl Pagination {
    /// Builds normalized pagination from raw optional query params.
    pub fn from_parts(page: Option<u64>, limit: Option<u64>, default_limit: u64) -> Self {
        Self {
            page: page.unwrap_or(1),
            limit: limit.unwrap_or(default_limit),
        }
        .normalized()
    }

    pub fn normalized(self) -> Self {
        Self {
            page: self.page.clamp(1, MAX_PAGE),
            limit: self.limit.clamp(1, 100),
        }
    }

    pub fn skip(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    /// Cuts the current page out of an in-memory, already ranked list.
    pub fn window<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.skip() as usize)
            .take(self.limit as usize)
            .collect()
    }

    pub fn pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::Pagination;

    #[test]
    fn test_defaults() {
        let p = Pagination::default();
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, 20);
        assert_eq!(p.skip(), 0);
    }

    #[test]
    fn test_from_parts() {
        let p = Pagination::from_parts(None, None, 10);
        assert_eq!((p.page, p.limit), (1, 10));

        let p = Pagination::from_parts(Some(4), Some(25), 10);
        assert_eq!((p.page, p.limit), (4, 25));
        assert_eq!(p.skip(), 75);
    }

    #[test]
    fn test_normalized_bounds() {
        let p = Pagination { page: 0, limit: 0 }.normalized();
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, 1);

        let p = Pagination {
            page: 3,
            limit: 5000,
        }
        .normalized();
        assert_eq!(p.limit, 100);
    }

    #[test]
    fn test_huge_page_does_not_overflow() {
        let p = Pagination::from_parts(Some(u64::MAX), Some(100), 20);
        assert_eq!(p.page, super::MAX_PAGE);
        assert_eq!(p.skip(), (super::MAX_PAGE - 1) * 100);

        // Even unnormalized, skip saturates instead of wrapping.
        let p = Pagination {
            page: u64::MAX,
            limit: u64::MAX,
        };
        assert_eq!(p.skip(), u64::MAX);
    }

    #[test]
    fn test_window() {
        let p = Pagination { page: 2, limit: 3 };
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(p.window(items), vec![3, 4, 5]);
    }

    #[test]
    fn test_window_past_end() {
        let p = Pagination { page: 5, limit: 4 };
        let items: Vec<u32> = (0..10).collect();
        assert!(p.window(items).is_empty());
    }

    #[test]
    fn test_pages() {
        let p = Pagination { page: 1, limit: 20 };
        assert_eq!(p.pages(0), 0);
        assert_eq!(p.pages(20), 1);
        assert_eq!(p.pages(21), 2);
    }
}
