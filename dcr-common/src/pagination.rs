//! Pagination over the active cluster list
//!
//! Pages are zero-based. Unlike a clamped cursor, a page past the end is
//! legal and simply yields an empty slice.

/// Page size used when none is configured
pub const DEFAULT_PAGE_SIZE: usize = 30;

/// Slice bounds for one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Requested page number (0-indexed)
    pub page: usize,
    /// Total number of pages
    pub total_pages: usize,
    /// First item index on the page (inclusive)
    pub start: usize,
    /// Last item index on the page (exclusive)
    pub end: usize,
}

/// Number of pages needed for `total_items` (ceiling division)
pub fn total_pages(total_items: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    (total_items + page_size - 1) / page_size
}

/// Calculate slice bounds for `requested_page`
///
/// Both bounds are clamped to `total_items`.
///
/// # Examples
/// ```
/// use dcr_common::pagination::calculate_pagination;
///
/// // 75 clusters at 30 per page = 3 pages (30 + 30 + 15)
/// let p = calculate_pagination(75, 2, 30);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!((p.start, p.end), (60, 75));
///
/// // Past the end: empty slice
/// let p = calculate_pagination(75, 9, 30);
/// assert_eq!(p.start, p.end);
/// ```
pub fn calculate_pagination(total_items: usize, requested_page: usize, page_size: usize) -> Pagination {
    let page_size = page_size.max(1);
    let start = requested_page.saturating_mul(page_size).min(total_items);
    let end = start.saturating_add(page_size).min(total_items);

    Pagination {
        page: requested_page,
        total_pages: total_pages(total_items, page_size),
        start,
        end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_first_page() {
        let p = calculate_pagination(75, 0, 30);
        assert_eq!(p.total_pages, 3);
        assert_eq!((p.start, p.end), (0, 30));
    }

    #[test]
    fn test_pagination_last_page_partial() {
        let p = calculate_pagination(75, 2, 30);
        assert_eq!((p.start, p.end), (60, 75));
    }

    #[test]
    fn test_pagination_out_of_bounds_high() {
        let p = calculate_pagination(75, 99, 30);
        assert_eq!(p.page, 99);
        assert_eq!((p.start, p.end), (75, 75));
    }

    #[test]
    fn test_pagination_empty() {
        let p = calculate_pagination(0, 0, 30);
        assert_eq!(p.total_pages, 0);
        assert_eq!((p.start, p.end), (0, 0));
    }

    #[test]
    fn test_pagination_exact_page_boundary() {
        let p = calculate_pagination(60, 1, 30);
        assert_eq!(p.total_pages, 2);
        assert_eq!((p.start, p.end), (30, 60));
    }

    #[test]
    fn test_zero_page_size_treated_as_one() {
        assert_eq!(total_pages(3, 0), 3);
        let p = calculate_pagination(3, 1, 0);
        assert_eq!((p.start, p.end), (1, 2));
    }
}
