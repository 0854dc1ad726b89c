//! Pagination utilities
//!
//! Page math shared by every filtered list. Truncation is never silent:
//! [`Pagination::disclosure`] renders the "showing N of M" line that list
//! views must display.

use serde::Serialize;

/// Default page size for dashboard lists
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: usize,
    /// Rows per page
    pub page_size: usize,
    /// Total number of pages
    pub total_pages: usize,
    /// Total number of matching rows
    pub total: usize,
    /// Index of the first row on this page
    pub offset: usize,
}

impl Pagination {
    /// Number of rows that land on this page
    pub fn len(&self) -> usize {
        self.total.saturating_sub(self.offset).min(self.page_size)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when rows exist outside this page
    pub fn is_truncated(&self) -> bool {
        self.len() < self.total
    }

    /// Human-readable disclosure of which rows are shown
    ///
    /// ```
    /// use fops_common::pagination::calculate_pagination;
    ///
    /// assert_eq!(calculate_pagination(73, 1, 50).disclosure(), "showing first 50 of 73");
    /// assert_eq!(calculate_pagination(73, 2, 50).disclosure(), "showing 51-73 of 73");
    /// assert_eq!(calculate_pagination(12, 1, 50).disclosure(), "showing all 12");
    /// ```
    pub fn disclosure(&self) -> String {
        if !self.is_truncated() {
            return format!("showing all {}", self.total);
        }
        if self.page == 1 {
            return format!("showing first {} of {}", self.len(), self.total);
        }
        format!(
            "showing {}-{} of {}",
            self.offset + 1,
            self.offset + self.len(),
            self.total
        )
    }
}

/// Calculate pagination metadata from total results and requested page
///
/// Clamps the page into `[1, total_pages]`; a zero page size is treated as 1.
///
/// # Examples
/// ```
/// use fops_common::pagination::calculate_pagination;
///
/// // 250 total results at 100 per page = 3 pages (100 + 100 + 50)
/// let p = calculate_pagination(250, 2, 100);
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 100);
///
/// // Requesting out-of-bounds page gets clamped
/// let p = calculate_pagination(250, 99, 100);
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 200);
/// ```
pub fn calculate_pagination(total: usize, requested_page: usize, page_size: usize) -> Pagination {
    let page_size = page_size.max(1);
    let total_pages = total.div_ceil(page_size);
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * page_size;

    Pagination {
        page,
        page_size,
        total_pages,
        total,
        offset,
    }
}
