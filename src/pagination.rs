/// Number of posts shown on one page of the feed.
pub const POSTS_PER_PAGE: u64 = 5;

/// Inclusive, zero-based range of rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowRange {
    pub from: u64,
    pub to: u64,
}

impl RowRange {
    /// Rows on a 1-indexed `page` of `per_page` rows.
    /// Pages past the addressable range clamp to `u64::MAX` and select nothing.
    pub fn for_page(page: u64, per_page: u64) -> Self {
        let from = page.saturating_sub(1).saturating_mul(per_page);
        Self {
            from,
            to: from.saturating_add(per_page.saturating_sub(1)),
        }
    }

    /// Number of rows covered.
    pub fn limit(&self) -> u64 {
        self.to.saturating_sub(self.from).saturating_add(1)
    }
}

/// Pages needed for `total` rows. Never less than one.
pub fn page_count(total: u64, per_page: u64) -> u64 {
    let full = total / per_page;
    std::cmp::max(1, if total % per_page == 0 { full } else { full + 1 })
}

/// Previous / Next navigation for a paginated route.
///
/// Page 1 is served at `base_url` itself; later pages at `{base_url}page-{n}`.
#[derive(Debug)]
pub struct Paginator {
    pub base_url: String,
    pub this_page: u64,
    pub page_count: u64,
}

impl Paginator {
    pub fn has_previous(&self) -> bool {
        self.this_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.this_page < self.page_count
    }

    pub fn previous_url(&self) -> String {
        self.url_for(self.this_page.saturating_sub(1))
    }

    pub fn next_url(&self) -> String {
        self.url_for(self.this_page.saturating_add(1))
    }

    pub fn url_for(&self, page: u64) -> String {
        if page <= 1 {
            self.base_url.to_owned()
        } else {
            format!("{}page-{}", self.base_url, page)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_range() {
        for page in 1..50u64 {
            let range = RowRange::for_page(page, POSTS_PER_PAGE);
            assert_eq!(range.from, (page - 1) * 5);
            assert_eq!(range.to, page * 5 - 1);
            assert_eq!(range.limit(), POSTS_PER_PAGE);
        }
    }

    #[test]
    fn test_row_range_far_past_the_end() {
        let range = RowRange::for_page(u64::MAX, POSTS_PER_PAGE);
        assert_eq!(range.from, u64::MAX);
        assert_eq!(range.to, u64::MAX);
        assert_eq!(range.limit(), 1);

        let range = RowRange::for_page(u64::MAX / 5 + 2, POSTS_PER_PAGE);
        assert_eq!(range.from, u64::MAX);
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 5), 1);
        assert_eq!(page_count(1, 5), 1);
        assert_eq!(page_count(5, 5), 1);
        assert_eq!(page_count(6, 5), 2);
        assert_eq!(page_count(10, 5), 2);
        assert_eq!(page_count(11, 5), 3);
        assert_eq!(page_count(u64::MAX, 1), u64::MAX);
    }

    #[test]
    fn test_paginator_urls() {
        let p = Paginator {
            base_url: "/".to_owned(),
            this_page: 1,
            page_count: 3,
        };
        assert!(!p.has_previous());
        assert!(p.has_next());
        assert_eq!(p.next_url(), "/page-2");

        let p = Paginator {
            base_url: "/".to_owned(),
            this_page: 3,
            page_count: 3,
        };
        assert!(p.has_previous());
        assert!(!p.has_next());
        assert_eq!(p.previous_url(), "/page-2");
        assert_eq!(p.url_for(1), "/");

        let p = Paginator {
            base_url: "/".to_owned(),
            this_page: u64::MAX,
            page_count: 1,
        };
        assert!(!p.has_next());
        assert_eq!(p.next_url(), format!("/page-{}", u64::MAX));
    }
}
