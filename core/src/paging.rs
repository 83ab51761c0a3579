//! Page planning for batched catalog fetches.
//!
//! Filter expressions with large dependent joins can push request URLs past
//! server limits, so large fetches are split into sequential pages.

/// Largest page requested in one call.
pub const BATCH_SIZE: usize = 50;

/// One page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Offset of the first record.
    pub offset: usize,
    /// Number of records requested.
    pub limit: usize,
}

/// Sequence of pages covering a fetch of `limit` records (unbounded if `None`).
///
/// The plan only yields the next page after the caller reports how many
/// records the previous one returned, so fetching stops as soon as the source
/// runs dry.
#[derive(Debug, Clone)]
pub struct PagePlan {
    remaining: Option<usize>,
    batch_size: usize,
    offset: usize,
    exhausted: bool,
}

impl PagePlan {
    /// Plan a fetch of at most `limit` records in pages of [`BATCH_SIZE`].
    #[must_use]
    pub const fn new(limit: Option<usize>) -> Self {
        Self::with_batch_size(limit, BATCH_SIZE)
    }

    /// Plan with a custom page size (clamped to at least one).
    #[must_use]
    pub const fn with_batch_size(limit: Option<usize>, batch_size: usize) -> Self {
        let batch_size = if batch_size == 0 { 1 } else { batch_size };
        Self {
            remaining: limit,
            batch_size,
            offset: 0,
            exhausted: matches!(limit, Some(0)),
        }
    }

    /// Next page to request, or `None` when the fetch is complete.
    #[must_use]
    pub fn next_page(&self) -> Option<Page> {
        if self.exhausted {
            return None;
        }
        let limit = self
            .remaining
            .map_or(self.batch_size, |remaining| remaining.min(self.batch_size));
        Some(Page {
            offset: self.offset,
            limit,
        })
    }

    /// Record how many records the current page returned.
    pub fn record(&mut self, page: Page, received: usize) {
        self.offset = page.offset + page.limit;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(page.limit);
            if *remaining == 0 {
                self.exhausted = true;
            }
        }
        if received == 0 {
            self.exhausted = true;
        }
        // Unbounded fetches cannot rely on a remaining count; a short page is the end.
        if self.remaining.is_none() && received < page.limit {
            self.exhausted = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn offsets(limit: Option<usize>, available: usize) -> Vec<(usize, usize)> {
        let mut plan = PagePlan::new(limit);
        let mut pages = Vec::new();
        while let Some(page) = plan.next_page() {
            pages.push((page.offset, page.limit));
            let received = available.saturating_sub(page.offset).min(page.limit);
            plan.record(page, received);
        }
        pages
    }

    #[test]
    fn test_limit_120_pages_at_0_50_100() {
        assert_eq!(offsets(Some(120), 1000), vec![(0, 50), (50, 50), (100, 20)]);
    }

    #[test]
    fn test_stops_early_on_empty_page() {
        assert_eq!(offsets(Some(120), 50), vec![(0, 50), (50, 50)]);
    }

    #[test]
    fn test_small_limit_is_single_page() {
        assert_eq!(offsets(Some(10), 1000), vec![(0, 10)]);
    }

    #[test]
    fn test_unbounded_stops_on_short_page() {
        assert_eq!(offsets(None, 120), vec![(0, 50), (50, 50), (100, 50)]);
    }

    #[test]
    fn test_zero_limit_fetches_nothing() {
        assert!(offsets(Some(0), 1000).is_empty());
    }

    proptest! {
        #[test]
        fn prop_pages_never_exceed_batch_or_limit(limit in 1usize..500, available in 0usize..600) {
            let pages = offsets(Some(limit), available);
            let requested: usize = pages.iter().map(|(_, l)| l).sum();
            prop_assert!(requested <= limit);
            prop_assert!(pages.iter().all(|(_, l)| *l <= BATCH_SIZE && *l > 0));
            for window in pages.windows(2) {
                prop_assert_eq!(window[1].0, window[0].0 + window[0].1);
            }
        }
    }
}
