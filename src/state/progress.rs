//! Progress accounting for a single job execution
//!
//! The crawl owns the first `crawl_share` percent of the range; the rest is
//! handed out in fixed milestones for archiving and upload. 100 is only
//! reached on completion.

use std::sync::atomic::{AtomicU8, Ordering};

/// Maps pipeline stages to progress percentages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressPlan {
    crawl_share: u8,
}

impl ProgressPlan {
    /// `crawl_share` is clamped to 1..=89 so the post-crawl milestones stay below 100
    pub fn new(crawl_share: u8) -> Self {
        Self {
            crawl_share: crawl_share.clamp(1, 89),
        }
    }

    pub fn crawl_share(&self) -> u8 {
        self.crawl_share
    }

    /// Progress reported before page `index` of `total` is fetched:
    /// `floor(index / total * crawl_share)`
    pub fn before_page(&self, index: usize, total: usize) -> u8 {
        if total == 0 {
            return 0;
        }
        let index = index.min(total) as u64;
        ((index * self.crawl_share as u64) / total as u64) as u8
    }

    /// All pages visited, archive about to be built
    pub fn crawl_finished(&self) -> u8 {
        self.crawl_share + 5
    }

    /// Archive built, upload about to start
    pub fn archive_built(&self) -> u8 {
        self.crawl_share + 10
    }

    pub fn completed(&self) -> u8 {
        100
    }
}

impl Default for ProgressPlan {
    fn default() -> Self {
        Self::new(80)
    }
}

/// Keeps reported progress non-decreasing within one execution
#[derive(Debug, Default)]
pub struct ProgressTracker {
    current: AtomicU8,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value` and returns it if it moves progress forward
    ///
    /// Returns `None` for values at or below the current progress, which
    /// callers treat as "nothing to report".
    pub fn advance(&self, value: u8) -> Option<u8> {
        let value = value.min(100);
        let previous = self.current.fetch_max(value, Ordering::SeqCst);
        if value > previous {
            Some(value)
        } else {
            None
        }
    }

    pub fn current(&self) -> u8 {
        self.current.load(Ordering::SeqCst)
    }
}
