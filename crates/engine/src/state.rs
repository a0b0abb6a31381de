use std::collections::HashSet;

use serde::Serialize;

/// Which loading mechanism the loop is currently driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Clicking the page's "load more" control.
    Click,
    /// Scrolling to trigger lazy loading.
    Scroll,
}

impl std::fmt::Display for LoadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Click => "click",
            Self::Scroll => "scroll",
        })
    }
}

/// Per-task progress of the convergence loop.
///
/// `observed_count` is the size of the union of every item URL seen so far,
/// so it never decreases even when the page recycles rendered tiles.
#[derive(Debug, Clone)]
pub struct LoadState {
    pub observed_count: usize,
    pub target_count: Option<usize>,
    pub stall_streak: u32,
    /// Iterations of the loop so far.
    pub attempt: u32,
    pub mode: LoadMode,
    pub click_attempts: u32,
    /// The click phase is over for this task.
    pub control_exhausted: bool,
    pub midpoint_captured: bool,
    seen: HashSet<String>,
}

impl Default for LoadState {
    fn default() -> Self {
        Self {
            observed_count: 0,
            target_count: None,
            stall_streak: 0,
            attempt: 0,
            mode: LoadMode::Click,
            click_attempts: 0,
            control_exhausted: false,
            midpoint_captured: false,
            seen: HashSet::new(),
        }
    }
}

impl LoadState {
    /// Merge one read's URLs into the seen set and return how many were new.
    pub fn absorb<I>(&mut self, urls: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let before = self.seen.len();
        self.seen.extend(urls);
        self.observed_count = self.seen.len();
        self.observed_count - before
    }

    /// Update the stall streak after one iteration.
    pub fn record_pass(&mut self, grew: bool) {
        if grew {
            self.stall_streak = 0;
        } else {
            self.stall_streak += 1;
        }
    }

    /// `observed / target`, when the target is known and non-zero.
    #[must_use]
    pub fn coverage(&self) -> Option<f64> {
        self.target_count
            .filter(|t| *t > 0)
            .map(|t| self.observed_count as f64 / t as f64)
    }

    /// Whether coverage is known and at least `ratio`.
    #[must_use]
    pub fn covers(&self, ratio: f64) -> bool {
        self.coverage().is_some_and(|c| c >= ratio)
    }

    /// Switch to scrolling with a fresh stall streak.
    pub fn enter_scroll_phase(&mut self) {
        self.mode = LoadMode::Scroll;
        self.control_exhausted = true;
        self.stall_streak = 0;
    }
}
