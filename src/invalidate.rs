use std::time::{Duration, Instant};

use crate::overlay::ContentHash;

/// How long a burst of spec mutations must go quiet before a recompose fires.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

/// A recompose request for one source image under one spec state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecomposeJob {
    pub image_id: String,
    pub spec_hash: ContentHash,
}

/// Debounces spec mutations into at most one pending recompose.
///
/// Every mutation replaces the pending job and restarts the quiet window, so
/// a drag or a wheel burst costs a single render of the final state. Time is
/// passed in by the caller, which keeps the scheduler deterministic under
/// test.
#[derive(Debug)]
pub struct RecomposeScheduler {
    window: Duration,
    pending: Option<Pending>,
}

#[derive(Debug)]
struct Pending {
    job: RecomposeJob,
    due: Instant,
}

impl Default for RecomposeScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RecomposeScheduler {
    pub fn new() -> Self {
        Self::with_window(DEBOUNCE_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Records a mutation at `now`. Any previously pending job is replaced
    /// and its timer restarted.
    pub fn note_mutation(&mut self, job: RecomposeJob, now: Instant) {
        self.pending = Some(Pending {
            job,
            due: now + self.window,
        });
    }

    /// Returns the job to run if the quiet window has elapsed, clearing it.
    pub fn poll(&mut self, now: Instant) -> Option<RecomposeJob> {
        if self.pending.as_ref().is_some_and(|p| now >= p.due) {
            self.pending.take().map(|p| p.job)
        } else {
            None
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drops the pending job without running it. Used when the target image
    /// is removed or replaced mid-window.
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}
