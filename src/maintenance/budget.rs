//! Per-request wall-clock allowance for maintenance work.
//!
//! A run gets a fixed slice of time and is asked to stop at the next
//! chunk boundary once it is used up. The check is cheap enough to poll
//! between every chunk; it must never be polled inside one, since a
//! chunk is the atomicity unit.

use std::time::{Duration, Instant};

pub const DEFAULT_BUDGET_MILLIS: u64 = 3000;

#[derive(Debug, Clone)]
pub struct TimeBudget {
    started: Instant,
    threshold: Duration,
}

impl TimeBudget {
    pub fn start(threshold: Duration) -> Self {
        Self {
            started: Instant::now(),
            threshold,
        }
    }

    /// A budget that never trips.
    pub fn unlimited() -> Self {
        Self::start(Duration::MAX)
    }

    /// A budget that is already exhausted.
    pub fn expired() -> Self {
        Self::start(Duration::ZERO)
    }

    pub fn exceeded(&self) -> bool {
        self.started.elapsed() >= self.threshold
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
