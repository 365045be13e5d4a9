use std::time::Duration;

/// A whole-second countdown driving the remaining-time label and progress bar.
///
/// Only whole elapsed seconds count; progress grows by `100 / total` per
/// second and reaches 100 once `total` full seconds have passed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Countdown {
    total: u32,
    ticks: u32,
}

impl Countdown {
    pub fn new(total: u32) -> Self {
        Self { total, ticks: 0 }
    }

    /// Catches up to `elapsed` since the countdown began. Returns true once it has run out.
    pub fn elapse(&mut self, elapsed: Duration) -> bool {
        let whole = u32::try_from(elapsed.as_secs()).unwrap_or(u32::MAX);
        self.ticks = whole.min(self.total).max(self.ticks);
        self.is_finished()
    }

    pub fn is_finished(&self) -> bool {
        self.ticks >= self.total
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn remaining(&self) -> u32 {
        self.total - self.ticks
    }

    /// Progress in percent, 0.0..=100.0
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.ticks as f64 * (100.0 / self.total as f64)).min(100.0)
    }
}
