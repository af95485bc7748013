//! Delay stage of admission control.
//!
//! Counts requests per key over the same fixed windows as the ceiling stage,
//! but with its own counter. Past `delay_after` requests, each further request
//! in the window waits `(count - delay_after) * step` before it is admitted.
//! The delay grows until the window resets; it never rejects.

use std::time::Duration;

use crate::security::rate_limit::FixedWindowCounter;

#[derive(Debug)]
pub struct SlowDown {
    counter: FixedWindowCounter,
    delay_after: u32,
    step: Duration,
}

impl SlowDown {
    pub fn new(window: Duration, delay_after: u32, step: Duration) -> Self {
        Self {
            counter: FixedWindowCounter::new(window),
            delay_after,
            step,
        }
    }

    /// Count the request and return how long it must wait.
    pub fn delay_for(&self, key: &str) -> Duration {
        let hit = self.counter.hit(key);
        match hit.count.checked_sub(self.delay_after) {
            Some(over) if over > 0 => self.step.saturating_mul(over),
            _ => Duration::ZERO,
        }
    }
}
