//! Ceiling stage of admission control.
//!
//! Requests are counted per client key in fixed windows. Windows are aligned
//! to the limiter's creation instant and shared by every key, so all buckets
//! roll over together. A client may therefore burst up to twice the ceiling
//! across a window boundary.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::error::ApiError;

/// Result of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    /// Requests from this key in the current window, including this one.
    pub count: u32,
    /// Time until the current window rolls over.
    pub resets_in: Duration,
}

#[derive(Debug)]
struct Bucket {
    window: u64,
    count: u32,
}

/// Per-key request counter over fixed, monotonic-clock windows.
#[derive(Debug)]
pub struct FixedWindowCounter {
    window: Duration,
    epoch: Instant,
    buckets: DashMap<String, Bucket>,
    swept_window: AtomicU64,
}

impl FixedWindowCounter {
    pub fn new(window: Duration) -> Self {
        Self {
            window: window.max(Duration::from_millis(1)),
            epoch: Instant::now(),
            buckets: DashMap::new(),
            swept_window: AtomicU64::new(0),
        }
    }

    /// Count one request for `key`.
    pub fn hit(&self, key: &str) -> WindowHit {
        let (window, resets_in) = self.current_window();
        self.sweep_before(window);

        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert(Bucket { window, count: 0 });
        if bucket.window != window {
            bucket.window = window;
            bucket.count = 0;
        }
        bucket.count = bucket.count.saturating_add(1);

        WindowHit {
            count: bucket.count,
            resets_in,
        }
    }

    /// Number of tracked keys.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }

    fn current_window(&self) -> (u64, Duration) {
        let elapsed = self.epoch.elapsed().as_nanos();
        let length = self.window.as_nanos();
        let index = elapsed / length;
        let next_start = length * (index + 1);
        let resets_in = Duration::from_nanos((next_start - elapsed) as u64);
        (index as u64, resets_in)
    }

    /// Drop buckets from elapsed windows, once per window.
    fn sweep_before(&self, window: u64) {
        let last = self.swept_window.load(Ordering::Relaxed);
        if last < window
            && self
                .swept_window
                .compare_exchange(last, window, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
        {
            self.buckets.retain(|_, bucket| bucket.window >= window);
        }
    }
}

/// Hard ceiling per key per window.
#[derive(Debug)]
pub struct RateLimiter {
    counter: FixedWindowCounter,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            counter: FixedWindowCounter::new(window),
            max_requests,
        }
    }

    /// Count the request and reject it once the ceiling is exceeded.
    pub fn check(&self, key: &str) -> Result<WindowHit, ApiError> {
        let hit = self.counter.hit(key);
        if hit.count > self.max_requests {
            Err(ApiError::RateLimited {
                retry_after_secs: ceil_secs(hit.resets_in),
            })
        } else {
            Ok(hit)
        }
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
