//! Progress throttling.
//!
//! Limits how often byte-count updates for one item reach the progress
//! model. An update passes once enough time has elapsed *or* enough bytes
//! have arrived since the last one that passed.

use std::time::{Duration, Instant};

/// Rate-limiter for the progress updates of a single item.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    last_emit: Option<(Instant, u64)>,
    min_interval: Duration,
    min_bytes: u64,
}

impl ProgressThrottle {
    /// Create a new throttle with the given floors.
    pub const fn new(min_interval: Duration, min_bytes: u64) -> Self {
        Self {
            last_emit: None,
            min_interval,
            min_bytes,
        }
    }

    /// Check whether the update carrying `bytes` at `now` should be
    /// published, recording it if so.
    pub fn should_emit(&mut self, now: Instant, bytes: u64) -> bool {
        match self.last_emit {
            Some((at, seen))
                if now.saturating_duration_since(at) < self.min_interval
                    && bytes.saturating_sub(seen) < self.min_bytes =>
            {
                false
            }
            _ => {
                self.last_emit = Some((now, bytes));
                true
            }
        }
    }

    /// Record an update that was published regardless of the throttle.
    pub fn mark(&mut self, now: Instant, bytes: u64) {
        self.last_emit = Some((now, bytes));
    }

    /// Force the next check to return true.
    pub fn reset(&mut self) {
        self.last_emit = None;
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(Duration::from_millis(50), 64 * 1024)
    }
}
