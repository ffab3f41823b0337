//! Time Source Module
//!
//! Supplies monotonic "now" timestamps in milliseconds. The cache never reads
//! the wall clock directly so tests can simulate elapsed time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::time::Instant;

// == Time Source ==
/// A monotonically non-decreasing millisecond clock.
pub trait TimeSource: Send + Sync {
    /// Returns the current time in milliseconds.
    fn now(&self) -> u64;
}

// == System Clock ==
/// Monotonic clock measured from its own creation.
///
/// Backed by `tokio::time::Instant`, so a paused Tokio runtime freezes it
/// together with the timers that drive the sweep.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemClock {
    fn now(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

// == Manual Clock ==
/// A shared, hand-driven clock for simulations.
///
/// Clones observe the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock reading `start` milliseconds.
    pub fn new(start: u64) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Moves the clock forward by `millis`.
    pub fn advance(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    /// Moves the clock to `millis`. Earlier instants are ignored so the clock
    /// never runs backwards.
    pub fn set(&self, millis: u64) {
        self.millis.fetch_max(millis, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}
