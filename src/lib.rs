//! Cache Clock - An in-memory, time-aware key/value cache
//!
//! Every entry carries its own expiration deadline. Expired entries are
//! dropped lazily on access and periodically by a background sweep, and the
//! oldest entry is evicted when the capacity bound is reached.

/// Emits a `tracing` event only when the engine's debug flag is set.
macro_rules! diagnostic {
    ($enabled:expr, $level:ident, $($arg:tt)+) => {
        if $enabled {
            tracing::$level!($($arg)+);
        }
    };
}

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;
pub mod time;

pub use cache::{CacheClock, CacheClockBuilder, CacheEntry, CacheStats};
pub use config::{ClockConfig, ClockOptions, SetOptions};
pub use error::{CacheError, Result};
pub use tasks::{ManualScheduler, Scheduler, TokioScheduler};
pub use time::{ManualClock, SystemClock, TimeSource};
