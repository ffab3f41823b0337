//! Cache Module
//!
//! Provides the in-memory cache engine with per-entry TTL, lazy and periodic
//! expiration, and oldest-first eviction.

mod clock;
mod entry;
mod key;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use clock::{CacheClock, CacheClockBuilder};
pub use entry::CacheEntry;
pub use key::{stringify, KeyCodec, KeyHasher, StringHasher};
pub use stats::CacheStats;
pub use store::EntryStore;

// == Public Constants ==
/// Interval below which a sweep is considered too aggressive.
pub const RECOMMENDED_MIN_INTERVAL_MS: u64 = 15_000;
