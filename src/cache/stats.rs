//! Cache Statistics Module
//!
//! Tracks cache counters for every operation. Counters only ever grow until
//! an explicit [`CacheStats::reset`].

use serde::Serialize;

// == Cache Stats ==
/// Counters updated by cache operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of lookups (counted on every lookup, found or not)
    pub hits: u64,
    /// Number of accepted writes
    pub sets: u64,
    /// Number of lookups that found nothing
    pub misses: u64,
    /// Number of entries removed to respect the capacity bound
    pub evictions: u64,
    /// Number of entries reclaimed after their deadline
    pub expired: u64,
    /// Number of explicit deletions
    pub deletes: u64,
    /// Number of live entries replaced by an overwriting `set`
    pub overwrites: u64,
    /// Number of `clear` calls
    pub clears: u64,
    /// Number of times the sweep clock was stopped
    pub lifecycles: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Fraction of lookups that found a live entry.
    ///
    /// Returns (hits - misses - expired) / hits, or 0.0 if no lookups have
    /// been made.
    pub fn hit_rate(&self) -> f64 {
        if self.hits == 0 {
            return 0.0;
        }
        let found = self
            .hits
            .saturating_sub(self.misses)
            .saturating_sub(self.expired);
        found as f64 / self.hits as f64
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_set(&mut self) {
        self.sets += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expired(&mut self) {
        self.expired += 1;
    }

    pub fn record_delete(&mut self) {
        self.deletes += 1;
    }

    pub fn record_overwrite(&mut self) {
        self.overwrites += 1;
    }

    pub fn record_clear(&mut self) {
        self.clears += 1;
    }

    pub fn record_lifecycle(&mut self) {
        self.lifecycles += 1;
    }

    // == Reset ==
    /// Zeroes every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats, CacheStats::default());
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.lifecycles, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_all_found() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        assert_eq!(stats.hit_rate(), 1.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.5);

        stats.record_hit();
        stats.record_hit();
        stats.record_expired();
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_record_counters() {
        let mut stats = CacheStats::new();
        stats.record_set();
        stats.record_eviction();
        stats.record_eviction();
        stats.record_delete();
        stats.record_overwrite();
        stats.record_clear();
        stats.record_lifecycle();

        assert_eq!(stats.sets, 1);
        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.deletes, 1);
        assert_eq!(stats.overwrites, 1);
        assert_eq!(stats.clears, 1);
        assert_eq!(stats.lifecycles, 1);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_expired();
        stats.record_lifecycle();

        stats.reset();
        assert_eq!(stats, CacheStats::default());
    }

    #[test]
    fn test_stats_serialize() {
        let mut stats = CacheStats::new();
        stats.record_set();

        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["sets"], 1);
        assert_eq!(json["overwrites"], 0);
    }
}
