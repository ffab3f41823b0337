//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use serde::Serialize;

// == Cache Entry ==
/// Represents a single cache entry with value and expiration metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry<V> {
    /// Derived lookup key
    pub key: String,
    /// The stored value
    pub value: V,
    /// Time to live in milliseconds, None = never expires
    pub ttl: Option<u64>,
    /// Expiration timestamp in milliseconds, None = never expires
    pub expires_at: Option<u64>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry inserted at `now`.
    ///
    /// # Arguments
    /// * `key` - The derived lookup key
    /// * `value` - The value to store
    /// * `ttl` - Optional TTL in milliseconds
    /// * `now` - Insertion time in milliseconds
    pub fn new(key: String, value: V, ttl: Option<u64>, now: u64) -> Self {
        Self {
            key,
            value,
            ttl,
            expires_at: ttl.map(|ttl| now.saturating_add(ttl)),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// Boundary condition: an entry is expired once `now` reaches its
    /// expiration time, so a TTL of `t` makes it unreachable from
    /// `insertion + t` onwards.
    pub fn is_expired(&self, now: u64) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    // == Refresh ==
    /// Pushes the deadline to `now + ttl`.
    pub fn refresh(&mut self, now: u64) {
        self.expires_at = self.ttl.map(|ttl| now.saturating_add(ttl));
    }
}
