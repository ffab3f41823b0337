//! Entry Store Module
//!
//! Insertion-ordered key -> entry table. Iteration order equals insertion
//! order, which is what "oldest first" eviction relies on.

use indexmap::IndexMap;

use crate::cache::CacheEntry;

// == Entry Store ==
/// Ordered storage for cache entries.
///
/// Inserting an existing key keeps its position; callers that want the key to
/// become the newest must `remove` it first.
#[derive(Debug)]
pub struct EntryStore<V> {
    entries: IndexMap<String, CacheEntry<V>>,
}

impl<V> EntryStore<V> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    // == Insert ==
    /// Stores `entry` under its key, returning the entry it replaced.
    pub fn insert(&mut self, entry: CacheEntry<V>) -> Option<CacheEntry<V>> {
        self.entries.insert(entry.key.clone(), entry)
    }

    // == Remove ==
    /// Removes an entry, preserving the order of the remaining ones.
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        self.entries.shift_remove(key)
    }

    // == Lookup ==
    pub fn lookup(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    pub fn lookup_mut(&mut self, key: &str) -> Option<&mut CacheEntry<V>> {
        self.entries.get_mut(key)
    }

    // == Oldest Key ==
    /// Returns the least recently inserted key.
    pub fn oldest_key(&self) -> Option<&str> {
        self.entries.keys().next().map(String::as_str)
    }

    // == Expired Keys ==
    /// Collects the keys of every entry expired at `now`, in insertion order.
    ///
    /// The list is materialized so callers can delete while walking it.
    pub fn expired_keys(&self, now: u64) -> Vec<String> {
        self.entries
            .values()
            .filter(|entry| entry.is_expired(now))
            .map(|entry| entry.key.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry<V>> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<V: Clone> EntryStore<V> {
    // == Snapshot ==
    /// Copies every entry in insertion order.
    pub fn snapshot(&self) -> Vec<CacheEntry<V>> {
        self.entries.values().cloned().collect()
    }
}

impl<V> Default for EntryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
