//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the engine against a simple model of insertion order,
//! expiry deadlines and statistics.

use proptest::prelude::*;
use std::collections::HashSet;

use crate::cache::{stringify, CacheClock, CacheStats, KeyHasher, StringHasher};
use crate::config::{ClockConfig, ClockOptions, SetOptions};
use crate::tasks::ManualScheduler;
use crate::time::ManualClock;

// == Helpers ==
fn manual_cache(options: ClockOptions<String>) -> (CacheClock<String>, ManualScheduler) {
    let scheduler = ManualScheduler::new(ManualClock::default());
    let cache = CacheClock::builder()
        .options(options)
        .time_source(scheduler.clock().clone())
        .scheduler(scheduler.clone())
        .build()
        .unwrap();
    (cache, scheduler)
}

// == Strategies ==
/// Generates short cache keys so sequences revisit the same keys often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,3}"
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,64}"
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Has { key: String },
    Del { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Has { key }),
        key_strategy().prop_map(|key| CacheOp::Del { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // *For any* sequence of operations without expiry, every counter SHALL
    // match a model in which each lookup is a hit, each lookup of an absent
    // key is also a miss, and duplicate sets are rejected.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let (cache, _) = manual_cache(ClockOptions::new());
        let mut present: HashSet<String> = HashSet::new();
        let mut expected = CacheStats::default();

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    cache.set(&key, value);
                    expected.hits += 1;
                    if present.insert(key) {
                        expected.misses += 1;
                        expected.sets += 1;
                    }
                }
                CacheOp::Get { key } => {
                    let found = cache.get(&key).is_some();
                    prop_assert_eq!(found, present.contains(&key));
                    expected.hits += 1;
                    if !found {
                        expected.misses += 1;
                    }
                }
                CacheOp::Has { key } => {
                    let found = cache.has(&key);
                    prop_assert_eq!(found, present.contains(&key));
                    expected.hits += 1;
                    if !found {
                        expected.misses += 1;
                    }
                }
                CacheOp::Del { key } => {
                    let removed = cache.del(&key).is_some();
                    prop_assert_eq!(removed, present.remove(&key));
                    if removed {
                        expected.deletes += 1;
                    }
                }
            }
        }

        prop_assert_eq!(cache.stats(), expected);
        prop_assert_eq!(cache.size(), present.len());
    }

    // *For any* key and value, storing the pair and reading it back before its
    // deadline SHALL return the stored value.
    #[test]
    fn prop_roundtrip_storage(key in ".{0,32}", value in value_strategy()) {
        let (cache, _) = manual_cache(ClockOptions::new());

        cache.set(&key, value.clone());
        let entry = cache.get(&key);

        prop_assert_eq!(entry.map(|e| e.value), Some(value));
    }

    // *For any* sequence of sets, the cache SHALL hold at most `max_items`
    // entries and SHALL keep exactly the newest ones in insertion order.
    #[test]
    fn prop_capacity_keeps_newest(
        max_items in 1usize..10,
        keys in prop::collection::vec(key_strategy(), 1..80)
    ) {
        let (cache, _) = manual_cache(ClockOptions::new().max_items(max_items as f64));
        let mut model: Vec<String> = Vec::new();
        let mut evictions = 0u64;

        for key in keys {
            cache.set(&key, key.clone());
            prop_assert!(cache.size() <= max_items);

            if !model.contains(&key) {
                if model.len() >= max_items {
                    model.remove(0);
                    evictions += 1;
                }
                model.push(key);
            }
        }

        let stored: Vec<String> = cache.iter().map(|e| e.value).collect();
        prop_assert_eq!(stored, model);
        prop_assert_eq!(cache.stats().evictions, evictions);
    }

    // *For any* TTL and elapsed time, a read SHALL find the entry if and only
    // if the elapsed time is below the TTL.
    #[test]
    fn prop_lazy_expiry_boundary(ttl in 0u64..1_000, elapsed in 0u64..2_000) {
        let (cache, scheduler) = manual_cache(ClockOptions::new().interval(0.0));
        cache.set_with("key", "value".to_string(), SetOptions::new().ttl(ttl as f64));

        scheduler.clock().advance(elapsed);
        let found = cache.get("key").is_some();

        prop_assert_eq!(found, elapsed < ttl);
        prop_assert_eq!(cache.stats().expired, u64::from(!found));
    }

    // *For any* set of TTLs, once every deadline has passed and a full sweep
    // interval has elapsed, the sweep SHALL have reclaimed every entry.
    #[test]
    fn prop_sweep_reclaims_everything(
        ttls in prop::collection::vec(1u64..5_000, 1..30),
        interval in 50u64..1_000
    ) {
        let (cache, scheduler) = manual_cache(ClockOptions::new().interval(interval as f64));
        for (i, ttl) in ttls.iter().enumerate() {
            cache.set_with(&i.to_string(), i.to_string(), SetOptions::new().ttl(*ttl as f64));
        }

        let longest = ttls.iter().copied().max().unwrap_or(0);
        scheduler.advance(longest + interval);

        prop_assert_eq!(cache.size(), 0);
        prop_assert_eq!(cache.stats().expired, ttls.len() as u64);
        prop_assert!(cache.is_running());
    }

    // *For any* populated cache, clearing SHALL empty it and resetting stats
    // SHALL zero every counter without touching the entries.
    #[test]
    fn prop_clear_and_reset_stats(keys in prop::collection::vec(key_strategy(), 1..30)) {
        let (cache, _) = manual_cache(ClockOptions::new());
        for key in &keys {
            cache.set(key, key.clone());
        }
        let size = cache.size();

        cache.reset_stats();
        prop_assert_eq!(cache.stats(), CacheStats::default());
        prop_assert_eq!(cache.size(), size);

        cache.clear();
        prop_assert_eq!(cache.size(), 0);
        prop_assert_eq!(cache.stats().clears, 1);
    }

    // *For any* finite value, `max_items` SHALL coerce to the truncated
    // absolute value, never below one.
    #[test]
    fn prop_max_items_coercion(value in -1.0e9f64..1.0e9) {
        let config = ClockConfig::<String>::default().merge(&ClockOptions::new().max_items(value));
        let expected = (value.abs().trunc() as usize).max(1);

        prop_assert_eq!(config.max_items, Some(expected));
    }

    // *For any* string, its derived key SHALL be the hash of the string itself
    // and SHALL be stable across calls.
    #[test]
    fn prop_string_keys_hash_unchanged(input in ".{0,64}") {
        let (cache, _) = manual_cache(ClockOptions::new());
        let hasher = StringHasher;

        prop_assert_eq!(stringify(&input).unwrap(), input.clone());
        prop_assert_eq!(cache.cache_key(&input).unwrap(), hasher.hash(&input));
        prop_assert_eq!(hasher.hash(&input), hasher.hash(&input));
    }
}
