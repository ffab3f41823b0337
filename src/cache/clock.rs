//! Cache Clock Module
//!
//! The cache engine. Composes the entry store, key codec, statistics and the
//! expiration scheduler into the public cache operations.
//!
//! All state sits behind one mutex shared by every public operation and the
//! sweep callback. The sweep only holds a weak reference, so dropping the last
//! handle tears the engine down and cancels its pending timer.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::cache::{
    CacheEntry, CacheStats, EntryStore, KeyCodec, KeyHasher, RECOMMENDED_MIN_INTERVAL_MS,
};
use crate::config::{ClockConfig, ClockOptions, SetOptions};
use crate::error::Result;
use crate::tasks::{ExpirationScheduler, Scheduler, TimerTask, TokioScheduler};
use crate::time::{SystemClock, TimeSource};

struct Shared<V> {
    state: Mutex<ClockState<V>>,
    time: Arc<dyn TimeSource>,
    scheduler: Arc<dyn Scheduler>,
    codec: KeyCodec,
    birth: u64,
}

struct ClockState<V> {
    store: EntryStore<V>,
    stats: CacheStats,
    config: ClockConfig<V>,
    timer: ExpirationScheduler,
}

impl<V: Clone> ClockState<V> {
    /// Looks up a derived key, applying lazy expiration.
    ///
    /// Every lookup counts as a hit; a lookup that finds nothing also counts
    /// as a miss. `touch` allows the reset-on-access refresh.
    fn lookup(&mut self, key: &str, now: u64, touch: bool) -> Option<CacheEntry<V>> {
        self.stats.record_hit();

        let expired = match self.store.lookup(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            diagnostic!(self.config.debug, debug, key, "Cache item has expired");
            self.store.remove(key);
            self.stats.record_expired();
            return None;
        }

        let reset = touch && self.config.reset_timeout_on_access;
        let entry = self.store.lookup_mut(key)?;
        if reset {
            entry.refresh(now);
        }
        Some(entry.clone())
    }
}

impl<V> Drop for Shared<V> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.timer.stop(self.scheduler.as_ref(), false);
    }
}

// == Cache Clock ==
/// A bounded, time-aware key/value cache.
///
/// Cloning yields another handle to the same cache.
///
/// # Example
/// ```ignore
/// let cache = CacheClock::new(ClockOptions::new().ttl(5.0 * 60.0 * 1000.0))?;
/// cache.set("foo", "bar".to_string());
/// assert_eq!(cache.get("foo").map(|e| e.value), Some("bar".to_string()));
/// ```
pub struct CacheClock<V> {
    shared: Arc<Shared<V>>,
}

impl<V> Clone for CacheClock<V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<V: Clone + Send + 'static> CacheClock<V> {
    // == Constructors ==
    /// Creates a cache driven by the current Tokio runtime.
    ///
    /// # Errors
    /// Returns [`CacheError::NoRuntime`](crate::CacheError::NoRuntime) when
    /// called outside a Tokio runtime. Use [`CacheClock::builder`] with an
    /// explicit scheduler to run without one.
    pub fn new(options: ClockOptions<V>) -> Result<Self> {
        Self::builder().options(options).build()
    }

    pub fn builder() -> CacheClockBuilder<V> {
        CacheClockBuilder::default()
    }

    // == Accessors ==
    /// Milliseconds since the cache was created.
    pub fn age(&self) -> u64 {
        self.shared.time.now().saturating_sub(self.shared.birth)
    }

    /// Number of stored entries, including expired ones not yet reclaimed.
    pub fn size(&self) -> usize {
        self.shared.state.lock().store.len()
    }

    /// The current effective configuration.
    pub fn options(&self) -> ClockConfig<V> {
        self.shared.state.lock().config.clone()
    }

    pub fn stats(&self) -> CacheStats {
        self.shared.state.lock().stats
    }

    /// Whether the sweep timer is armed.
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().timer.is_running()
    }

    // == Configure ==
    /// Merges `options` over the current configuration.
    ///
    /// Entries already stored keep their TTL and deadline. A running sweep
    /// picks up a new interval on its next cycle.
    pub fn configure(&self, options: ClockOptions<V>) {
        let mut state = self.shared.state.lock();
        state.config = state.config.merge(&options);
        advise_interval(&state.config);
    }

    // == Start / Stop ==
    /// Starts the sweep with the full configured interval.
    ///
    /// Does nothing if the sweep is already running or the interval is 0 or
    /// infinite.
    pub fn start(&self) {
        let mut guard = self.shared.state.lock();
        start_locked(&self.shared, &mut guard);
    }

    /// Stops the sweep. Entries are still expired lazily on access.
    pub fn stop(&self) {
        let mut guard = self.shared.state.lock();
        stop_locked(&self.shared, &mut guard);
    }

    // == Keys ==
    /// Derives the lookup key for any serializable input, for use with the
    /// `*_hashed` operations.
    pub fn cache_key<T: Serialize + ?Sized>(&self, input: &T) -> Result<String> {
        self.shared.codec.derive_value(input)
    }

    // == Set ==
    /// Stores `value` under `key` with the configured TTL and duplicate policy.
    pub fn set(&self, key: &str, value: V) -> CacheEntry<V> {
        self.set_with(key, value, SetOptions::default())
    }

    /// Stores `value` under `key`.
    ///
    /// If a live entry already exists and overwriting is off, the existing
    /// entry is returned unchanged. Otherwise the oldest entries are evicted
    /// until there is room and the new entry is returned.
    pub fn set_with(&self, key: &str, value: V, options: SetOptions) -> CacheEntry<V> {
        self.insert(self.shared.codec.resolve(key, false), value, options)
    }

    /// Like [`CacheClock::set_with`] for a key obtained from
    /// [`CacheClock::cache_key`].
    pub fn set_hashed(&self, key: &str, value: V, options: SetOptions) -> CacheEntry<V> {
        self.insert(self.shared.codec.resolve(key, true), value, options)
    }

    fn insert(&self, key: String, value: V, options: SetOptions) -> CacheEntry<V> {
        let mut guard = self.shared.state.lock();
        let now = self.shared.time.now();
        let state = &mut *guard;
        let (ttl, overwrite) = options.resolve(&state.config);
        let debug = state.config.debug;

        if let Some(existing) = state.lookup(&key, now, false) {
            if !overwrite {
                diagnostic!(debug, warn, key = %key, "Unable to set cache item. The item already exists");
                return existing;
            }
            diagnostic!(debug, debug, key = %key, "Overwriting existing cache entry");
            state.store.remove(&key);
            state.stats.record_overwrite();
        }

        if let Some(max_items) = state.config.max_items {
            while state.store.len() >= max_items {
                let Some(oldest) = state.store.oldest_key().map(str::to_owned) else {
                    break;
                };
                diagnostic!(debug, debug, key = %oldest, "The cache is full, removing oldest item");
                state.store.remove(&oldest);
                state.stats.record_eviction();
            }
        }

        let entry = CacheEntry::new(key, value, ttl, now);
        state.store.insert(entry.clone());
        state.stats.record_set();
        entry
    }

    // == Get ==
    /// Returns the live entry for `key`, or `None` if absent or expired.
    pub fn get(&self, key: &str) -> Option<CacheEntry<V>> {
        self.lookup_key(key, false)
    }

    /// Like [`CacheClock::get`] for an already derived key.
    pub fn get_hashed(&self, key: &str) -> Option<CacheEntry<V>> {
        self.lookup_key(key, true)
    }

    fn lookup_key(&self, key: &str, is_hashed: bool) -> Option<CacheEntry<V>> {
        let key = self.shared.codec.resolve(key, is_hashed);
        let mut state = self.shared.state.lock();
        let now = self.shared.time.now();
        state.lookup(&key, now, true)
    }

    // == Delete ==
    /// Removes and returns the entry for `key`.
    pub fn del(&self, key: &str) -> Option<CacheEntry<V>> {
        self.remove_key(key, false)
    }

    pub fn del_hashed(&self, key: &str) -> Option<CacheEntry<V>> {
        self.remove_key(key, true)
    }

    fn remove_key(&self, key: &str, is_hashed: bool) -> Option<CacheEntry<V>> {
        let key = self.shared.codec.resolve(key, is_hashed);
        let mut state = self.shared.state.lock();
        let entry = state.store.remove(&key)?;
        state.stats.record_delete();
        diagnostic!(state.config.debug, debug, key = %key, "Deleted cache item");
        Some(entry)
    }

    // == Has ==
    /// Whether a live entry exists for `key`. Counts as a lookup.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn has_hashed(&self, key: &str) -> bool {
        self.get_hashed(key).is_some()
    }

    // == Clear ==
    /// Removes every entry.
    pub fn clear(&self) {
        let mut state = self.shared.state.lock();
        state.store.clear();
        state.stats.record_clear();
    }

    /// Zeroes all statistics. Stored entries are untouched.
    pub fn reset_stats(&self) {
        self.shared.state.lock().stats.reset();
    }

    // == Export ==
    /// Copies every entry in insertion order.
    pub fn to_vec(&self) -> Vec<CacheEntry<V>> {
        self.shared.state.lock().store.snapshot()
    }

    /// Iterates over the entries stored at call time, oldest first.
    pub fn iter(&self) -> std::vec::IntoIter<CacheEntry<V>> {
        self.to_vec().into_iter()
    }

    /// Visits the live store in insertion order without copying it.
    ///
    /// The cache is locked for the duration; `f` must not call back into it.
    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(&CacheEntry<V>),
    {
        self.shared.state.lock().store.iter().for_each(f);
    }
}

impl<V: Clone + Send + Serialize + 'static> CacheClock<V> {
    /// Exports the entries as a JSON array in insertion order.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_vec())?)
    }
}

impl<'a, V: Clone + Send + 'static> IntoIterator for &'a CacheClock<V> {
    type Item = CacheEntry<V>;
    type IntoIter = std::vec::IntoIter<CacheEntry<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<V> fmt::Debug for CacheClock<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("CacheClock")
            .field("size", &state.store.len())
            .field("running", &state.timer.is_running())
            .field("config", &state.config)
            .field("stats", &state.stats)
            .finish()
    }
}

// == Sweep ==
fn start_locked<V: Clone + Send + 'static>(shared: &Arc<Shared<V>>, state: &mut ClockState<V>) {
    let weak = Arc::downgrade(shared);
    state.timer.start(
        state.config.sweep_interval(),
        shared.scheduler.as_ref(),
        state.config.debug,
        move |generation| -> TimerTask {
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    prune(&shared, generation);
                }
            })
        },
    );
}

fn stop_locked<V>(shared: &Shared<V>, state: &mut ClockState<V>) {
    if state.timer.stop(shared.scheduler.as_ref(), state.config.debug) {
        state.stats.record_lifecycle();
    }
}

/// Reclaims every entry whose deadline has passed, then re-arms the timer.
///
/// `on_expire` runs after the lock is released so it may use the cache,
/// including stopping the freshly re-armed sweep.
fn prune<V: Clone + Send + 'static>(shared: &Arc<Shared<V>>, generation: u64) {
    let (reclaimed, on_expire) = {
        let mut guard = shared.state.lock();
        let state = &mut *guard;
        if !state.timer.is_current(generation) {
            return;
        }

        stop_locked(shared, state);

        let now = shared.time.now();
        let mut reclaimed = Vec::new();
        for key in state.store.expired_keys(now) {
            if let Some(entry) = state.store.remove(&key) {
                state.stats.record_expired();
                reclaimed.push(entry);
            }
        }

        diagnostic!(
            state.config.debug,
            debug,
            reclaimed = reclaimed.len(),
            remaining = state.store.len(),
            "Expiration sweep finished"
        );

        start_locked(shared, state);
        (reclaimed, state.config.on_expire.clone())
    };

    if let Some(on_expire) = on_expire {
        for entry in &reclaimed {
            on_expire(entry);
        }
    }
}

fn advise_interval<V>(config: &ClockConfig<V>) {
    if let Some(ms) = config.interval {
        if ms > 0 && ms < RECOMMENDED_MIN_INTERVAL_MS {
            diagnostic!(
                config.debug,
                warn,
                interval_ms = ms,
                "A cache clock interval less than 15 seconds is not recommended"
            );
        }
    }
}

// == Builder ==
/// Builds a [`CacheClock`] with injected collaborators.
///
/// Defaults: [`SystemClock`], [`TokioScheduler::current`] and the built-in
/// string hasher.
pub struct CacheClockBuilder<V> {
    options: ClockOptions<V>,
    time: Option<Arc<dyn TimeSource>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    hasher: Option<Arc<dyn KeyHasher>>,
}

impl<V> Default for CacheClockBuilder<V> {
    fn default() -> Self {
        Self {
            options: ClockOptions::default(),
            time: None,
            scheduler: None,
            hasher: None,
        }
    }
}

impl<V: Clone + Send + 'static> CacheClockBuilder<V> {
    pub fn options(mut self, options: ClockOptions<V>) -> Self {
        self.options = options;
        self
    }

    pub fn time_source<T: TimeSource + 'static>(mut self, time: T) -> Self {
        self.time = Some(Arc::new(time));
        self
    }

    pub fn scheduler<S: Scheduler + 'static>(mut self, scheduler: S) -> Self {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }

    pub fn hasher<H: KeyHasher + 'static>(mut self, hasher: H) -> Self {
        self.hasher = Some(Arc::new(hasher));
        self
    }

    /// Builds the cache and starts the sweep if `auto_start` is set.
    ///
    /// # Errors
    /// Returns [`CacheError::NoRuntime`](crate::CacheError::NoRuntime) if no
    /// scheduler was given and no Tokio runtime is available.
    pub fn build(self) -> Result<CacheClock<V>> {
        let scheduler: Arc<dyn Scheduler> = match self.scheduler {
            Some(scheduler) => scheduler,
            None => Arc::new(TokioScheduler::current()?),
        };
        let time: Arc<dyn TimeSource> = match self.time {
            Some(time) => time,
            None => Arc::new(SystemClock::new()),
        };
        let codec = self.hasher.map(KeyCodec::new).unwrap_or_default();

        let config = ClockConfig::default().merge(&self.options);
        advise_interval(&config);
        let auto_start = config.auto_start;

        let birth = time.now();
        let cache = CacheClock {
            shared: Arc::new(Shared {
                state: Mutex::new(ClockState {
                    store: EntryStore::new(),
                    stats: CacheStats::new(),
                    config,
                    timer: ExpirationScheduler::new(),
                }),
                time,
                scheduler,
                codec,
                birth,
            }),
        };

        if auto_start {
            cache.start();
        }
        Ok(cache)
    }
}
