//! Configuration Module
//!
//! Option patches, the effective configuration they merge into, and loading
//! options from environment variables.
//!
//! Numeric options are taken as `f64` and coerced rather than rejected:
//! - `NaN` stands for a non-numeric value and keeps the previous setting
//! - negative values use their absolute value
//! - `f64::INFINITY` means unbounded (`None` in [`ClockConfig`])
//! - fractions are truncated to whole items or milliseconds
//! - a `max_items` of 0 becomes 1
//! - a positive `interval` below 1 ms becomes 1 ms, so only an exact 0
//!   disables the sweep

use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheEntry;

// == Defaults ==
/// Default maximum number of entries.
pub const DEFAULT_MAX_ITEMS: usize = 1000;

/// Default sweep interval in milliseconds.
pub const DEFAULT_INTERVAL_MS: u64 = 15_000;

/// Callback invoked once per entry reclaimed by the sweep.
pub type ExpireCallback<V> = Arc<dyn Fn(&CacheEntry<V>) + Send + Sync>;

// == Clock Options ==
/// A partial configuration patch. Unset fields keep their current value.
pub struct ClockOptions<V> {
    /// Maximum number of entries; `INFINITY` disables the bound
    pub max_items: Option<f64>,
    /// Default TTL in milliseconds; `INFINITY` means entries never expire
    pub ttl: Option<f64>,
    /// Sweep interval in milliseconds; `0` or `INFINITY` disables the sweep
    pub interval: Option<f64>,
    /// Start the sweep on construction (ignored by `configure`)
    pub auto_start: Option<bool>,
    /// Replace live entries on duplicate `set` calls
    pub overwrite: Option<bool>,
    /// Refresh an entry's deadline whenever it is read
    pub reset_timeout_on_access: Option<bool>,
    /// Called with each entry reclaimed by the sweep; `Some(None)` removes
    /// the current callback
    pub on_expire: Option<Option<ExpireCallback<V>>>,
    /// Emit diagnostics through `tracing`
    pub debug: Option<bool>,
}

impl<V> ClockOptions<V> {
    pub fn new() -> Self {
        Self {
            max_items: None,
            ttl: None,
            interval: None,
            auto_start: None,
            overwrite: None,
            reset_timeout_on_access: None,
            on_expire: None,
            debug: None,
        }
    }

    pub fn max_items(mut self, max_items: f64) -> Self {
        self.max_items = Some(max_items);
        self
    }

    pub fn ttl(mut self, ttl_ms: f64) -> Self {
        self.ttl = Some(ttl_ms);
        self
    }

    pub fn interval(mut self, interval_ms: f64) -> Self {
        self.interval = Some(interval_ms);
        self
    }

    pub fn auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = Some(auto_start);
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = Some(overwrite);
        self
    }

    pub fn reset_timeout_on_access(mut self, reset: bool) -> Self {
        self.reset_timeout_on_access = Some(reset);
        self
    }

    pub fn on_expire<F>(mut self, callback: F) -> Self
    where
        F: Fn(&CacheEntry<V>) + Send + Sync + 'static,
    {
        self.on_expire = Some(Some(Arc::new(callback)));
        self
    }

    /// Removes a previously configured `on_expire` callback.
    pub fn clear_on_expire(mut self) -> Self {
        self.on_expire = Some(None);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Loads options from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CLOCK_MAX_ITEMS` - Maximum entries
    /// - `CACHE_CLOCK_TTL` - Default TTL in milliseconds
    /// - `CACHE_CLOCK_INTERVAL` - Sweep interval in milliseconds
    /// - `CACHE_CLOCK_AUTO_START` - Start the sweep on construction
    /// - `CACHE_CLOCK_OVERWRITE` - Duplicate-key policy
    /// - `CACHE_CLOCK_RESET_ON_ACCESS` - Refresh deadlines on read
    /// - `CACHE_CLOCK_DEBUG` - Diagnostic output
    ///
    /// Unparseable numbers count as non-numeric and fall back to the previous
    /// value; unparseable booleans are ignored.
    pub fn from_env() -> Self {
        Self {
            max_items: env_number("CACHE_CLOCK_MAX_ITEMS"),
            ttl: env_number("CACHE_CLOCK_TTL"),
            interval: env_number("CACHE_CLOCK_INTERVAL"),
            auto_start: env_flag("CACHE_CLOCK_AUTO_START"),
            overwrite: env_flag("CACHE_CLOCK_OVERWRITE"),
            reset_timeout_on_access: env_flag("CACHE_CLOCK_RESET_ON_ACCESS"),
            on_expire: None,
            debug: env_flag("CACHE_CLOCK_DEBUG"),
        }
    }
}

impl<V> Default for ClockOptions<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for ClockOptions<V> {
    fn clone(&self) -> Self {
        Self {
            max_items: self.max_items,
            ttl: self.ttl,
            interval: self.interval,
            auto_start: self.auto_start,
            overwrite: self.overwrite,
            reset_timeout_on_access: self.reset_timeout_on_access,
            on_expire: self.on_expire.clone(),
            debug: self.debug,
        }
    }
}

impl<V> fmt::Debug for ClockOptions<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockOptions")
            .field("max_items", &self.max_items)
            .field("ttl", &self.ttl)
            .field("interval", &self.interval)
            .field("auto_start", &self.auto_start)
            .field("overwrite", &self.overwrite)
            .field("reset_timeout_on_access", &self.reset_timeout_on_access)
            .field("on_expire", &self.on_expire.as_ref().map(Option::is_some))
            .field("debug", &self.debug)
            .finish()
    }
}

// == Set Options ==
/// Per-call options for `set`, merged over the engine configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// TTL in milliseconds for this entry
    pub ttl: Option<f64>,
    /// Duplicate-key policy for this call
    pub overwrite: Option<bool>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl_ms: f64) -> Self {
        self.ttl = Some(ttl_ms);
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = Some(overwrite);
        self
    }

    /// Resolves the effective `(ttl, overwrite)` pair against `config`.
    pub fn resolve<V>(&self, config: &ClockConfig<V>) -> (Option<u64>, bool) {
        (
            coerce_count(self.ttl, config.ttl),
            self.overwrite.unwrap_or(config.overwrite),
        )
    }
}

// == Clock Config ==
/// The effective configuration of a cache clock.
pub struct ClockConfig<V> {
    /// Maximum number of entries, `None` = unbounded
    pub max_items: Option<usize>,
    /// Default TTL in milliseconds, `None` = never expires
    pub ttl: Option<u64>,
    /// Sweep interval in milliseconds, `None` = infinite
    pub interval: Option<u64>,
    pub auto_start: bool,
    pub overwrite: bool,
    pub reset_timeout_on_access: bool,
    pub on_expire: Option<ExpireCallback<V>>,
    pub debug: bool,
}

impl<V> ClockConfig<V> {
    /// Merges `options` over this configuration.
    ///
    /// Invalid numeric values fall back to the value held here, never to the
    /// hardcoded defaults, so repeated partial configuration is cumulative.
    pub fn merge(&self, options: &ClockOptions<V>) -> Self {
        let max_items = coerce_count(options.max_items, self.max_items.map(|n| n as u64))
            .map(|n| n.max(1) as usize);

        Self {
            max_items,
            ttl: coerce_count(options.ttl, self.ttl),
            interval: coerce_interval(options.interval, self.interval),
            auto_start: options.auto_start.unwrap_or(self.auto_start),
            overwrite: options.overwrite.unwrap_or(self.overwrite),
            reset_timeout_on_access: options
                .reset_timeout_on_access
                .unwrap_or(self.reset_timeout_on_access),
            on_expire: match &options.on_expire {
                Some(callback) => callback.clone(),
                None => self.on_expire.clone(),
            },
            debug: options.debug.unwrap_or(self.debug),
        }
    }

    /// Returns the sweep period, or `None` when the sweep is disabled
    /// (interval of 0 or infinite).
    pub fn sweep_interval(&self) -> Option<Duration> {
        match self.interval {
            Some(0) | None => None,
            Some(ms) => Some(Duration::from_millis(ms)),
        }
    }
}

impl<V> Default for ClockConfig<V> {
    fn default() -> Self {
        Self {
            max_items: Some(DEFAULT_MAX_ITEMS),
            ttl: None,
            interval: Some(DEFAULT_INTERVAL_MS),
            auto_start: true,
            overwrite: false,
            reset_timeout_on_access: false,
            on_expire: None,
            debug: false,
        }
    }
}

impl<V> Clone for ClockConfig<V> {
    fn clone(&self) -> Self {
        Self {
            max_items: self.max_items,
            ttl: self.ttl,
            interval: self.interval,
            auto_start: self.auto_start,
            overwrite: self.overwrite,
            reset_timeout_on_access: self.reset_timeout_on_access,
            on_expire: self.on_expire.clone(),
            debug: self.debug,
        }
    }
}

impl<V> fmt::Debug for ClockConfig<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockConfig")
            .field("max_items", &self.max_items)
            .field("ttl", &self.ttl)
            .field("interval", &self.interval)
            .field("auto_start", &self.auto_start)
            .field("overwrite", &self.overwrite)
            .field("reset_timeout_on_access", &self.reset_timeout_on_access)
            .field("on_expire", &self.on_expire.is_some())
            .field("debug", &self.debug)
            .finish()
    }
}

// == Coercion ==
/// Applies the numeric coercion rules. `None` means infinite on both sides.
fn coerce_count(input: Option<f64>, previous: Option<u64>) -> Option<u64> {
    match input {
        Some(value) if !value.is_nan() => {
            let value = value.abs();
            if value.is_infinite() {
                None
            } else {
                Some(value as u64)
            }
        }
        _ => previous,
    }
}

/// Like [`coerce_count`], but rounds a positive sub-millisecond interval up
/// to 1 ms instead of truncating it to the "disabled" value 0.
fn coerce_interval(input: Option<f64>, previous: Option<u64>) -> Option<u64> {
    let coerced = coerce_count(input, previous);
    match (input, coerced) {
        (Some(value), Some(0)) if value != 0.0 && !value.is_nan() => Some(1),
        _ => coerced,
    }
}

fn env_number(name: &str) -> Option<f64> {
    env::var(name)
        .ok()
        .map(|v| v.trim().parse().unwrap_or(f64::NAN))
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}
