//! Cache Clock demo
//!
//! Runs a synthetic read-through workload against a cache configured from
//! `CACHE_CLOCK_*` environment variables, logs statistics periodically and
//! prints the final statistics as JSON on shutdown.
//!
//! Engine diagnostics (`CACHE_CLOCK_DEBUG=true`) are emitted at debug level;
//! run with `RUST_LOG=cache_clock=debug` to see them.

use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache_clock::{CacheClock, CacheEntry, ClockOptions, SetOptions};

// == Workload Shape ==
const TICK: Duration = Duration::from_millis(100);
const KEY_SPACE: u64 = 64;
const REPORT_EVERY_TICKS: u64 = 50;

/// Main entry point for the cache clock demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load cache options from environment variables
/// 3. Create the cache (starts the expiration sweep unless disabled)
/// 4. Run the workload until SIGINT/SIGTERM
/// 5. Stop the sweep and print statistics
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info", can be overridden with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cache_clock=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cache clock demo");

    let options = ClockOptions::<String>::from_env().on_expire(|entry: &CacheEntry<String>| {
        info!(key = %entry.key, value = %entry.value, "Entry expired");
    });
    let cache = CacheClock::new(options).context("failed to create cache")?;

    let config = cache.options();
    info!(
        max_items = ?config.max_items,
        ttl = ?config.ttl,
        interval = ?config.interval,
        running = cache.is_running(),
        "Cache configured"
    );

    let workload = tokio::spawn(run_workload(cache.clone()));

    shutdown_signal().await;
    workload.abort();
    cache.stop();

    let stats = cache.stats();
    info!(
        age_ms = cache.age(),
        size = cache.size(),
        hit_rate = stats.hit_rate(),
        "Workload stopped"
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&stats).context("failed to encode statistics")?
    );

    Ok(())
}

/// Reads a key every tick and populates it on a miss with a varying TTL.
async fn run_workload(cache: CacheClock<String>) {
    let mut ticker = tokio::time::interval(TICK);
    let mut tick: u64 = 0;

    loop {
        ticker.tick().await;
        tick += 1;

        let key = format!("key-{}", tick.wrapping_mul(7919) % KEY_SPACE);
        if cache.get(&key).is_none() {
            let ttl_ms = 1_000 + (tick % 10) * 500;
            cache.set_with(
                &key,
                format!("value-{}", tick),
                SetOptions::new().ttl(ttl_ms as f64),
            );
        }

        if tick % REPORT_EVERY_TICKS == 0 {
            let stats = cache.stats();
            info!(
                size = cache.size(),
                hits = stats.hits,
                misses = stats.misses,
                expired = stats.expired,
                evictions = stats.evictions,
                "Cache stats"
            );
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
