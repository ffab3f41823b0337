//! Timer Scheduler
//!
//! One-shot timers behind a small capability trait so the cache clock does not
//! depend on a particular runtime. [`TokioScheduler`] spawns sleeping tasks on
//! a Tokio runtime; [`ManualScheduler`] keeps timers in memory and fires them
//! when a [`ManualClock`] is advanced.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::error::{CacheError, Result};
use crate::time::{ManualClock, TimeSource};

/// Work run once when a timer fires.
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

// == Timer Token ==
/// Identifies an armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

// == Scheduler ==
/// Arms and cancels one-shot timers.
pub trait Scheduler: Send + Sync {
    /// Runs `task` once after `delay`.
    fn arm(&self, delay: Duration, task: TimerTask) -> TimerToken;

    /// Cancels a pending timer. Unknown or already fired tokens are ignored.
    fn cancel(&self, token: TimerToken);
}

// == Tokio Scheduler ==
/// Scheduler backed by tasks spawned on a Tokio runtime.
#[derive(Clone)]
pub struct TokioScheduler {
    handle: Handle,
    timers: Arc<TokioTimers>,
}

#[derive(Default)]
struct TokioTimers {
    next: AtomicU64,
    pending: Mutex<HashMap<TimerToken, JoinHandle<()>>>,
}

impl TokioScheduler {
    /// Creates a scheduler spawning onto `handle`.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            timers: Arc::new(TokioTimers::default()),
        }
    }

    /// Creates a scheduler for the runtime the caller is running in.
    ///
    /// # Errors
    /// Returns [`CacheError::NoRuntime`] outside of a Tokio runtime.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| CacheError::NoRuntime)
    }

    /// Number of timers that have neither fired nor been cancelled.
    pub fn pending(&self) -> usize {
        self.timers.pending.lock().len()
    }
}

impl Scheduler for TokioScheduler {
    fn arm(&self, delay: Duration, task: TimerTask) -> TimerToken {
        let token = TimerToken(self.timers.next.fetch_add(1, Ordering::SeqCst));
        let deadline = tokio::time::Instant::now() + delay;
        let timers = Arc::clone(&self.timers);

        // Registration happens under the lock so the task cannot fire before
        // its handle is recorded.
        let mut pending = self.timers.pending.lock();
        let join = self.handle.spawn(async move {
            tokio::time::sleep_until(deadline).await;

            let fired = timers.pending.lock().remove(&token).is_some();
            if fired {
                trace!(?token, "Timer fired");
                task();
            }
        });
        pending.insert(token, join);

        token
    }

    fn cancel(&self, token: TimerToken) {
        if let Some(join) = self.timers.pending.lock().remove(&token) {
            join.abort();
            trace!(?token, "Timer cancelled");
        }
    }
}

impl fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

// == Manual Scheduler ==
/// Simulated scheduler driven by [`ManualScheduler::advance`].
///
/// Due timers fire in deadline order (ties in arming order) and the shared
/// clock is moved to each deadline before its task runs, so tasks observe the
/// time they were scheduled for.
#[derive(Clone)]
pub struct ManualScheduler {
    clock: ManualClock,
    timers: Arc<Mutex<ManualTimers>>,
}

#[derive(Default)]
struct ManualTimers {
    next: u64,
    pending: Vec<ManualTimer>,
}

struct ManualTimer {
    token: TimerToken,
    deadline: u64,
    task: TimerTask,
}

impl ManualScheduler {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            timers: Arc::new(Mutex::new(ManualTimers::default())),
        }
    }

    /// The clock this scheduler drives.
    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Number of armed timers.
    pub fn pending(&self) -> usize {
        self.timers.lock().pending.len()
    }

    /// Advances the clock by `millis`, firing every timer that falls due,
    /// including timers armed by tasks fired along the way.
    pub fn advance(&self, millis: u64) {
        let target = self.clock.now().saturating_add(millis);

        while let Some(timer) = self.take_due(target) {
            self.clock.set(timer.deadline);
            (timer.task)();
        }

        self.clock.set(target);
    }

    fn take_due(&self, target: u64) -> Option<ManualTimer> {
        let mut timers = self.timers.lock();
        let index = timers
            .pending
            .iter()
            .enumerate()
            .filter(|(_, t)| t.deadline <= target)
            .min_by_key(|(_, t)| (t.deadline, t.token))
            .map(|(i, _)| i)?;
        Some(timers.pending.remove(index))
    }
}

impl Scheduler for ManualScheduler {
    fn arm(&self, delay: Duration, task: TimerTask) -> TimerToken {
        let deadline = self
            .clock
            .now()
            .saturating_add(delay.as_millis() as u64);

        let mut timers = self.timers.lock();
        let token = TimerToken(timers.next);
        timers.next += 1;
        timers.pending.push(ManualTimer {
            token,
            deadline,
            task,
        });
        token
    }

    fn cancel(&self, token: TimerToken) {
        self.timers.lock().pending.retain(|t| t.token != token);
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("now", &self.clock.now())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn recorder() -> (Arc<Mutex<Vec<u64>>>, ManualScheduler) {
        (
            Arc::new(Mutex::new(Vec::new())),
            ManualScheduler::new(ManualClock::default()),
        )
    }

    #[test]
    fn test_manual_fires_in_deadline_order() {
        let (log, scheduler) = recorder();

        for delay in [300u64, 100, 200] {
            let log = Arc::clone(&log);
            let clock = scheduler.clock().clone();
            scheduler.arm(
                Duration::from_millis(delay),
                Box::new(move || log.lock().push(clock.now())),
            );
        }

        scheduler.advance(250);
        assert_eq!(*log.lock(), vec![100, 200]);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.clock().now(), 250);

        scheduler.advance(50);
        assert_eq!(*log.lock(), vec![100, 200, 300]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_manual_cancel() {
        let (log, scheduler) = recorder();
        let log_clone = Arc::clone(&log);

        let token = scheduler.arm(
            Duration::from_millis(10),
            Box::new(move || log_clone.lock().push(1)),
        );
        scheduler.cancel(token);
        scheduler.advance(100);

        assert!(log.lock().is_empty());

        // Cancelling twice is harmless
        scheduler.cancel(token);
    }

    #[test]
    fn test_manual_rearm_from_task() {
        let scheduler = ManualScheduler::new(ManualClock::default());
        let fired = Arc::new(AtomicUsize::new(0));

        fn rearm(scheduler: ManualScheduler, fired: Arc<AtomicUsize>) {
            let next = scheduler.clone();
            scheduler.arm(
                Duration::from_millis(50),
                Box::new(move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                    rearm(next, fired);
                }),
            );
        }

        rearm(scheduler.clone(), Arc::clone(&fired));
        scheduler.advance(275);

        assert_eq!(fired.load(Ordering::SeqCst), 5);
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn test_tokio_current_outside_runtime() {
        assert!(matches!(TokioScheduler::current(), Err(CacheError::NoRuntime)));
    }

    #[test]
    fn test_tokio_current_inside_runtime() {
        let scheduler = tokio_test::block_on(async { TokioScheduler::current() });
        assert!(scheduler.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_fires_after_delay() {
        let scheduler = TokioScheduler::current().unwrap();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);

        scheduler.arm(
            Duration::from_millis(500),
            Box::new(move || {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(scheduler.pending(), 1);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_cancel_prevents_firing() {
        let scheduler = TokioScheduler::current().unwrap();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);

        let token = scheduler.arm(
            Duration::from_millis(100),
            Box::new(move || {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        scheduler.cancel(token);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(), 0);
    }
}
