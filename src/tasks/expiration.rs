//! Expiration Scheduler
//!
//! Stopped/Running state machine around a single sweep timer. The timer is
//! one-shot: the sweep it triggers stops the machine, purges, and starts it
//! again, so at most one sweep is ever in flight and every cycle waits the
//! full interval.

use std::time::Duration;

use crate::tasks::{Scheduler, TimerTask, TimerToken};

#[derive(Debug, Clone, Copy)]
struct Armed {
    token: TimerToken,
    generation: u64,
}

// == Expiration Scheduler ==
#[derive(Debug, Default)]
pub struct ExpirationScheduler {
    armed: Option<Armed>,
    generation: u64,
}

impl ExpirationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.armed.is_some()
    }

    /// Returns true if `generation` identifies the currently armed timer.
    ///
    /// A timer that fired after being stopped carries a stale generation and
    /// must not run its sweep.
    pub fn is_current(&self, generation: u64) -> bool {
        self.armed
            .is_some_and(|armed| armed.generation == generation)
    }

    // == Start ==
    /// Arms the sweep timer for `interval`.
    ///
    /// `make_task` receives the generation of the new timer and builds the
    /// work it runs. Nothing is armed when the interval is disabled (`None`)
    /// or a timer is already armed.
    ///
    /// # Returns
    /// `true` if a timer was armed.
    pub fn start<F>(
        &mut self,
        interval: Option<Duration>,
        scheduler: &dyn Scheduler,
        debug: bool,
        make_task: F,
    ) -> bool
    where
        F: FnOnce(u64) -> TimerTask,
    {
        let Some(interval) = interval else {
            diagnostic!(debug, debug, "Disabling the clock due to an unsupported interval");
            return false;
        };

        if self.armed.is_some() {
            diagnostic!(debug, warn, "Cache clock is already running. Unable to start");
            return false;
        }

        self.generation += 1;
        let generation = self.generation;
        let token = scheduler.arm(interval, make_task(generation));
        self.armed = Some(Armed { token, generation });

        diagnostic!(debug, debug, ?interval, generation, "Cache clock started");
        true
    }

    // == Stop ==
    /// Cancels the armed timer.
    ///
    /// # Returns
    /// `true` if a timer was armed and has been cancelled.
    pub fn stop(&mut self, scheduler: &dyn Scheduler, debug: bool) -> bool {
        match self.armed.take() {
            Some(armed) => {
                scheduler.cancel(armed.token);
                diagnostic!(debug, debug, generation = armed.generation, "Cache clock stopped");
                true
            }
            None => {
                diagnostic!(debug, warn, "Cache clock is not running. Unable to stop");
                false
            }
        }
    }
}
