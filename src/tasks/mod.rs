//! Background Tasks Module
//!
//! Timers that drive the periodic expiration sweep.
//!
//! # Tasks
//! - Scheduler: arms and cancels one-shot timers (Tokio or simulated)
//! - Expiration: the Stopped/Running state machine around the sweep timer

mod expiration;
mod scheduler;

pub use expiration::ExpirationScheduler;
pub use scheduler::{ManualScheduler, Scheduler, TimerTask, TimerToken, TokioScheduler};
