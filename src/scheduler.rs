//! Worker-pool and timer capabilities consumed by the relocation operators and
//! the timer-driven sources.
//!
//! Nothing here is looked up from global state: every operator that needs a
//! pool or a timer receives the handle explicitly.
//!
//! | Type | Executor | Timer |
//! |------|----------|-------|
//! | [`TestScheduler`] | yes | yes (virtual time) |
//! | `futures::executor::ThreadPool` | yes (`futures-scheduler`) | no |
//! | [`TokioScheduler`] | yes (`tokio-scheduler`) | yes |

use std::{
  ops::ControlFlow,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
  time::Duration,
};

pub mod test_scheduler;
pub use test_scheduler::TestScheduler;

#[cfg(feature = "tokio-scheduler")]
mod tokio_scheduler;
#[cfg(feature = "tokio-scheduler")]
pub use tokio_scheduler::TokioScheduler;

/// A unit of work handed to an [`Executor`].
pub type Job = Box<dyn FnOnce() + Send>;

/// Callback run by a [`Timer`] on every tick. Returning `Break` stops the
/// timer.
pub type Tick = Box<dyn FnMut() -> ControlFlow<()> + Send>;

/// Task-submission service.
///
/// `submit` must return without running `job`: relocation operators rely on
/// it to hand work over instead of recursing into it.
pub trait Executor: Send + Sync {
  fn submit(&self, job: Job);
}

/// Repeating-timer service.
///
/// Ticks of one schedule never overlap: the next tick runs only after the
/// previous one returned.
pub trait Timer: Send + Sync {
  fn schedule_repeating(&self, tick: Tick, initial_delay: Duration, period: Duration) -> TimerHandle;
}

impl<T: Executor + ?Sized> Executor for Arc<T> {
  #[inline]
  fn submit(&self, job: Job) { (**self).submit(job) }
}

impl<T: Timer + ?Sized> Timer for Arc<T> {
  #[inline]
  fn schedule_repeating(&self, tick: Tick, initial_delay: Duration, period: Duration) -> TimerHandle {
    (**self).schedule_repeating(tick, initial_delay, period)
  }
}

#[cfg(feature = "futures-scheduler")]
impl Executor for futures::executor::ThreadPool {
  fn submit(&self, job: Job) { self.spawn_ok(futures::future::lazy(move |_| job())); }
}

/// Cancellation handle of a repeating schedule. Cloning shares the handle.
#[derive(Debug, Clone, Default)]
pub struct TimerHandle(Arc<AtomicBool>);

impl TimerHandle {
  /// Stops the schedule before its next tick. A tick already running is not
  /// interrupted.
  pub fn cancel(&self) { self.0.store(true, Ordering::Release); }

  pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Acquire) }
}
