use std::time::Duration;

use tokio::runtime::Handle;

use super::{Executor, Job, Tick, Timer, TimerHandle};

/// Executor and timer backed by a tokio runtime.
///
/// Jobs run as tasks on the runtime's workers; repeating schedules are driven
/// by `tokio::time::interval_at`, so the runtime needs its time driver
/// enabled.
#[derive(Clone, Debug)]
pub struct TokioScheduler {
  handle: Handle,
}

impl TokioScheduler {
  pub fn new(handle: Handle) -> Self { TokioScheduler { handle } }

  /// Uses the runtime the caller is running on.
  ///
  /// # Panics
  ///
  /// Panics when called outside of a tokio runtime.
  pub fn current() -> Self { Self::new(Handle::current()) }
}

impl Executor for TokioScheduler {
  fn submit(&self, job: Job) {
    self.handle.spawn(async move { job() });
  }
}

impl Timer for TokioScheduler {
  fn schedule_repeating(&self, mut tick: Tick, initial_delay: Duration, period: Duration) -> TimerHandle {
    let handle = TimerHandle::default();
    let c_handle = handle.clone();
    // tokio rejects a zero period.
    let period = period.max(Duration::from_millis(1));
    self.handle.spawn(async move {
      let start = tokio::time::Instant::now() + initial_delay;
      let mut ticker = tokio::time::interval_at(start, period);
      loop {
        ticker.tick().await;
        if c_handle.is_cancelled() || tick().is_break() {
          tracing::debug!("repeating schedule stopped");
          break;
        }
      }
    });
    handle
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use std::{
    ops::ControlFlow,
    sync::{
      atomic::{AtomicUsize, Ordering},
      Arc,
    },
  };

  #[tokio::test(flavor = "multi_thread")]
  async fn ticks_until_break() {
    let scheduler = TokioScheduler::current();
    let count = Arc::new(AtomicUsize::new(0));
    let c_count = count.clone();
    scheduler.schedule_repeating(
      Box::new(move || {
        if c_count.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
          ControlFlow::Break(())
        } else {
          ControlFlow::Continue(())
        }
      }),
      Duration::ZERO,
      Duration::from_millis(1),
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(count.load(Ordering::SeqCst), 3);
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn jobs_run_on_the_runtime() {
    let scheduler = TokioScheduler::current();
    let (tx, rx) = futures::channel::oneshot::channel();
    scheduler.submit(Box::new(move || {
      let _ = tx.send(7);
    }));
    assert_eq!(rx.await, Ok(7));
  }
}
