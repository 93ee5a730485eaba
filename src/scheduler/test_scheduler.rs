//! Test Scheduler for deterministic testing of relocation and timer-driven
//! sources.
//!
//! Provides virtual time that only advances when explicitly instructed, and
//! a job queue that only runs when drained, so every interleaving a test
//! cares about can be produced step by step.
//!
//! # Usage
//!
//! ```rust
//! use rxstreams::prelude::*;
//! use rxstreams::testing::TestSubscriber;
//! use std::time::Duration;
//!
//! let scheduler = TestScheduler::default();
//! let probe = TestSubscriber::<u64, ()>::unbounded();
//! interval(Duration::from_millis(100), scheduler.clone()).take(3).subscribe(probe.clone());
//!
//! // Advance virtual time to trigger the ticks
//! scheduler.advance_by(Duration::from_millis(300));
//! assert_eq!(probe.values(), vec![0, 1, 2]);
//! ```
//!
//! # Thread Safety
//!
//! Unlike a thread-local virtual clock, the state lives behind an
//! `Arc<Mutex<_>>`, so clones can be handed to code running on other threads.
//! Jobs and ticks always run on the thread that drains the scheduler, and
//! never while the internal lock is held.

use std::{
  cmp::Ordering,
  collections::{BinaryHeap, VecDeque},
  sync::{Arc, Mutex},
  time::Duration,
};

use smallvec::SmallVec;

use super::{Executor, Job, Tick, Timer, TimerHandle};
use crate::subscription::lock;

// ==================== Internal State ====================

#[derive(Default)]
struct TestSchedulerState {
  virtual_time: Duration,
  jobs: VecDeque<Job>,
  timers: BinaryHeap<ScheduledTick>,
  next_timer_id: usize,
}

struct ScheduledTick {
  due: Duration,
  timer_id: usize,
  period: Duration,
  tick: Tick,
  handle: TimerHandle,
}

impl PartialEq for ScheduledTick {
  fn eq(&self, other: &Self) -> bool { self.due == other.due && self.timer_id == other.timer_id }
}

impl Eq for ScheduledTick {}

impl PartialOrd for ScheduledTick {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for ScheduledTick {
  fn cmp(&self, other: &Self) -> Ordering {
    // Min-heap: earlier times first, then FIFO by timer_id
    other.due.cmp(&self.due).then_with(|| other.timer_id.cmp(&self.timer_id))
  }
}

// ==================== TestScheduler ====================

/// A virtual time scheduler for deterministic testing.
///
/// All clones share the same virtual time, job queue and timers.
#[derive(Clone, Default)]
pub struct TestScheduler(Arc<Mutex<TestSchedulerState>>);

impl TestScheduler {
  pub fn new() -> Self { Self::default() }

  /// Current virtual time, measured from creation.
  pub fn now(&self) -> Duration { lock(&self.0).virtual_time }

  /// Number of submitted jobs not run yet.
  pub fn pending_jobs(&self) -> usize { lock(&self.0).jobs.len() }

  /// Number of live repeating timers.
  pub fn active_timers(&self) -> usize {
    lock(&self.0).timers.iter().filter(|t| !t.handle.is_cancelled()).count()
  }

  /// Runs submitted jobs in submission order, including jobs submitted while
  /// draining, until the queue is empty. Returns how many ran.
  pub fn run_pending(&self) -> usize {
    let mut ran = 0;
    loop {
      let job = lock(&self.0).jobs.pop_front();
      match job {
        Some(job) => {
          job();
          ran += 1;
        }
        None => return ran,
      }
    }
  }

  /// Runs exactly one submitted job, if any.
  pub fn run_one(&self) -> bool {
    let job = lock(&self.0).jobs.pop_front();
    job.map(|job| job()).is_some()
  }

  /// Advances virtual time by `delta`, firing every tick that falls due in
  /// order and draining the job queue after each one.
  pub fn advance_by(&self, delta: Duration) {
    self.run_pending();
    let target = self.now() + delta;
    loop {
      let mut due = {
        let mut state = lock(&self.0);
        match state.timers.peek() {
          Some(next) if next.due <= target => {
            let due = state.timers.pop();
            if let Some(t) = due.as_ref() {
              state.virtual_time = t.due;
            }
            due
          }
          _ => {
            state.virtual_time = target;
            None
          }
        }
      };
      let Some(scheduled) = due.as_mut() else { break };
      if scheduled.handle.is_cancelled() {
        continue;
      }
      let flow = (scheduled.tick)();
      self.run_pending();
      if flow.is_continue() && !scheduled.handle.is_cancelled() {
        if let Some(mut scheduled) = due {
          scheduled.due += scheduled.period;
          lock(&self.0).timers.push(scheduled);
        }
      }
    }
    self.drop_cancelled();
  }

  fn drop_cancelled(&self) {
    let mut cancelled: SmallVec<[ScheduledTick; 4]> = SmallVec::new();
    {
      let mut state = lock(&self.0);
      let timers = std::mem::take(&mut state.timers);
      state.timers = timers
        .into_iter()
        .filter_map(|t| {
          if t.handle.is_cancelled() {
            cancelled.push(t);
            None
          } else {
            Some(t)
          }
        })
        .collect();
    }
    // Ticks own their subscriber; drop them outside the lock.
    drop(cancelled);
  }
}

impl Executor for TestScheduler {
  fn submit(&self, job: Job) { lock(&self.0).jobs.push_back(job); }
}

impl Timer for TestScheduler {
  fn schedule_repeating(&self, tick: Tick, initial_delay: Duration, period: Duration) -> TimerHandle {
    let handle = TimerHandle::default();
    let mut state = lock(&self.0);
    let timer_id = state.next_timer_id;
    state.next_timer_id += 1;
    let due = state.virtual_time + initial_delay;
    // A zero period would fire forever within one `advance_by`.
    let period = period.max(Duration::from_nanos(1));
    state.timers.push(ScheduledTick { due, timer_id, period, tick, handle: handle.clone() });
    handle
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use std::{
    ops::ControlFlow,
    sync::{Arc, Mutex},
  };

  #[test]
  fn jobs_run_in_submission_order_only_when_drained() {
    let scheduler = TestScheduler::new();
    let log = Arc::new(Mutex::new(vec![]));
    for i in 0..3 {
      let log = log.clone();
      scheduler.submit(Box::new(move || log.lock().unwrap().push(i)));
    }
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(scheduler.pending_jobs(), 3);
    assert!(scheduler.run_one());
    assert_eq!(*log.lock().unwrap(), vec![0]);
    assert_eq!(scheduler.run_pending(), 2);
    assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
  }

  #[test]
  fn repeating_timer_follows_virtual_time() {
    let scheduler = TestScheduler::new();
    let ticks = Arc::new(Mutex::new(vec![]));
    let c_ticks = ticks.clone();
    let c_scheduler = scheduler.clone();
    scheduler.schedule_repeating(
      Box::new(move || {
        c_ticks.lock().unwrap().push(c_scheduler.now());
        ControlFlow::Continue(())
      }),
      Duration::from_millis(5),
      Duration::from_millis(10),
    );
    scheduler.advance_by(Duration::from_millis(4));
    assert!(ticks.lock().unwrap().is_empty());
    scheduler.advance_by(Duration::from_millis(21));
    assert_eq!(
      *ticks.lock().unwrap(),
      vec![Duration::from_millis(5), Duration::from_millis(15), Duration::from_millis(25)]
    );
    assert_eq!(scheduler.now(), Duration::from_millis(25));
  }

  #[test]
  fn break_and_cancel_stop_the_timer() {
    let scheduler = TestScheduler::new();
    let count = Arc::new(Mutex::new(0));
    let c_count = count.clone();
    scheduler.schedule_repeating(
      Box::new(move || {
        let mut count = c_count.lock().unwrap();
        *count += 1;
        if *count == 2 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
      }),
      Duration::ZERO,
      Duration::from_millis(1),
    );
    let handle = scheduler.schedule_repeating(
      Box::new(|| ControlFlow::Continue(())),
      Duration::ZERO,
      Duration::from_millis(1),
    );
    scheduler.advance_by(Duration::from_millis(10));
    assert_eq!(*count.lock().unwrap(), 2);
    assert_eq!(scheduler.active_timers(), 1);
    handle.cancel();
    scheduler.advance_by(Duration::from_millis(1));
    assert_eq!(scheduler.active_timers(), 0);
  }

  #[test]
  fn cancelled_timers_release_their_tick_before_falling_due() {
    let scheduler = TestScheduler::new();
    let owned = Arc::new(());
    let c_owned = owned.clone();
    let cancelled = scheduler.schedule_repeating(
      Box::new(move || {
        let _ = Arc::strong_count(&c_owned);
        ControlFlow::Continue(())
      }),
      Duration::from_secs(1),
      Duration::from_secs(1),
    );
    scheduler.schedule_repeating(Box::new(|| ControlFlow::Continue(())), Duration::from_secs(1), Duration::from_secs(1));
    assert_eq!(Arc::strong_count(&owned), 2);
    cancelled.cancel();
    scheduler.advance_by(Duration::from_millis(1));
    assert_eq!(Arc::strong_count(&owned), 1);
    assert_eq!(scheduler.active_timers(), 1);
  }
}
