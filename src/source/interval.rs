use std::{
  marker::PhantomData,
  ops::ControlFlow,
  sync::{
    atomic::{fence, AtomicBool, Ordering},
    Arc, Mutex, TryLockError, Weak,
  },
  time::Duration,
};

use crate::{
  error::{report_violation, ProtocolViolation, ViolationPolicy},
  publisher::Publisher,
  scheduler::{Timer, TimerHandle},
  subscriber::Subscriber,
  subscription::{lock, Demand, Lifecycle, Subscription},
};

/// Creates a publisher that emits a counter, `0, 1, 2, ...`, once per
/// `period`, on `timer`.
///
/// The timer starts with the first `request`; the first value arrives one
/// `period` later. A tick that finds no outstanding demand is dropped and
/// the counter is not advanced. The stream never completes on its own.
pub fn interval<Tm, E>(period: Duration, timer: Tm) -> Interval<Tm, E>
where
  Tm: Timer,
{
  interval_with(period, timer, 0, count as fn(u64) -> (u64, u64))
}

/// Like [`interval`], but every tick calls `step(state)` and emits the value
/// it returns, keeping the next state for the following tick.
pub fn interval_with<Tm, St, T, F, E>(period: Duration, timer: Tm, seed: St, step: F) -> IntervalWith<Tm, St, F, E>
where
  Tm: Timer,
  St: Clone,
  F: Fn(St) -> (T, St),
{
  IntervalWith { period, timer, seed, step: Arc::new(step), _p: PhantomData }
}

fn count(n: u64) -> (u64, u64) { (n, n + 1) }

pub type Interval<Tm, E> = IntervalWith<Tm, u64, fn(u64) -> (u64, u64), E>;

pub struct IntervalWith<Tm, St, F, E> {
  period: Duration,
  timer: Tm,
  seed: St,
  step: Arc<F>,
  _p: PhantomData<fn() -> E>,
}

impl<Tm: Clone, St: Clone, F, E> Clone for IntervalWith<Tm, St, F, E> {
  fn clone(&self) -> Self {
    IntervalWith {
      period: self.period,
      timer: self.timer.clone(),
      seed: self.seed.clone(),
      step: self.step.clone(),
      _p: PhantomData,
    }
  }
}

impl<Tm, St, T, F, E> Publisher for IntervalWith<Tm, St, F, E>
where
  Tm: Timer + Clone + 'static,
  St: Clone + Send + 'static,
  T: 'static,
  F: Fn(St) -> (T, St) + Send + Sync + 'static,
  E: 'static,
{
  type Item = T;
  type Err = E;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T, E> + 'static,
  {
    let subscription: Arc<IntervalSubscription<Tm, St, F, S, T, E>> = Arc::new_cyclic(|me| IntervalSubscription {
      me: me.clone(),
      demand: Demand::new(),
      life: Lifecycle::new(),
      installed: AtomicBool::new(false),
      started: AtomicBool::new(false),
      handle: Mutex::new(None),
      emitter: Mutex::new(None),
      step: self.step.clone(),
      timer: self.timer.clone(),
      period: self.period,
      _p: PhantomData,
    });
    let mut subscriber = subscriber;
    subscriber.on_subscribe(subscription.clone());
    *lock(&subscription.emitter) = Some(Emitter { state: Some(self.seed.clone()), subscriber });
    subscription.installed.store(true, Ordering::SeqCst);
    // pairs with the fence in `request`: one side always sees the other
    fence(Ordering::SeqCst);
    if subscription.demand.get() > 0 {
      subscription.start_timer();
    }
  }
}

struct Emitter<St, S> {
  state: Option<St>,
  subscriber: S,
}

struct IntervalSubscription<Tm, St, F, S, T, E> {
  me: Weak<Self>,
  demand: Demand,
  life: Lifecycle,
  /// Set once the subscriber sits in `emitter` and ticks may start.
  installed: AtomicBool,
  started: AtomicBool,
  handle: Mutex<Option<TimerHandle>>,
  emitter: Mutex<Option<Emitter<St, S>>>,
  step: Arc<F>,
  timer: Tm,
  period: Duration,
  _p: PhantomData<fn(T, E)>,
}

impl<Tm, St, T, F, S, E> IntervalSubscription<Tm, St, F, S, T, E>
where
  Tm: Timer + 'static,
  St: Send + 'static,
  T: 'static,
  F: Fn(St) -> (T, St) + Send + Sync + 'static,
  S: Subscriber<T, E> + 'static,
  E: 'static,
{
  fn start_timer(&self) {
    if self.started.swap(true, Ordering::AcqRel) {
      return;
    }
    let Some(me) = self.me.upgrade() else { return };
    tracing::debug!(period = ?self.period, "interval timer started");
    let handle = self.timer.schedule_repeating(Box::new(move || me.tick()), self.period, self.period);
    let mut slot = lock(&self.handle);
    if self.life.is_active() {
      *slot = Some(handle);
    } else {
      handle.cancel();
    }
  }

  fn tick(&self) -> ControlFlow<()> {
    let mut slot = lock(&self.emitter);
    let Some(emitter) = slot.as_mut() else { return ControlFlow::Break(()) };
    if !self.life.is_active() {
      return self.stop(&mut slot);
    }
    if !self.demand.try_consume() {
      tracing::trace!("interval tick dropped, no outstanding demand");
      return ControlFlow::Continue(());
    }
    let Some(state) = emitter.state.take() else { return self.stop(&mut slot) };
    let (value, next) = (self.step)(state);
    emitter.state = Some(next);
    emitter.subscriber.on_next(value);
    // cancelled from inside `on_next`
    if !self.life.is_active() {
      return self.stop(&mut slot);
    }
    ControlFlow::Continue(())
  }

  fn stop(&self, slot: &mut Option<Emitter<St, S>>) -> ControlFlow<()> {
    tracing::debug!("interval timer stopped");
    self.life.terminate();
    *slot = None;
    ControlFlow::Break(())
  }
}

impl<Tm, St, T, F, S, E> Subscription for IntervalSubscription<Tm, St, F, S, T, E>
where
  Tm: Timer + 'static,
  St: Send + 'static,
  T: 'static,
  F: Fn(St) -> (T, St) + Send + Sync + 'static,
  S: Subscriber<T, E> + 'static,
  E: 'static,
{
  fn request(&self, n: u64) {
    if n == 0 {
      report_violation(ProtocolViolation::NonPositiveRequest, ViolationPolicy::default());
      return;
    }
    if !self.life.is_active() {
      return;
    }
    self.demand.add(n);
    fence(Ordering::SeqCst);
    if self.installed.load(Ordering::SeqCst) {
      self.start_timer();
    }
  }

  fn cancel(&self) {
    if !self.life.request_cancel() {
      return;
    }
    tracing::trace!("interval cancelled");
    if let Some(handle) = lock(&self.handle).take() {
      handle.cancel();
    }
    // A tick delivering right now holds the emitter and will release the
    // subscriber itself.
    let released = match self.emitter.try_lock() {
      Ok(mut slot) => slot.take(),
      Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().take(),
      Err(TryLockError::WouldBlock) => None,
    };
    drop(released);
  }
}

#[cfg(test)]
mod test {
  use crate::{prelude::*, testing::*};
  use std::{
    sync::{Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
  };

  const PERIOD: Duration = Duration::from_millis(10);

  #[test]
  fn emits_counter_per_period() {
    let scheduler = TestScheduler::new();
    let probe = TestSubscriber::<u64, ()>::unbounded();
    interval(PERIOD, scheduler.clone()).subscribe(probe.clone());

    scheduler.advance_by(PERIOD * 5);
    assert_eq!(probe.values(), vec![0, 1, 2, 3, 4]);
    assert!(!probe.is_terminated());
  }

  #[test]
  fn timer_starts_on_first_request() {
    let scheduler = TestScheduler::new();
    let probe = TestSubscriber::<u64, ()>::new(0);
    interval(PERIOD, scheduler.clone()).subscribe(probe.clone());
    scheduler.advance_by(PERIOD * 3);
    assert_eq!(scheduler.active_timers(), 0);

    probe.request(2);
    assert_eq!(scheduler.active_timers(), 1);
    scheduler.advance_by(PERIOD);
    assert_eq!(probe.values(), vec![0]);
  }

  /// Requests from a freshly spawned thread while `subscribe` is still
  /// installing the subscriber.
  struct RequestElsewhere(Arc<Mutex<Option<JoinHandle<()>>>>);

  impl Subscriber<u64, ()> for RequestElsewhere {
    fn on_subscribe(&mut self, subscription: SubscriptionRef) {
      *self.0.lock().unwrap() = Some(thread::spawn(move || subscription.request(1)));
    }
    fn on_next(&mut self, _: u64) {}
    fn on_error(&mut self, _: ()) {}
    fn on_complete(&mut self) {}
  }

  #[test]
  fn request_racing_subscribe_still_starts_the_timer() {
    for _ in 0..200 {
      let scheduler = TestScheduler::new();
      let worker = Arc::new(Mutex::new(None));
      interval(PERIOD, scheduler.clone()).subscribe(RequestElsewhere(worker.clone()));
      if let Some(w) = worker.lock().unwrap().take() {
        w.join().unwrap();
      }
      assert_eq!(scheduler.active_timers(), 1);
    }
  }

  #[test]
  fn ticks_without_demand_are_dropped() {
    let scheduler = TestScheduler::new();
    let probe = TestSubscriber::<u64, ()>::new(2);
    interval(PERIOD, scheduler.clone()).subscribe(probe.clone());

    scheduler.advance_by(PERIOD * 5);
    assert_eq!(probe.values(), vec![0, 1]);
    probe.request(1);
    scheduler.advance_by(PERIOD);
    // counter did not move while no demand was outstanding
    assert_eq!(probe.values(), vec![0, 1, 2]);
    assert!(probe.violations().is_empty());
  }

  #[test]
  fn cancel_stops_the_timer() {
    let scheduler = TestScheduler::new();
    let probe = TestSubscriber::<u64, ()>::unbounded();
    interval(PERIOD, scheduler.clone()).subscribe(probe.clone());
    scheduler.advance_by(PERIOD * 2);

    probe.cancel();
    probe.cancel();
    scheduler.advance_by(PERIOD * 3);
    assert_eq!(probe.values(), vec![0, 1]);
    assert_eq!(scheduler.active_timers(), 0);
  }

  #[test]
  fn take_cancels_from_inside_on_next() {
    let scheduler = TestScheduler::new();
    let probe = TestSubscriber::<u64, ()>::unbounded();
    interval(PERIOD, scheduler.clone()).take(3).subscribe(probe.clone());
    scheduler.advance_by(PERIOD * 10);
    assert_eq!(probe.values(), vec![0, 1, 2]);
    assert!(probe.is_completed());
    assert_eq!(scheduler.active_timers(), 0);
  }

  #[test]
  fn stateful_interval() {
    let scheduler = TestScheduler::new();
    let probe = TestSubscriber::<String, ()>::unbounded();
    interval_with(PERIOD, scheduler.clone(), 'a', |c| (c.to_string(), (c as u8 + 1) as char))
      .subscribe(probe.clone());
    scheduler.advance_by(PERIOD * 3);
    assert_eq!(probe.values(), vec!["a", "b", "c"]);
  }

  #[test]
  fn independent_subscriptions() {
    let scheduler = TestScheduler::new();
    let source = interval::<_, ()>(PERIOD, scheduler.clone());
    let first = TestSubscriber::unbounded();
    source.subscribe(first.clone());
    scheduler.advance_by(PERIOD * 2);
    let second = TestSubscriber::unbounded();
    source.subscribe(second.clone());
    scheduler.advance_by(PERIOD * 2);
    assert_eq!(first.values(), vec![0, 1, 2, 3]);
    assert_eq!(second.values(), vec![0, 1]);
  }
}
