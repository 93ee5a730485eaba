use std::{
  collections::VecDeque,
  marker::PhantomData,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
  },
};

use crate::{
  publisher::Publisher,
  scheduler::Executor,
  signal::Signal,
  subscriber::Subscriber,
  subscription::{lock, Drain, Subscription, SubscriptionRef},
};

/// Re-emits every upstream signal from an executor.
///
/// Each signal is queued and delivered by its own job. Jobs of one
/// subscription are chained, so at most one of them is in flight and
/// downstream sees signals in upstream order on any pool, a multi-worker one
/// included. Signals still queued when downstream cancels are dropped.
#[derive(Clone)]
pub struct PublishOnOp<S, X> {
  pub(crate) source: S,
  pub(crate) executor: X,
}

impl<S, X> Publisher for PublishOnOp<S, X>
where
  S: Publisher,
  S::Item: Send + 'static,
  S::Err: Send + 'static,
  X: Executor + Clone + 'static,
{
  type Item = S::Item;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<S::Item, S::Err> + 'static,
  {
    let relay = Arc::new(Relay {
      queue: Mutex::new(VecDeque::new()),
      drain: Drain::default(),
      downstream: Mutex::new(Some(subscriber)),
      cancelled: Arc::new(AtomicBool::new(false)),
      executor: self.executor.clone(),
      _p: PhantomData,
    });
    self.source.subscribe(PublishOnSubscriber(relay));
  }
}

struct Relay<T, E, D, X> {
  queue: Mutex<VecDeque<Signal<T, E>>>,
  drain: Drain,
  downstream: Mutex<Option<D>>,
  cancelled: Arc<AtomicBool>,
  executor: X,
  _p: PhantomData<fn(T, E)>,
}

impl<T, E, D, X> Relay<T, E, D, X>
where
  T: Send + 'static,
  E: Send + 'static,
  D: Subscriber<T, E> + 'static,
  X: Executor + 'static,
{
  fn push(self: &Arc<Self>, signal: Signal<T, E>) {
    lock(&self.queue).push_back(signal);
    if self.drain.enter() {
      self.submit_next();
    }
  }

  fn submit_next(self: &Arc<Self>) {
    let relay = self.clone();
    tracing::debug!("relocating signal onto executor");
    self.executor.submit(Box::new(move || relay.deliver_one()));
  }

  /// Body of one job: delivers the oldest queued signal, then hands the rest
  /// of the queue to the next job.
  fn deliver_one(self: &Arc<Self>) {
    let signal = lock(&self.queue).pop_front();
    if let Some(signal) = signal {
      let mut slot = lock(&self.downstream);
      if self.cancelled.load(Ordering::Acquire) {
        *slot = None;
      } else if let Some(downstream) = slot.as_mut() {
        let terminal = signal.is_terminal();
        signal.dispatch(downstream);
        if terminal {
          *slot = None;
        }
      }
    }
    if self.drain.leave(1) > 0 {
      self.submit_next();
    }
  }
}

struct PublishOnSubscriber<T, E, D, X>(Arc<Relay<T, E, D, X>>);

impl<T, E, D, X> Subscriber<T, E> for PublishOnSubscriber<T, E, D, X>
where
  T: Send + 'static,
  E: Send + 'static,
  D: Subscriber<T, E> + 'static,
  X: Executor + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    let guarded = CancelFlag { upstream: subscription, cancelled: self.0.cancelled.clone() };
    self.0.push(Signal::Subscribe(Arc::new(guarded)));
  }

  fn on_next(&mut self, item: T) { self.0.push(Signal::Next(item)) }

  fn on_error(&mut self, err: E) { self.0.push(Signal::Error(err)) }

  fn on_complete(&mut self) { self.0.push(Signal::Complete) }
}

/// Subscription handed downstream: cancelling also discards whatever is still
/// queued.
struct CancelFlag {
  upstream: SubscriptionRef,
  cancelled: Arc<AtomicBool>,
}

impl Subscription for CancelFlag {
  #[inline]
  fn request(&self, n: u64) { self.upstream.request(n) }

  fn cancel(&self) {
    if !self.cancelled.swap(true, Ordering::AcqRel) {
      tracing::trace!("publish_on cancelled, dropping queued signals");
      self.upstream.cancel();
    }
  }
}

#[cfg(test)]
mod test {
  use crate::{prelude::*, testing::*};
  use futures::executor::ThreadPool;
  use std::{thread, time::Duration};

  #[test]
  fn nothing_is_delivered_before_the_executor_runs() {
    let scheduler = TestScheduler::new();
    let upstream = TestPublisher::<char, ()>::new();
    let probe = TestSubscriber::unbounded();
    upstream.clone().publish_on(scheduler.clone()).subscribe(probe.clone());
    assert!(!probe.is_subscribed());

    scheduler.run_pending();
    assert_eq!(upstream.subscription().requested(), UNBOUNDED);

    upstream.next('A');
    upstream.next('B');
    upstream.next('C');
    upstream.complete();
    assert!(probe.values().is_empty());
    // one job in flight at a time
    assert_eq!(scheduler.pending_jobs(), 1);

    assert!(scheduler.run_one());
    assert_eq!(probe.values(), vec!['A']);
    assert_eq!(scheduler.run_pending(), 3);
    assert_eq!(probe.values(), vec!['A', 'B', 'C']);
    assert!(probe.is_completed());
  }

  #[test]
  fn single_worker_preserves_order() {
    let pool = ThreadPool::builder().pool_size(1).create().unwrap();
    let probe = TestSubscriber::<char, ()>::unbounded();
    from_iter(vec!['A', 'B', 'C']).publish_on(pool).subscribe(probe.clone());

    assert!(probe.await_terminal(Duration::from_secs(5)));
    assert_eq!(probe.values(), vec!['A', 'B', 'C']);
    assert_ne!(probe.delivery_threads(), vec![thread::current().id()]);
  }

  #[test]
  fn many_workers_preserve_order() {
    let pool = ThreadPool::builder().pool_size(4).create().unwrap();
    let probe = TestSubscriber::<u32, ()>::replenishing(16);
    from_iter(0..1000).publish_on(pool).subscribe(probe.clone());

    assert!(probe.await_terminal(Duration::from_secs(10)));
    assert_eq!(probe.values(), (0..1000).collect::<Vec<_>>());
    assert!(probe.violations().is_empty());
  }

  #[test]
  fn cancel_drops_queued_signals() {
    let scheduler = TestScheduler::new();
    let upstream = TestPublisher::<i32, ()>::new();
    let probe = TestSubscriber::unbounded();
    upstream.clone().publish_on(scheduler.clone()).subscribe(probe.clone());
    scheduler.run_pending();

    upstream.next(1);
    upstream.next(2);
    upstream.next(3);
    scheduler.run_one();
    probe.cancel();
    probe.cancel();
    scheduler.run_pending();

    assert_eq!(probe.values(), vec![1]);
    assert!(!probe.is_terminated());
    assert_eq!(upstream.subscription().cancels(), 1);
  }

  #[test]
  fn error_is_relocated_too() {
    let scheduler = TestScheduler::new();
    let probe = TestSubscriber::<i32, &str>::unbounded();
    try_from_iter(vec![Ok(1), Err("late")]).publish_on(scheduler.clone()).subscribe(probe.clone());
    scheduler.run_pending();
    assert_eq!(probe.values(), vec![1]);
    assert_eq!(probe.error(), Some("late"));
  }
}
