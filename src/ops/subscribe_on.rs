use std::sync::Arc;

use crate::{
  publisher::Publisher,
  scheduler::Executor,
  subscriber::Subscriber,
  subscription::{Subscription, SubscriptionRef},
};

/// Moves subscription onto an executor.
///
/// `subscribe` returns immediately; the upstream `subscribe`, its
/// `on_subscribe`, and the production triggered by demand run on the
/// executor. Later `request` calls are resubmitted to the executor as well,
/// so production never runs on the thread that asked for it. `cancel` is
/// forwarded directly.
#[derive(Clone)]
pub struct SubscribeOnOp<S, X> {
  pub(crate) source: Arc<S>,
  pub(crate) executor: X,
}

impl<S, X> Publisher for SubscribeOnOp<S, X>
where
  S: Publisher + Send + Sync + 'static,
  X: Executor + Clone + 'static,
{
  type Item = S::Item;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<S::Item, S::Err> + 'static,
  {
    let source = self.source.clone();
    let executor = self.executor.clone();
    tracing::debug!("relocating subscribe onto executor");
    self.executor.submit(Box::new(move || {
      source.subscribe(SubscribeOnSubscriber { downstream: subscriber, executor });
    }));
  }
}

pub struct SubscribeOnSubscriber<O, X> {
  downstream: O,
  executor: X,
}

impl<T, E, O, X> Subscriber<T, E> for SubscribeOnSubscriber<O, X>
where
  O: Subscriber<T, E>,
  X: Executor + Clone + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    let relocated = RelocatedRequests { upstream: subscription, executor: self.executor.clone() };
    self.downstream.on_subscribe(Arc::new(relocated));
  }

  #[inline]
  fn on_next(&mut self, item: T) { self.downstream.on_next(item) }

  #[inline]
  fn on_error(&mut self, err: E) { self.downstream.on_error(err) }

  #[inline]
  fn on_complete(&mut self) { self.downstream.on_complete() }
}

struct RelocatedRequests<X> {
  upstream: SubscriptionRef,
  executor: X,
}

impl<X: Executor> Subscription for RelocatedRequests<X> {
  fn request(&self, n: u64) {
    let upstream = self.upstream.clone();
    self.executor.submit(Box::new(move || upstream.request(n)));
  }

  fn cancel(&self) { self.upstream.cancel(); }
}

#[cfg(test)]
mod test {
  use crate::{prelude::*, testing::*};
  use std::{thread, time::Duration};

  #[test]
  fn subscribe_returns_before_anything_happens() {
    let scheduler = TestScheduler::new();
    let probe = TestSubscriber::<i32, ()>::unbounded();
    from_iter(1..5).subscribe_on(scheduler.clone()).subscribe(probe.clone());

    assert!(!probe.is_subscribed());
    assert_eq!(scheduler.pending_jobs(), 1);
    scheduler.run_pending();
    assert_eq!(probe.values(), vec![1, 2, 3, 4]);
    assert!(probe.is_completed());
  }

  #[test]
  fn later_requests_are_relocated() {
    let scheduler = TestScheduler::new();
    let probe = TestSubscriber::<i32, ()>::new(1);
    from_iter(1..5).subscribe_on(scheduler.clone()).subscribe(probe.clone());
    scheduler.run_pending();
    assert_eq!(probe.values(), vec![1]);

    probe.request(2);
    assert_eq!(probe.values(), vec![1]);
    scheduler.run_pending();
    assert_eq!(probe.values(), vec![1, 2, 3]);
  }

  #[test]
  fn thread_pool() {
    let pool = futures::executor::ThreadPool::new().unwrap();
    let probe = TestSubscriber::<i32, ()>::unbounded();
    from_iter(1..5).subscribe_on(pool).subscribe(probe.clone());

    assert!(probe.await_terminal(Duration::from_secs(5)));
    assert_eq!(probe.values(), (1..5).collect::<Vec<_>>());
    assert_ne!(probe.delivery_threads()[0], thread::current().id());
  }

  #[test]
  fn cancel_stops_production() {
    let scheduler = TestScheduler::new();
    let probe = TestSubscriber::<u64, ()>::new(2);
    generate(0u64, |n| (n, n + 1)).subscribe_on(scheduler.clone()).subscribe(probe.clone());
    scheduler.run_pending();
    probe.cancel();
    probe.request(10);
    scheduler.run_pending();
    assert_eq!(probe.values(), vec![0, 1]);
  }
}
