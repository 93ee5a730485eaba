use std::sync::{
  atomic::{AtomicU64, Ordering},
  Arc,
};

use crate::{
  ops::delegate::{Delegate, DelegateSubscriber, Link},
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::{Subscription, SubscriptionRef},
};

/// Emits only the first `count` values emitted by the source.
///
/// Upstream is never asked for more than `count` values in total, whatever
/// downstream requests. Once the `count`-th value has been forwarded, upstream
/// is cancelled and downstream completes, regardless of whether upstream ever
/// completes. Values upstream still emits while the cancellation is in flight
/// are discarded.
///
/// # Example
///
/// ```
/// use rxstreams::prelude::*;
///
/// from_iter::<_, ()>(0..10).take(5).subscribe_next(|v| println!("{}", v));
///
/// // print logs:
/// // 0
/// // 1
/// // 2
/// // 3
/// // 4
/// ```
pub struct TakeOp<S> {
  pub(crate) source: S,
  pub(crate) count: u64,
}

pub struct TakeDelegate {
  remaining: u64,
}

/// Subscription handed downstream: clamps the total requested from upstream
/// to the number of values `take` will ever forward.
struct CappedRequests {
  upstream: SubscriptionRef,
  unrequested: AtomicU64,
}

impl Subscription for CappedRequests {
  fn request(&self, n: u64) {
    if n == 0 {
      // upstream reports the violation
      self.upstream.request(0);
      return;
    }
    let granted = self
      .unrequested
      .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| (left > 0).then(|| left - n.min(left)))
      .map_or(0, |left| n.min(left));
    if granted > 0 {
      self.upstream.request(granted);
    }
  }

  fn cancel(&self) { self.upstream.cancel() }
}

impl<T, E> Delegate<T, E> for TakeDelegate {
  type Out = T;

  fn on_subscribe<D>(&mut self, subscription: SubscriptionRef, link: &mut Link<D, T, E>)
  where
    D: Subscriber<T, E>,
  {
    let capped = CappedRequests { upstream: subscription, unrequested: AtomicU64::new(self.remaining) };
    link.subscribe(Arc::new(capped));
    if self.remaining == 0 {
      link.cancel_upstream();
      link.complete();
    }
  }

  fn on_next<D>(&mut self, item: T, link: &mut Link<D, T, E>)
  where
    D: Subscriber<T, E>,
  {
    if self.remaining == 0 {
      return;
    }
    self.remaining -= 1;
    link.next(item);
    if self.remaining == 0 {
      link.cancel_upstream();
      link.complete();
    }
  }
}

impl<S> Publisher for TakeOp<S>
where
  S: Publisher,
  S::Item: 'static,
  S::Err: 'static,
{
  type Item = S::Item;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<S::Item, S::Err> + 'static,
  {
    self.source.subscribe(DelegateSubscriber::new(TakeDelegate { remaining: self.count }, subscriber))
  }
}

#[cfg(test)]
mod test {
  use crate::{prelude::*, testing::*};
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  #[test]
  fn base_function() {
    let probe = TestSubscriber::<i32, ()>::unbounded();
    from_iter(1..=100).take(5).subscribe(probe.clone());
    assert_eq!(probe.values(), vec![1, 2, 3, 4, 5]);
    assert!(probe.is_completed());
    assert!(probe.violations().is_empty());
  }

  #[test]
  fn cancels_upstream_right_after_the_last_value() {
    let upstream = TestPublisher::<i32, ()>::new();
    let probe = TestSubscriber::unbounded();
    upstream.clone().take(5).subscribe(probe.clone());
    for v in 1..=4 {
      upstream.next(v);
    }
    assert_eq!(upstream.subscription().cancels(), 0);
    upstream.next(5);
    assert_eq!(upstream.subscription().cancels(), 1);
    assert!(probe.is_completed());

    // late values racing the cancellation are dropped silently
    upstream.next(6);
    upstream.complete();
    assert_eq!(probe.values(), vec![1, 2, 3, 4, 5]);
    assert!(probe.violations().is_empty());
  }

  #[test]
  fn fewer_values_than_count() {
    let probe = TestSubscriber::<i32, ()>::unbounded();
    from_iter(0..3).take(10).subscribe(probe.clone());
    assert_eq!(probe.values(), vec![0, 1, 2]);
    assert!(probe.is_completed());
  }

  #[test]
  fn take_zero_completes_immediately() {
    let upstream = TestPublisher::<i32, ()>::new();
    let probe = TestSubscriber::unbounded();
    upstream.clone().take(0).subscribe(probe.clone());
    assert!(probe.is_completed());
    assert!(probe.values().is_empty());
    assert_eq!(upstream.subscription().cancels(), 1);
  }

  #[test]
  fn requests_are_clamped_to_count() {
    let upstream = TestPublisher::<i32, ()>::new();
    let probe = TestSubscriber::new(2);
    upstream.clone().take(5).subscribe(probe.clone());
    probe.request(2);
    probe.request(UNBOUNDED);
    probe.request(1);
    assert_eq!(upstream.subscription().request_calls(), vec![2, 2, 1]);
  }

  #[test]
  fn relocated_take_stops_a_large_source() {
    let scheduler = TestScheduler::new();
    let produced = Arc::new(AtomicUsize::new(0));
    let c_produced = produced.clone();
    let probe = TestSubscriber::<u32, ()>::unbounded();
    from_iter(0..100_000u32)
      .inspect(move |_| {
        c_produced.fetch_add(1, Ordering::Relaxed);
      })
      .publish_on(scheduler.clone())
      .take(2)
      .subscribe(probe.clone());
    scheduler.run_pending();
    assert_eq!(probe.values(), vec![0, 1]);
    assert!(probe.is_completed());
    assert_eq!(produced.load(Ordering::Relaxed), 2);
  }

  #[test]
  fn relocated_take_finishes_an_infinite_source() {
    let scheduler = TestScheduler::new();
    let probe = TestSubscriber::<u64, ()>::unbounded();
    generate(0u64, |n| (n, n + 1)).publish_on(scheduler.clone()).take(3).subscribe(probe.clone());
    scheduler.run_pending();
    assert_eq!(probe.values(), vec![0, 1, 2]);
    assert!(probe.is_completed());
    assert_eq!(scheduler.pending_jobs(), 0);
  }

  #[test]
  fn take_over_infinite_generator() {
    let probe = TestSubscriber::<u64, ()>::replenishing(2);
    generate(1u64, |n| (n, n * 2)).take(6).subscribe(probe.clone());
    assert_eq!(probe.values(), vec![1, 2, 4, 8, 16, 32]);
    assert!(probe.is_completed());
    assert!(probe.violations().is_empty());
  }
}
