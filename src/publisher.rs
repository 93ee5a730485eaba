//! The producer side of the protocol and the operator methods every publisher
//! gets for free.

use std::{ops::Add, sync::Arc};

use crate::{
  ops::{
    fold::{add, FoldOp},
    inspect::InspectOp,
    last_value::LastValue,
    log::LogOp,
    map::{MapOp, TryMapOp},
    publish_on::PublishOnOp,
    subscribe_on::SubscribeOnOp,
    take::TakeOp,
  },
  scheduler::Executor,
  subscriber::{BoxSubscriber, LambdaSubscriber, SubscribeHandle, Subscriber},
};

/// A source of values, subscribed to any number of times.
///
/// Every `subscribe` call starts a new, independent subscription: a cold
/// publisher replays its whole sequence for each subscriber.
pub trait Publisher {
  type Item;
  type Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Self::Item, Self::Err> + 'static;
}

impl<P: Publisher> Publisher for Arc<P> {
  type Item = P::Item;
  type Err = P::Err;

  #[inline]
  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Self::Item, Self::Err> + 'static,
  {
    (**self).subscribe(subscriber)
  }
}

/// Object-safe form of [`Publisher`], behind [`BoxPublisher`].
pub trait DynPublisher<T, E> {
  fn dyn_subscribe(&self, subscriber: BoxSubscriber<T, E>);
}

impl<T, E, P> DynPublisher<T, E> for P
where
  T: 'static,
  E: 'static,
  P: Publisher<Item = T, Err = E>,
{
  fn dyn_subscribe(&self, subscriber: BoxSubscriber<T, E>) { self.subscribe(subscriber) }
}

/// Type-erased publisher.
pub type BoxPublisher<T, E> = Box<dyn DynPublisher<T, E> + Send + Sync>;

impl<T: 'static, E: 'static> Publisher for BoxPublisher<T, E> {
  type Item = T;
  type Err = E;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T, E> + 'static,
  {
    self.dyn_subscribe(Box::new(subscriber))
  }
}

/// Operators and subscribe helpers, available on every [`Publisher`].
pub trait PublisherExt: Publisher + Sized {
  /// Transforms every value with `f`.
  fn map<B, F>(self, f: F) -> MapOp<Self, F>
  where
    F: Fn(Self::Item) -> B,
  {
    MapOp { source: self, func: Arc::new(f) }
  }

  /// Transforms every value with a fallible `f`; the first `Err` terminates
  /// the stream and cancels upstream.
  fn try_map<B, F>(self, f: F) -> TryMapOp<Self, F>
  where
    F: Fn(Self::Item) -> Result<B, Self::Err>,
  {
    TryMapOp { source: self, func: Arc::new(f) }
  }

  /// Folds the stream into one value, emitted on completion.
  fn fold<A, F>(self, seed: A, f: F) -> FoldOp<Self, A, F>
  where
    F: Fn(A, Self::Item) -> A,
  {
    FoldOp { source: self, seed, func: Arc::new(f) }
  }

  /// Sums every value, starting from `Default::default()`.
  #[allow(clippy::type_complexity)]
  fn sum(self) -> FoldOp<Self, Self::Item, fn(Self::Item, Self::Item) -> Self::Item>
  where
    Self::Item: Default + Add<Output = Self::Item>,
  {
    let func: fn(Self::Item, Self::Item) -> Self::Item = add::<Self::Item>;
    FoldOp { source: self, seed: Self::Item::default(), func: Arc::new(func) }
  }

  /// Emits only the first `count` values.
  fn take(self, count: u64) -> TakeOp<Self> { TakeOp { source: self, count } }

  /// Calls `f` with a reference to every value passing through.
  fn inspect<F>(self, f: F) -> InspectOp<Self, F>
  where
    F: Fn(&Self::Item),
  {
    InspectOp { source: self, func: Arc::new(f) }
  }

  /// Records every signal, request and cancel as a `tracing` event labelled
  /// with `label`.
  fn log(self, label: impl Into<Arc<str>>) -> LogOp<Self> { LogOp { source: self, label: label.into() } }

  /// Subscribes to the source from `executor`.
  fn subscribe_on<X: Executor>(self, executor: X) -> SubscribeOnOp<Self, X> {
    SubscribeOnOp { source: Arc::new(self), executor }
  }

  /// Delivers every signal from `executor`, in order.
  fn publish_on<X: Executor>(self, executor: X) -> PublishOnOp<Self, X> { PublishOnOp { source: self, executor } }

  fn box_it(self) -> BoxPublisher<Self::Item, Self::Err>
  where
    Self: Send + Sync + 'static,
    Self::Item: 'static,
    Self::Err: 'static,
  {
    Box::new(self)
  }

  /// Subscribes with unbounded demand, calling `next` for every value and
  /// ignoring the terminal signal.
  fn subscribe_next<N>(&self, next: N) -> SubscribeHandle
  where
    N: FnMut(Self::Item) + Send + 'static,
    Self::Item: 'static,
    Self::Err: 'static,
  {
    self.subscribe_all(next, |_| {}, || {})
  }

  /// Subscribes with unbounded demand and one closure per signal kind.
  fn subscribe_all<N, Er, C>(&self, next: N, error: Er, complete: C) -> SubscribeHandle
  where
    N: FnMut(Self::Item) + Send + 'static,
    Er: FnMut(Self::Err) + Send + 'static,
    C: FnMut() + Send + 'static,
    Self::Item: 'static,
    Self::Err: 'static,
  {
    let subscriber = LambdaSubscriber::new(next, error, complete);
    let handle = subscriber.handle();
    self.subscribe(subscriber);
    handle
  }

  /// Future resolving to the last value (`None` for an empty stream) or the
  /// error.
  fn last_value(&self) -> LastValue<Self::Item, Self::Err>
  where
    Self::Item: Send + 'static,
    Self::Err: Send + 'static,
  {
    let (last, subscriber) = LastValue::new();
    self.subscribe(subscriber);
    last
  }
}

impl<P: Publisher> PublisherExt for P {}

#[cfg(test)]
mod test {
  use crate::{prelude::*, testing::*};
  use std::sync::{Arc, Mutex};

  #[test]
  fn boxed_publishers_are_interchangeable() {
    let sources: Vec<BoxPublisher<i32, ()>> =
      vec![from_iter(1..3).box_it(), from_iter(vec![7]).map(|v| v * 2).box_it()];
    let probe = TestSubscriber::unbounded();
    sources[1].subscribe(probe.clone());
    assert_eq!(probe.values(), vec![14]);

    let probe = TestSubscriber::unbounded();
    sources[0].subscribe(probe.clone());
    assert_eq!(probe.values(), vec![1, 2]);
  }

  #[test]
  fn subscribe_all_sees_every_signal_kind() {
    let log = Arc::new(Mutex::new(vec![]));
    let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
    try_from_iter(vec![Ok(1), Err("e")]).subscribe_all(
      move |v: i32| l1.lock().unwrap().push(format!("next {v}")),
      move |e: &str| l2.lock().unwrap().push(format!("error {e}")),
      move || l3.lock().unwrap().push("complete".to_owned()),
    );
    assert_eq!(*log.lock().unwrap(), vec!["next 1".to_owned(), "error e".to_owned()]);
  }

  #[test]
  fn handle_cancels_subscription() {
    let upstream = TestPublisher::<i32, ()>::new();
    let seen = Arc::new(Mutex::new(vec![]));
    let c_seen = seen.clone();
    let handle = upstream.subscribe_next(move |v| c_seen.lock().unwrap().push(v));
    upstream.next(1);
    handle.cancel();
    handle.cancel();
    assert!(handle.is_cancelled());
    assert_eq!(upstream.subscription().cancels(), 1);
    assert_eq!(*seen.lock().unwrap(), vec![1]);
  }

  #[test]
  fn guard_cancels_on_drop() {
    let upstream = TestPublisher::<i32, ()>::new();
    {
      let _guard = upstream.subscribe_next(|_| {}).cancel_when_dropped();
      assert_eq!(upstream.subscription().cancels(), 0);
    }
    assert_eq!(upstream.subscription().cancels(), 1);
  }

  #[test]
  fn arc_publisher_shares_the_source() {
    let source = Arc::new(from_iter(0..3));
    let a = TestSubscriber::<i32, ()>::unbounded();
    let b = TestSubscriber::<i32, ()>::unbounded();
    source.subscribe(a.clone());
    source.clone().subscribe(b.clone());
    assert_eq!(a.values(), b.values());
  }
}
