use std::{ops::Add, sync::Arc};

use crate::{
  ops::delegate::{Delegate, DelegateSubscriber, Link},
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::deferred::{DeferredSink, DeferredSubscription},
};

/// Folds every value into an accumulator and emits the accumulator once,
/// when upstream completes.
///
/// An upstream that completes without values still produces one value: the
/// seed. Upstream is requested with unbounded demand regardless of
/// downstream demand; the single result waits until downstream asks for it.
///
/// # Example
///
/// ```
/// use rxstreams::prelude::*;
///
/// from_iter::<_, ()>(1..=5)
///   .fold(0, |acc, v| acc + v)
///   .subscribe_next(|sum| assert_eq!(sum, 15));
/// ```
pub struct FoldOp<S, A, F> {
  pub(crate) source: S,
  pub(crate) seed: A,
  pub(crate) func: Arc<F>,
}

pub struct FoldDelegate<A, F> {
  acc: Option<A>,
  func: Arc<F>,
}

impl<T, E, A, F> Delegate<T, E> for FoldDelegate<A, F>
where
  A: Send,
  F: Fn(A, T) -> A + Send + Sync,
{
  type Out = A;

  fn on_next<D>(&mut self, item: T, _link: &mut Link<D, A, E>)
  where
    D: Subscriber<A, E>,
  {
    self.acc = self.acc.take().map(|acc| (self.func)(acc, item));
  }

  fn on_complete<D>(&mut self, link: &mut Link<D, A, E>)
  where
    D: Subscriber<A, E>,
  {
    if let Some(acc) = self.acc.take() {
      link.next(acc);
    }
    link.complete();
  }
}

impl<S, A, F> Publisher for FoldOp<S, A, F>
where
  S: Publisher,
  S::Err: Send + 'static,
  A: Clone + Send + 'static,
  F: Fn(A, S::Item) -> A + Send + Sync + 'static,
{
  type Item = A;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<A, S::Err> + 'static,
  {
    let core = DeferredSubscription::start(subscriber);
    let delegate = FoldDelegate { acc: Some(self.seed.clone()), func: self.func.clone() };
    self.source.subscribe(DelegateSubscriber::new(delegate, DeferredSink::new(core)));
  }
}

pub(crate) fn add<T: Add<Output = T>>(acc: T, v: T) -> T { acc + v }
