//! Signal logging, the `log()` of other reactive libraries.
//!
//! Every signal crossing the operator, and every `request` / `cancel` going
//! back upstream, is recorded as a `tracing` event at `INFO` level with the
//! operator's label in the `stream` field.

use std::{fmt::Debug, sync::Arc};

use crate::{
  ops::delegate::{Delegate, DelegateSubscriber, Link},
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::{Subscription, SubscriptionRef, UNBOUNDED},
};

pub struct LogOp<S> {
  pub(crate) source: S,
  pub(crate) label: Arc<str>,
}

pub struct LogDelegate(Arc<str>);

struct LoggedSubscription {
  inner: SubscriptionRef,
  label: Arc<str>,
}

impl Subscription for LoggedSubscription {
  fn request(&self, n: u64) {
    if n == UNBOUNDED {
      tracing::info!(stream = %self.label, "request(unbounded)");
    } else {
      tracing::info!(stream = %self.label, "request({n})");
    }
    self.inner.request(n);
  }

  fn cancel(&self) {
    tracing::info!(stream = %self.label, "cancel()");
    self.inner.cancel();
  }
}

impl<T, E> Delegate<T, E> for LogDelegate
where
  T: Debug,
  E: Debug,
{
  type Out = T;

  fn on_subscribe<D>(&mut self, subscription: SubscriptionRef, link: &mut Link<D, T, E>)
  where
    D: Subscriber<T, E>,
  {
    tracing::info!(stream = %self.0, "on_subscribe");
    link.subscribe(Arc::new(LoggedSubscription { inner: subscription, label: self.0.clone() }));
  }

  fn on_next<D>(&mut self, item: T, link: &mut Link<D, T, E>)
  where
    D: Subscriber<T, E>,
  {
    tracing::info!(stream = %self.0, "on_next({item:?})");
    link.next(item);
  }

  fn on_error<D>(&mut self, err: E, link: &mut Link<D, T, E>)
  where
    D: Subscriber<T, E>,
  {
    tracing::info!(stream = %self.0, "on_error({err:?})");
    link.error(err);
  }

  fn on_complete<D>(&mut self, link: &mut Link<D, T, E>)
  where
    D: Subscriber<T, E>,
  {
    tracing::info!(stream = %self.0, "on_complete()");
    link.complete();
  }
}

impl<S> Publisher for LogOp<S>
where
  S: Publisher,
  S::Item: Debug + 'static,
  S::Err: Debug + 'static,
{
  type Item = S::Item;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<S::Item, S::Err> + 'static,
  {
    self.source.subscribe(DelegateSubscriber::new(LogDelegate(self.label.clone()), subscriber))
  }
}

#[cfg(test)]
mod test {
  use crate::{prelude::*, testing::*};

  #[test]
  fn is_transparent() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let probe = TestSubscriber::<i32, ()>::new(2);
    from_iter(1..=3).log("numbers").map(|v| v * 10).subscribe(probe.clone());
    assert_eq!(probe.values(), vec![10, 20]);
    probe.request(5);
    assert_eq!(probe.values(), vec![10, 20, 30]);
    assert!(probe.is_completed());
  }
}
