use std::marker::PhantomData;

use crate::{
  error::ViolationPolicy,
  publisher::Publisher,
  source::cursor::{CursorConfig, CursorSubscription, IterCursor, RefillPolicy},
  subscriber::Subscriber,
};

/// Creates a publisher that emits the values of an iterable, on demand.
///
/// Every subscription iterates its own clone of `iter`, and completes as
/// soon as the iterator is exhausted. Never emits an error.
///
/// # Examples
///
/// ```
/// use rxstreams::prelude::*;
///
/// from_iter::<_, ()>(0..10).subscribe_next(|v| println!("{},", v));
/// ```
///
/// Or with a vector:
///
/// ```
/// use rxstreams::prelude::*;
///
/// from_iter::<_, ()>(vec![0, 1, 2, 3]).subscribe_next(|v| println!("{},", v));
/// ```
pub fn from_iter<I, E>(iter: I) -> FromIter<I, E>
where
  I: IntoIterator + Clone,
{
  FromIter { iter, config: CursorConfig::default(), _p: PhantomData }
}

/// Creates a publisher from an iterable of results. The first `Err` becomes
/// the terminal `on_error`, delivered whether or not demand is outstanding.
pub fn try_from_iter<I, T, E>(iter: I) -> TryFromIter<I>
where
  I: IntoIterator<Item = Result<T, E>> + Clone,
{
  TryFromIter { iter, config: CursorConfig::default() }
}

#[derive(Clone)]
pub struct FromIter<I, E> {
  iter: I,
  config: CursorConfig,
  _p: PhantomData<fn() -> E>,
}

#[derive(Clone)]
pub struct TryFromIter<I> {
  iter: I,
  config: CursorConfig,
}

macro_rules! cursor_source_config {
  ($ty: ident < $($g: ident),* >) => {
    impl<$($g),*> $ty<$($g),*> {
      /// Changes how much is emitted per `request` call.
      pub fn with_policy(mut self, refill: RefillPolicy) -> Self {
        self.config.refill = refill;
        self
      }

      /// Changes how a `request(0)` is reported.
      pub fn with_violation_policy(mut self, violations: ViolationPolicy) -> Self {
        self.config.violations = violations;
        self
      }
    }
  };
}

cursor_source_config!(FromIter<I, E>);
cursor_source_config!(TryFromIter<I>);
pub(crate) use cursor_source_config;

impl<I, E> Publisher for FromIter<I, E>
where
  I: IntoIterator + Clone,
  I::IntoIter: Send + 'static,
  I::Item: Send + 'static,
  E: Send + 'static,
{
  type Item = I::Item;
  type Err = E;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<I::Item, E> + 'static,
  {
    let cursor = IterCursor::new(self.iter.clone().into_iter().map(Ok::<I::Item, E>));
    CursorSubscription::start(cursor, subscriber, self.config)
  }
}

impl<I, T, E> Publisher for TryFromIter<I>
where
  I: IntoIterator<Item = Result<T, E>> + Clone,
  I::IntoIter: Send + 'static,
  T: Send + 'static,
  E: Send + 'static,
{
  type Item = T;
  type Err = E;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T, E> + 'static,
  {
    CursorSubscription::start(IterCursor::new(self.iter.clone().into_iter()), subscriber, self.config)
  }
}
