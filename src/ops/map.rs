use std::sync::Arc;

use crate::{
  ops::delegate::{Delegate, DelegateSubscriber, Link},
  publisher::Publisher,
  subscriber::Subscriber,
};

/// Transforms every value with `func`.
pub struct MapOp<S, F> {
  pub(crate) source: S,
  pub(crate) func: Arc<F>,
}

pub struct MapDelegate<F>(Arc<F>);

impl<T, E, B, F> Delegate<T, E> for MapDelegate<F>
where
  F: Fn(T) -> B + Send + Sync,
{
  type Out = B;

  #[inline]
  fn on_next<D>(&mut self, item: T, link: &mut Link<D, B, E>)
  where
    D: Subscriber<B, E>,
  {
    link.next((self.0)(item))
  }
}

impl<S, F, B> Publisher for MapOp<S, F>
where
  S: Publisher,
  S::Err: 'static,
  F: Fn(S::Item) -> B + Send + Sync + 'static,
  B: 'static,
{
  type Item = B;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<B, S::Err> + 'static,
  {
    self.source.subscribe(DelegateSubscriber::new(MapDelegate(self.func.clone()), subscriber))
  }
}

/// Transforms every value with a fallible `func`.
///
/// The first `Err` cancels upstream and becomes the single `on_error` seen
/// downstream; whatever upstream still emits afterwards is dropped.
pub struct TryMapOp<S, F> {
  pub(crate) source: S,
  pub(crate) func: Arc<F>,
}

pub struct TryMapDelegate<F>(Arc<F>);

impl<T, E, B, F> Delegate<T, E> for TryMapDelegate<F>
where
  F: Fn(T) -> Result<B, E> + Send + Sync,
{
  type Out = B;

  fn on_next<D>(&mut self, item: T, link: &mut Link<D, B, E>)
  where
    D: Subscriber<B, E>,
  {
    match (self.0)(item) {
      Ok(value) => link.next(value),
      Err(err) => {
        link.cancel_upstream();
        link.error(err);
      }
    }
  }
}

impl<S, F, B> Publisher for TryMapOp<S, F>
where
  S: Publisher,
  S::Err: 'static,
  F: Fn(S::Item) -> Result<B, S::Err> + Send + Sync + 'static,
  B: 'static,
{
  type Item = B;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<B, S::Err> + 'static,
  {
    self.source.subscribe(DelegateSubscriber::new(TryMapDelegate(self.func.clone()), subscriber))
  }
}
