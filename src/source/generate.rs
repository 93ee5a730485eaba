use std::{marker::PhantomData, sync::Arc};

use crate::{
  error::ViolationPolicy,
  publisher::Publisher,
  source::{
    cursor::{Cursor, CursorConfig, CursorSubscription, Lookahead, RefillPolicy},
    from_iter::cursor_source_config,
  },
  subscriber::Subscriber,
};

/// Creates an endless publisher threading a state through `step`.
///
/// Each subscription starts from its own clone of `seed`; every unit of
/// demand calls `step(state)` once, emits the value and keeps the next
/// state. Nothing is computed ahead of demand.
///
/// # Example
///
/// ```
/// use rxstreams::prelude::*;
///
/// // 1, 1, 2, 3, 5
/// generate::<_, _, _, ()>((0u64, 1u64), |(a, b)| (b, (b, a + b)))
///   .take(5)
///   .subscribe_next(|v| println!("{v}"));
/// ```
pub fn generate<St, T, F, E>(seed: St, step: F) -> Generate<St, F, E>
where
  St: Clone,
  F: Fn(St) -> (T, St),
{
  Generate { seed, step: Arc::new(step), config: CursorConfig::default(), _p: PhantomData }
}

pub struct Generate<St, F, E> {
  seed: St,
  step: Arc<F>,
  config: CursorConfig,
  _p: PhantomData<fn() -> E>,
}

impl<St: Clone, F, E> Clone for Generate<St, F, E> {
  fn clone(&self) -> Self {
    Generate { seed: self.seed.clone(), step: self.step.clone(), config: self.config, _p: PhantomData }
  }
}

cursor_source_config!(Generate<St, F, E>);

pub struct GenerateCursor<St, F, E> {
  state: Option<St>,
  step: Arc<F>,
  _p: PhantomData<fn() -> E>,
}

impl<St, T, F, E> Cursor for GenerateCursor<St, F, E>
where
  St: Send,
  F: Fn(St) -> (T, St) + Send + Sync,
{
  type Item = T;
  type Err = E;

  #[inline]
  fn peek(&mut self) -> Lookahead { Lookahead::Value }

  fn pull(&mut self) -> Option<Result<T, E>> {
    let (value, next) = (self.step)(self.state.take()?);
    self.state = Some(next);
    Some(Ok(value))
  }
}

impl<St, T, F, E> Publisher for Generate<St, F, E>
where
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
    let cursor = GenerateCursor { state: Some(self.seed.clone()), step: self.step.clone(), _p: PhantomData };
    CursorSubscription::start(cursor, subscriber, self.config)
  }
}
