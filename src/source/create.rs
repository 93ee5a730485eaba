use std::{marker::PhantomData, sync::Arc};

use crate::{
  publisher::Publisher,
  subscriber::{BoxSubscriber, Subscriber},
};

/// Creates a publisher from a closure that receives each subscriber.
///
/// The closure is fully responsible for the protocol: it has to call
/// `on_subscribe` first, honor the demand it receives and send at most one
/// terminal signal. Wrap the subscriber in a `StrictSubscriber` while
/// developing one.
///
/// # Example
///
/// ```
/// use rxstreams::prelude::*;
/// use std::sync::Arc;
///
/// let source = create(|mut subscriber: BoxSubscriber<i32, ()>| {
///   subscriber.on_subscribe(Arc::new(EmptySubscription));
///   subscriber.on_complete();
/// });
/// source.subscribe_next(|_| unreachable!());
/// ```
pub fn create<T, E, F>(subscribe: F) -> Create<F, T, E>
where
  F: Fn(BoxSubscriber<T, E>),
{
  Create { func: Arc::new(subscribe), _p: PhantomData }
}

pub struct Create<F, T, E> {
  func: Arc<F>,
  _p: PhantomData<fn(T, E)>,
}

impl<F, T, E> Clone for Create<F, T, E> {
  fn clone(&self) -> Self { Create { func: self.func.clone(), _p: PhantomData } }
}

impl<F, T, E> Publisher for Create<F, T, E>
where
  F: Fn(BoxSubscriber<T, E>),
  T: 'static,
  E: 'static,
{
  type Item = T;
  type Err = E;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T, E> + 'static,
  {
    tracing::trace!("create: handing subscriber to closure");
    (self.func)(Box::new(subscriber))
  }
}
