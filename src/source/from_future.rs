use std::{future::Future, sync::Arc};

use futures::{
  future::{AbortHandle, Abortable},
  task::{Spawn, SpawnExt},
};

use crate::{
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::{
    deferred::{DeferredSubscription, Outcome},
    Subscription,
  },
};

/// Creates a publisher that runs a fresh future per subscription on
/// `spawner` and emits its result: `Ok` as one value, `Err` as the error.
///
/// Cancelling the subscription aborts the future. If the spawner refuses the
/// future, the stream completes empty.
///
/// # Example
///
/// ```
/// use rxstreams::prelude::*;
/// use futures::executor::{block_on, ThreadPool};
///
/// let pool = ThreadPool::new().unwrap();
/// let double = from_future(|| async { Ok::<_, ()>(21 * 2) }, pool);
/// assert_eq!(block_on(double.last_value()), Ok(Some(42)));
/// ```
pub fn from_future<Fac, Fut, T, E, Sp>(factory: Fac, spawner: Sp) -> FromFuture<Fac, Sp>
where
  Fac: Fn() -> Fut,
  Fut: Future<Output = Result<T, E>>,
  Sp: Spawn,
{
  FromFuture { factory: Arc::new(factory), spawner }
}

pub struct FromFuture<Fac, Sp> {
  factory: Arc<Fac>,
  spawner: Sp,
}

impl<Fac, Sp: Clone> Clone for FromFuture<Fac, Sp> {
  fn clone(&self) -> Self {
    FromFuture { factory: self.factory.clone(), spawner: self.spawner.clone() }
  }
}

struct AbortOnCancel(AbortHandle);

impl Subscription for AbortOnCancel {
  fn request(&self, _n: u64) {}

  fn cancel(&self) { self.0.abort() }
}

impl<Fac, Fut, T, E, Sp> Publisher for FromFuture<Fac, Sp>
where
  Fac: Fn() -> Fut,
  Fut: Future<Output = Result<T, E>> + Send + 'static,
  T: Send + 'static,
  E: Send + 'static,
  Sp: Spawn,
{
  type Item = T;
  type Err = E;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T, E> + 'static,
  {
    let core = DeferredSubscription::start(subscriber);
    let (abort, registration) = AbortHandle::new_pair();
    core.set_upstream(Arc::new(AbortOnCancel(abort)));

    let c_core = core.clone();
    let task = Abortable::new((self.factory)(), registration);
    let spawned = self.spawner.spawn(async move {
      match task.await {
        Ok(Ok(value)) => c_core.resolve(Outcome::Value(value)),
        Ok(Err(err)) => c_core.resolve(Outcome::Error(err)),
        Err(_aborted) => false,
      };
    });
    if let Err(err) = spawned {
      tracing::error!(%err, "future could not be spawned, completing empty");
      core.resolve(Outcome::Empty);
    }
  }
}
