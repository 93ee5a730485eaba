use std::sync::Arc;

use crate::{
  ops::delegate::{Delegate, DelegateSubscriber, Link},
  publisher::Publisher,
  subscriber::Subscriber,
};

/// Calls `func` with a reference to each value before forwarding it.
pub struct InspectOp<S, F> {
  pub(crate) source: S,
  pub(crate) func: Arc<F>,
}

pub struct InspectDelegate<F>(Arc<F>);

impl<T, E, F> Delegate<T, E> for InspectDelegate<F>
where
  F: Fn(&T) + Send + Sync,
{
  type Out = T;

  #[inline]
  fn on_next<D>(&mut self, item: T, link: &mut Link<D, T, E>)
  where
    D: Subscriber<T, E>,
  {
    (self.0)(&item);
    link.next(item);
  }
}

impl<S, F> Publisher for InspectOp<S, F>
where
  S: Publisher,
  S::Item: 'static,
  S::Err: 'static,
  F: Fn(&S::Item) + Send + Sync + 'static,
{
  type Item = S::Item;
  type Err = S::Err;

  fn subscribe<O>(&self, subscriber: O)
  where
    O: Subscriber<S::Item, S::Err> + 'static,
  {
    self.source.subscribe(DelegateSubscriber::new(InspectDelegate(self.func.clone()), subscriber))
  }
}

#[cfg(test)]
mod test {
  use crate::{prelude::*, testing::*};
  use std::sync::{Arc, Mutex};

  #[test]
  fn sees_every_value_in_order() {
    let seen = Arc::new(Mutex::new(vec![]));
    let c_seen = seen.clone();
    let probe = TestSubscriber::<i32, ()>::unbounded();
    from_iter(1..=3).inspect(move |v| c_seen.lock().unwrap().push(*v)).subscribe(probe.clone());
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    assert_eq!(probe.values(), vec![1, 2, 3]);
  }

  #[test]
  fn only_sees_requested_values() {
    let seen = Arc::new(Mutex::new(0));
    let c_seen = seen.clone();
    let probe = TestSubscriber::<i32, ()>::new(2);
    from_iter(1..=10).inspect(move |_| *c_seen.lock().unwrap() += 1).subscribe(probe.clone());
    assert_eq!(*seen.lock().unwrap(), 2);
  }
}
