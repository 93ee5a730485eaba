//! Sources producing at most one value, possibly later and from another
//! thread.

use std::{marker::PhantomData, sync::Arc};

use crate::{
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::deferred::{DeferredSubscription, Outcome},
};

/// Adapts a "call me back with a value or a failure" API.
///
/// `f` runs once per subscription and receives a [`Completer`]. A value
/// becomes one `on_next` followed by `on_complete`, and waits for demand; a
/// failure becomes `on_error` right away. A completer dropped without being
/// used completes the stream empty.
///
/// # Example
///
/// ```
/// use rxstreams::prelude::*;
/// use std::thread;
///
/// let answer = from_callback(|completer: Completer<u32, String>| {
///   thread::spawn(move || completer.succeed(42));
/// });
/// assert_eq!(futures::executor::block_on(answer.last_value()), Ok(Some(42)));
/// ```
pub fn from_callback<T, E, F>(f: F) -> FromCallback<F, T, E>
where
  T: Send + 'static,
  E: Send + 'static,
  F: Fn(Completer<T, E>),
{
  FromCallback { func: Arc::new(f), _p: PhantomData }
}

/// Emits a clone of `value` to every subscriber.
pub fn just<T: Clone, E>(value: T) -> Just<T, E> { Just { value, _p: PhantomData } }

/// Calls `f` on every subscription and emits its result.
pub fn from_supplier<T, E, F>(f: F) -> FromSupplier<F, E>
where
  F: Fn() -> T,
{
  FromSupplier { func: Arc::new(f), _p: PhantomData }
}

/// One-shot result slot handed to the callback of [`from_callback`].
pub struct Completer<T: Send + 'static, E: Send + 'static> {
  core: Option<Arc<DeferredSubscription<T, E>>>,
}

impl<T: Send + 'static, E: Send + 'static> Completer<T, E> {
  pub fn succeed(mut self, value: T) { self.resolve(Outcome::Value(value)) }

  pub fn fail(mut self, err: E) { self.resolve(Outcome::Error(err)) }

  /// Completes without a value.
  pub fn complete(mut self) { self.resolve(Outcome::Empty) }

  fn resolve(&mut self, outcome: Outcome<T, E>) {
    if let Some(core) = self.core.take() {
      core.resolve(outcome);
    }
  }
}

impl<T: Send + 'static, E: Send + 'static> Drop for Completer<T, E> {
  fn drop(&mut self) {
    if self.core.is_some() {
      tracing::debug!("completer dropped unused, completing empty");
      self.resolve(Outcome::Empty);
    }
  }
}

pub struct FromCallback<F, T, E> {
  func: Arc<F>,
  _p: PhantomData<fn(T, E)>,
}

impl<F, T, E> Clone for FromCallback<F, T, E> {
  fn clone(&self) -> Self { FromCallback { func: self.func.clone(), _p: PhantomData } }
}

impl<F, T, E> Publisher for FromCallback<F, T, E>
where
  F: Fn(Completer<T, E>),
  T: Send + 'static,
  E: Send + 'static,
{
  type Item = T;
  type Err = E;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T, E> + 'static,
  {
    let core = DeferredSubscription::start(subscriber);
    (self.func)(Completer { core: Some(core) })
  }
}

#[derive(Clone)]
pub struct Just<T, E> {
  value: T,
  _p: PhantomData<fn() -> E>,
}

impl<T, E> Publisher for Just<T, E>
where
  T: Clone + Send + 'static,
  E: Send + 'static,
{
  type Item = T;
  type Err = E;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T, E> + 'static,
  {
    DeferredSubscription::start(subscriber).resolve(Outcome::Value(self.value.clone()));
  }
}

pub struct FromSupplier<F, E> {
  func: Arc<F>,
  _p: PhantomData<fn() -> E>,
}

impl<F, E> Clone for FromSupplier<F, E> {
  fn clone(&self) -> Self { FromSupplier { func: self.func.clone(), _p: PhantomData } }
}

impl<F, T, E> Publisher for FromSupplier<F, E>
where
  F: Fn() -> T,
  T: Send + 'static,
  E: Send + 'static,
{
  type Item = T;
  type Err = E;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T, E> + 'static,
  {
    let core = DeferredSubscription::start(subscriber);
    core.resolve(Outcome::Value((self.func)()));
  }
}

#[cfg(test)]
mod test {
  use crate::{prelude::*, testing::*};
  use std::{
    sync::{
      atomic::{AtomicUsize, Ordering},
      Arc, Mutex,
    },
    thread,
    time::Duration,
  };

  #[test]
  fn value_then_complete() {
    let probe = TestSubscriber::<&str, ()>::unbounded();
    from_callback(|c: Completer<&str, ()>| c.succeed("hello")).subscribe(probe.clone());
    assert_eq!(probe.values(), vec!["hello"]);
    assert!(probe.is_completed());
  }

  #[test]
  fn failure_is_a_single_error() {
    let probe = TestSubscriber::<i32, String>::new(0);
    from_callback(|c: Completer<i32, String>| c.fail("timeout".to_owned())).subscribe(probe.clone());
    assert_eq!(probe.error(), Some("timeout".to_owned()));
    assert!(probe.values().is_empty());
  }

  #[test]
  fn value_from_another_thread_waits_for_demand() {
    let probe = TestSubscriber::<u32, ()>::new(0);
    let slot = Arc::new(Mutex::new(None));
    let c_slot = slot.clone();
    from_callback(move |c: Completer<u32, ()>| *c_slot.lock().unwrap() = Some(c)).subscribe(probe.clone());

    let completer = slot.lock().unwrap().take().unwrap();
    thread::spawn(move || completer.succeed(7)).join().unwrap();
    assert!(!probe.is_terminated());
    probe.request(1);
    assert!(probe.await_terminal(Duration::from_secs(1)));
    assert_eq!(probe.values(), vec![7]);
  }

  #[test]
  fn dropped_completer_completes_empty() {
    let probe = TestSubscriber::<i32, ()>::unbounded();
    from_callback(|_c: Completer<i32, ()>| {}).subscribe(probe.clone());
    assert!(probe.is_completed());
    assert!(probe.values().is_empty());
  }

  #[test]
  fn just_replays_for_every_subscriber() {
    let source = just::<_, ()>(5);
    for _ in 0..2 {
      let probe = TestSubscriber::unbounded();
      source.subscribe(probe.clone());
      assert_eq!(probe.values(), vec![5]);
      assert!(probe.is_completed());
    }
  }

  #[test]
  fn supplier_runs_per_subscription() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c_calls = calls.clone();
    let source = from_supplier::<_, (), _>(move || c_calls.fetch_add(1, Ordering::SeqCst));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let a = TestSubscriber::unbounded();
    let b = TestSubscriber::unbounded();
    source.subscribe(a.clone());
    source.subscribe(b.clone());
    assert_eq!(a.values(), vec![0]);
    assert_eq!(b.values(), vec![1]);
  }
}
