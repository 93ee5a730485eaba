//! Subscription for sources that deliver at most one value, whenever it
//! becomes available.
//!
//! The value and the demand for it arrive independently and possibly on
//! different threads: a callback completes after the subscriber requested, or
//! a fold finishes before anybody asked. Emission happens on whichever side
//! arrives last. Errors do not need demand.

use std::sync::{Arc, Mutex};

use crate::{
  error::{report_violation, ProtocolViolation, ViolationPolicy},
  subscriber::{BoxSubscriber, Subscriber},
  subscription::{lock, Demand, Drain, Lifecycle, Subscription, SubscriptionRef, UNBOUNDED},
};

/// How a deferred subscription ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
  /// One value followed by completion.
  Value(T),
  /// Completion without a value.
  Empty,
  Error(E),
}

pub struct DeferredSubscription<T, E> {
  demand: Demand,
  life: Lifecycle,
  drain: Drain,
  subscriber: Mutex<Option<BoxSubscriber<T, E>>>,
  outcome: Mutex<Option<Outcome<T, E>>>,
  upstream: Mutex<Option<SubscriptionRef>>,
}

impl<T: Send + 'static, E: Send + 'static> DeferredSubscription<T, E> {
  /// Hands a new deferred subscription to `subscriber`.
  pub fn start<S>(subscriber: S) -> Arc<Self>
  where
    S: Subscriber<T, E> + 'static,
  {
    let core = Arc::new(DeferredSubscription {
      demand: Demand::new(),
      life: Lifecycle::new(),
      drain: Drain::owned(),
      subscriber: Mutex::new(None),
      outcome: Mutex::new(None),
      upstream: Mutex::new(None),
    });
    let mut subscriber: BoxSubscriber<T, E> = Box::new(subscriber);
    subscriber.on_subscribe(core.clone());
    *lock(&core.subscriber) = Some(subscriber);
    core.drain_loop();
    core
  }

  /// Records how the subscription ends. Only the first outcome counts;
  /// returns whether this one was accepted.
  pub fn resolve(&self, outcome: Outcome<T, E>) -> bool {
    {
      let mut slot = lock(&self.outcome);
      if slot.is_some() || !self.life.is_active() {
        return false;
      }
      *slot = Some(outcome);
    }
    self.drain();
    true
  }

  /// Links the subscription whose result feeds this one, so that cancelling
  /// here cancels there too.
  pub fn set_upstream(&self, upstream: SubscriptionRef) {
    if self.life.is_active() {
      *lock(&self.upstream) = Some(upstream);
    } else {
      upstream.cancel();
    }
  }

  fn drain(&self) {
    if self.drain.enter() {
      self.drain_loop();
    }
  }

  fn drain_loop(&self) {
    let mut missed = 1;
    loop {
      self.pass();
      missed = self.drain.leave(missed);
      if missed == 0 {
        break;
      }
    }
  }

  fn pass(&self) {
    let mut slot = lock(&self.subscriber);
    let Some(subscriber) = slot.as_mut() else { return };
    if !self.life.is_active() {
      self.life.terminate();
      *slot = None;
      return;
    }
    let outcome = {
      let mut outcome = lock(&self.outcome);
      let ready = match &*outcome {
        None => false,
        Some(Outcome::Value(_)) => self.demand.get() > 0,
        Some(_) => true,
      };
      if !ready {
        return;
      }
      outcome.take()
    };
    if let Some(outcome) = outcome {
      if self.life.terminate() {
        match outcome {
          Outcome::Value(v) => {
            subscriber.on_next(v);
            subscriber.on_complete();
          }
          Outcome::Empty => subscriber.on_complete(),
          Outcome::Error(e) => subscriber.on_error(e),
        }
      }
    }
    *slot = None;
    lock(&self.upstream).take();
  }
}

impl<T: Send + 'static, E: Send + 'static> Subscription for DeferredSubscription<T, E> {
  fn request(&self, n: u64) {
    if n == 0 {
      report_violation(ProtocolViolation::NonPositiveRequest, ViolationPolicy::default());
      return;
    }
    self.demand.add(n);
    self.drain();
  }

  fn cancel(&self) {
    if self.life.request_cancel() {
      tracing::trace!("deferred subscription cancelled");
      if let Some(upstream) = lock(&self.upstream).take() {
        upstream.cancel();
      }
      self.drain();
    }
  }
}

/// Subscriber that feeds the last value (or the failure) of an upstream into
/// a [`DeferredSubscription`]. Requests unbounded demand from upstream.
pub struct DeferredSink<T, E> {
  core: Arc<DeferredSubscription<T, E>>,
  last: Option<T>,
}

impl<T, E> DeferredSink<T, E> {
  pub fn new(core: Arc<DeferredSubscription<T, E>>) -> Self { DeferredSink { core, last: None } }
}

impl<T: Send + 'static, E: Send + 'static> Subscriber<T, E> for DeferredSink<T, E> {
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.core.set_upstream(subscription.clone());
    subscription.request(UNBOUNDED);
  }

  fn on_next(&mut self, item: T) { self.last = Some(item); }

  fn on_error(&mut self, err: E) { self.core.resolve(Outcome::Error(err)); }

  fn on_complete(&mut self) {
    let outcome = match self.last.take() {
      Some(v) => Outcome::Value(v),
      None => Outcome::Empty,
    };
    self.core.resolve(outcome);
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::testing::TestSubscriber;

  #[test]
  fn value_waits_for_demand() {
    let probe = TestSubscriber::<i32, ()>::new(0);
    let core = DeferredSubscription::start(probe.clone());
    assert!(core.resolve(Outcome::Value(7)));
    assert!(probe.values().is_empty());
    probe.request(1);
    assert_eq!(probe.values(), vec![7]);
    assert!(probe.is_completed());
  }

  #[test]
  fn demand_before_value() {
    let probe = TestSubscriber::<i32, ()>::new(3);
    let core = DeferredSubscription::start(probe.clone());
    assert!(!probe.is_terminated());
    core.resolve(Outcome::Value(1));
    assert!(!core.resolve(Outcome::Value(2)));
    assert_eq!(probe.values(), vec![1]);
    assert!(probe.violations().is_empty());
  }

  #[test]
  fn error_needs_no_demand() {
    let probe = TestSubscriber::<i32, &str>::new(0);
    let core = DeferredSubscription::start(probe.clone());
    core.resolve(Outcome::Error("down"));
    assert_eq!(probe.error(), Some("down"));
  }

  #[test]
  fn cancel_suppresses_outcome() {
    let probe = TestSubscriber::<i32, ()>::new(1);
    let core = DeferredSubscription::start(probe.clone());
    probe.cancel();
    probe.cancel();
    assert!(!core.resolve(Outcome::Value(1)));
    assert_eq!(probe.signals().len(), 1);
  }
}
