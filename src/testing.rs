//! Test harness for protocol conformance.
//!
//! [`TestSubscriber`] records every signal and checks the subscriber side of
//! the contract as it goes, [`RecordingSubscription`] records what a
//! subscriber asked of its upstream, and [`TestPublisher`] is a hot source
//! driven by hand. All three are cheap to clone: clones share state, so one
//! copy can be handed to the code under test and the other kept as a probe.

use std::{
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Condvar, Mutex,
  },
  time::Duration,
};

use crate::{
  error::ProtocolViolation,
  publisher::Publisher,
  signal::Signal,
  subscriber::{BoxSubscriber, Subscriber},
  subscription::{lock, Subscription, SubscriptionRef, UNBOUNDED},
};

// ============================================================================
// TestSubscriber
// ============================================================================

struct Record<T, E> {
  signals: Vec<Signal<T, E>>,
  subscription: Option<SubscriptionRef>,
  requested: u64,
  delivered: u64,
  violations: Vec<ProtocolViolation>,
  subscribed: bool,
  terminated: bool,
  threads: Vec<std::thread::ThreadId>,
}

struct Shared<T, E> {
  record: Mutex<Record<T, E>>,
  terminal: Condvar,
  initial: u64,
  replenish: Option<u64>,
}

/// Recording subscriber with a configurable demand strategy.
pub struct TestSubscriber<T, E>(Arc<Shared<T, E>>);

impl<T, E> Clone for TestSubscriber<T, E> {
  fn clone(&self) -> Self { TestSubscriber(self.0.clone()) }
}

impl<T, E> TestSubscriber<T, E> {
  fn build(initial: u64, replenish: Option<u64>) -> Self {
    TestSubscriber(Arc::new(Shared {
      record: Mutex::new(Record {
        signals: vec![],
        subscription: None,
        requested: 0,
        delivered: 0,
        violations: vec![],
        subscribed: false,
        terminated: false,
        threads: vec![],
      }),
      terminal: Condvar::new(),
      initial,
      replenish,
    }))
  }

  /// Requests `initial` items on subscribe (nothing when `0`), then waits for
  /// the test to call [`TestSubscriber::request`].
  pub fn new(initial: u64) -> Self { Self::build(initial, None) }

  /// Requests unbounded demand on subscribe.
  pub fn unbounded() -> Self { Self::new(UNBOUNDED) }

  /// Requests `batch` on subscribe and another `batch` each time the previous
  /// batch has been delivered.
  pub fn replenishing(batch: u64) -> Self { Self::build(batch, Some(batch)) }

  /// Requests `n` from the current subscription, if any.
  pub fn request(&self, n: u64) {
    let subscription = {
      let mut record = lock(&self.0.record);
      record.requested = record.requested.saturating_add(n);
      record.subscription.clone()
    };
    if let Some(s) = subscription {
      s.request(n);
    }
  }

  pub fn cancel(&self) {
    let subscription = lock(&self.0.record).subscription.clone();
    if let Some(s) = subscription {
      s.cancel();
    }
  }

  pub fn next_count(&self) -> u64 { lock(&self.0.record).delivered }

  pub fn requested(&self) -> u64 { lock(&self.0.record).requested }

  pub fn is_subscribed(&self) -> bool { lock(&self.0.record).subscribed }

  pub fn is_terminated(&self) -> bool { lock(&self.0.record).terminated }

  pub fn is_completed(&self) -> bool {
    lock(&self.0.record).signals.iter().any(|s| matches!(s, Signal::Complete))
  }

  pub fn violations(&self) -> Vec<ProtocolViolation> { lock(&self.0.record).violations.clone() }

  /// Distinct threads that delivered `on_next`, in order of first delivery.
  pub fn delivery_threads(&self) -> Vec<std::thread::ThreadId> {
    lock(&self.0.record).threads.clone()
  }

  /// Blocks until a terminal signal arrived or `timeout` elapsed. Returns
  /// whether the subscriber terminated.
  pub fn await_terminal(&self, timeout: Duration) -> bool {
    let record = lock(&self.0.record);
    let (record, _) = self
      .0
      .terminal
      .wait_timeout_while(record, timeout, |r| !r.terminated)
      .unwrap_or_else(std::sync::PoisonError::into_inner);
    record.terminated
  }

  /// Blocks until at least `n` values arrived or `timeout` elapsed.
  pub fn await_count(&self, n: u64, timeout: Duration) -> bool {
    let record = lock(&self.0.record);
    let (record, _) = self
      .0
      .terminal
      .wait_timeout_while(record, timeout, |r| r.delivered < n && !r.terminated)
      .unwrap_or_else(std::sync::PoisonError::into_inner);
    record.delivered >= n
  }

  fn violation(record: &mut Record<T, E>, violation: ProtocolViolation) {
    tracing::warn!(violation = violation.as_label(), "test subscriber observed a violation");
    record.violations.push(violation);
  }

  /// Checks the common preconditions of a non-subscribe signal.
  fn admit(record: &mut Record<T, E>, signal: &'static str) -> bool {
    if !record.subscribed {
      Self::violation(record, ProtocolViolation::SignalBeforeSubscribe { signal });
      false
    } else if record.terminated {
      Self::violation(record, ProtocolViolation::SignalAfterTerminal { signal });
      false
    } else {
      true
    }
  }
}

impl<T: Clone, E: Clone> TestSubscriber<T, E> {
  pub fn values(&self) -> Vec<T> {
    lock(&self.0.record)
      .signals
      .iter()
      .filter_map(|s| match s {
        Signal::Next(v) => Some(v.clone()),
        _ => None,
      })
      .collect()
  }

  pub fn error(&self) -> Option<E> {
    lock(&self.0.record).signals.iter().find_map(|s| match s {
      Signal::Error(e) => Some(e.clone()),
      _ => None,
    })
  }

  /// Every signal received so far, in order.
  pub fn signals(&self) -> Vec<Signal<T, E>> {
    lock(&self.0.record)
      .signals
      .iter()
      .map(|s| match s {
        Signal::Subscribe(s) => Signal::Subscribe(s.clone()),
        Signal::Next(v) => Signal::Next(v.clone()),
        Signal::Error(e) => Signal::Error(e.clone()),
        Signal::Complete => Signal::Complete,
      })
      .collect()
  }
}

impl<T: Send, E: Send> Subscriber<T, E> for TestSubscriber<T, E> {
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    let initial = {
      let mut record = lock(&self.0.record);
      if record.subscribed {
        Self::violation(&mut record, ProtocolViolation::DuplicateSubscribe);
        drop(record);
        subscription.cancel();
        return;
      }
      record.subscribed = true;
      record.subscription = Some(subscription.clone());
      record.signals.push(Signal::Subscribe(subscription.clone()));
      record.requested = self.0.initial;
      self.0.initial
    };
    if initial > 0 {
      subscription.request(initial);
    }
  }

  fn on_next(&mut self, item: T) {
    let refill = {
      let mut record = lock(&self.0.record);
      if !Self::admit(&mut record, "on_next") {
        return;
      }
      record.delivered += 1;
      if record.delivered > record.requested {
        Self::violation(&mut record, ProtocolViolation::DemandExceeded);
      }
      let thread = std::thread::current().id();
      if !record.threads.contains(&thread) {
        record.threads.push(thread);
      }
      record.signals.push(Signal::Next(item));
      self.0.terminal.notify_all();
      match self.0.replenish {
        Some(batch) if record.delivered == record.requested => {
          record.requested = record.requested.saturating_add(batch);
          record.subscription.clone().map(|s| (s, batch))
        }
        _ => None,
      }
    };
    if let Some((s, batch)) = refill {
      s.request(batch);
    }
  }

  fn on_error(&mut self, err: E) {
    let mut record = lock(&self.0.record);
    if Self::admit(&mut record, "on_error") {
      record.terminated = true;
      record.subscription = None;
      record.signals.push(Signal::Error(err));
      self.0.terminal.notify_all();
    }
  }

  fn on_complete(&mut self) {
    let mut record = lock(&self.0.record);
    if Self::admit(&mut record, "on_complete") {
      record.terminated = true;
      record.subscription = None;
      record.signals.push(Signal::Complete);
      self.0.terminal.notify_all();
    }
  }
}

// ============================================================================
// RecordingSubscription
// ============================================================================

#[derive(Default)]
struct Requests {
  calls: Mutex<Vec<u64>>,
  cancels: AtomicUsize,
}

/// Subscription that only records the calls made on it.
#[derive(Clone, Default)]
pub struct RecordingSubscription(Arc<Requests>);

impl RecordingSubscription {
  /// Sum of all requests, saturating.
  pub fn requested(&self) -> u64 {
    lock(&self.0.calls).iter().fold(0u64, |acc, n| acc.saturating_add(*n))
  }

  pub fn request_calls(&self) -> Vec<u64> { lock(&self.0.calls).clone() }

  pub fn cancels(&self) -> usize { self.0.cancels.load(Ordering::Acquire) }
}

impl Subscription for RecordingSubscription {
  fn request(&self, n: u64) { lock(&self.0.calls).push(n); }

  fn cancel(&self) { self.0.cancels.fetch_add(1, Ordering::AcqRel); }
}

// ============================================================================
// TestPublisher
// ============================================================================

/// Hot publisher driven by the test. Accepts a single subscriber, hands it a
/// [`RecordingSubscription`] and forwards whatever the test emits, demand or
/// not. Useful to provoke races an honest source never produces.
pub struct TestPublisher<T, E> {
  subscriber: Arc<Mutex<Option<BoxSubscriber<T, E>>>>,
  subscription: RecordingSubscription,
}

impl<T, E> Clone for TestPublisher<T, E> {
  fn clone(&self) -> Self {
    TestPublisher { subscriber: self.subscriber.clone(), subscription: self.subscription.clone() }
  }
}

impl<T, E> Default for TestPublisher<T, E> {
  fn default() -> Self {
    TestPublisher { subscriber: Arc::new(Mutex::new(None)), subscription: Default::default() }
  }
}

impl<T: 'static, E: 'static> TestPublisher<T, E> {
  pub fn new() -> Self { Self::default() }

  /// What the subscriber asked of this publisher.
  pub fn subscription(&self) -> RecordingSubscription { self.subscription.clone() }

  pub fn has_subscriber(&self) -> bool { lock(&self.subscriber).is_some() }

  fn with<R>(&self, f: impl FnOnce(&mut BoxSubscriber<T, E>) -> R) -> Option<R> {
    lock(&self.subscriber).as_mut().map(f)
  }

  pub fn next(&self, item: T) { self.with(|s| s.on_next(item)); }

  pub fn error(&self, err: E) { self.with(|s| s.on_error(err)); }

  pub fn complete(&self) { self.with(|s| s.on_complete()); }
}

impl<T: Send + 'static, E: Send + 'static> Publisher for TestPublisher<T, E> {
  type Item = T;
  type Err = E;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T, E> + 'static,
  {
    let mut subscriber: BoxSubscriber<T, E> = Box::new(subscriber);
    subscriber.on_subscribe(Arc::new(self.subscription.clone()));
    *lock(&self.subscriber) = Some(subscriber);
  }
}
