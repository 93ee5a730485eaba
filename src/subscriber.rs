//! Subscriber trait and implementations
//!
//! A subscriber is the four-callback sink of the protocol: one
//! `on_subscribe`, any number of `on_next` bounded by the demand it requested,
//! then at most one of `on_error` / `on_complete`.

use std::sync::{Arc, Mutex};

use crate::{
  error::{report_violation, ProtocolViolation, ViolationPolicy},
  subscription::{lock, Subscription, SubscriptionRef, UNBOUNDED},
};

/// The consumer side of the protocol.
///
/// All callbacks take `&mut self` so a subscriber can be boxed and moved
/// between threads by the relocation operators.
pub trait Subscriber<T, E>: Send {
  /// First signal of every subscription. Demand is expressed through
  /// `subscription`, which may be kept and used from any thread.
  fn on_subscribe(&mut self, subscription: SubscriptionRef);

  /// A value. Never called more often than the cumulative demand requested.
  fn on_next(&mut self, item: T);

  /// Terminal failure. Nothing follows.
  fn on_error(&mut self, err: E);

  /// Terminal success. Nothing follows.
  fn on_complete(&mut self);
}

/// Type-erased subscriber.
pub type BoxSubscriber<T, E> = Box<dyn Subscriber<T, E>>;

impl<T, E, S> Subscriber<T, E> for Box<S>
where
  S: Subscriber<T, E> + ?Sized,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { (**self).on_subscribe(subscription) }

  #[inline]
  fn on_next(&mut self, item: T) { (**self).on_next(item) }

  #[inline]
  fn on_error(&mut self, err: E) { (**self).on_error(err) }

  #[inline]
  fn on_complete(&mut self) { (**self).on_complete() }
}

// ============================================================================
// SubscribeHandle
// ============================================================================

#[derive(Default)]
struct HandleState {
  subscription: Option<SubscriptionRef>,
  cancelled: bool,
}

/// Handle returned by the `subscribe_*` helpers. Cancelling it before the
/// subscription arrives cancels the subscription as soon as it does.
#[derive(Clone, Default)]
pub struct SubscribeHandle(Arc<Mutex<HandleState>>);

impl SubscribeHandle {
  pub fn cancel(&self) {
    let subscription = {
      let mut state = lock(&self.0);
      state.cancelled = true;
      state.subscription.take()
    };
    if let Some(s) = subscription {
      s.cancel();
    }
  }

  pub fn is_cancelled(&self) -> bool { lock(&self.0).cancelled }

  /// Activates "RAII" behavior for this handle: the subscription is
  /// cancelled as soon as the returned guard goes out of scope.
  pub fn cancel_when_dropped(self) -> SubscriptionGuard { SubscriptionGuard(self) }

  /// Records `subscription`. Returns it back when it must still be used, or
  /// `None` if the handle was already cancelled (the subscription is then
  /// cancelled here).
  fn attach(&self, subscription: SubscriptionRef) -> Option<SubscriptionRef> {
    let mut state = lock(&self.0);
    if state.cancelled {
      drop(state);
      subscription.cancel();
      None
    } else {
      state.subscription = Some(subscription.clone());
      Some(subscription)
    }
  }

  fn release(&self) { lock(&self.0).subscription = None; }
}

/// Cancels the wrapped subscription when dropped.
#[must_use]
pub struct SubscriptionGuard(SubscribeHandle);

impl Drop for SubscriptionGuard {
  #[inline]
  fn drop(&mut self) { self.0.cancel() }
}

// ============================================================================
// LambdaSubscriber
// ============================================================================

/// Closure-backed subscriber. Requests unbounded demand on subscribe.
pub struct LambdaSubscriber<N, Er, C> {
  next: N,
  error: Er,
  complete: C,
  handle: SubscribeHandle,
  done: bool,
}

impl<N, Er, C> LambdaSubscriber<N, Er, C> {
  pub fn new(next: N, error: Er, complete: C) -> Self {
    LambdaSubscriber { next, error, complete, handle: SubscribeHandle::default(), done: false }
  }

  pub fn handle(&self) -> SubscribeHandle { self.handle.clone() }
}

impl<T, E, N, Er, C> Subscriber<T, E> for LambdaSubscriber<N, Er, C>
where
  N: FnMut(T) + Send,
  Er: FnMut(E) + Send,
  C: FnMut() + Send,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    if let Some(s) = self.handle.attach(subscription) {
      s.request(UNBOUNDED);
    }
  }

  fn on_next(&mut self, item: T) {
    if !self.done {
      (self.next)(item);
    }
  }

  fn on_error(&mut self, err: E) {
    if !self.done {
      self.done = true;
      self.handle.release();
      (self.error)(err);
    }
  }

  fn on_complete(&mut self) {
    if !self.done {
      self.done = true;
      self.handle.release();
      (self.complete)();
    }
  }
}

// ============================================================================
// StrictSubscriber
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
  Unsubscribed,
  Subscribed,
  Terminated,
}

/// Enforces the `Unsubscribed -> Subscribed -> Terminated` machine in front of
/// another subscriber. Offending signals are reported and never forwarded.
pub struct StrictSubscriber<S> {
  inner: S,
  phase: Phase,
  policy: ViolationPolicy,
}

impl<S> StrictSubscriber<S> {
  pub fn new(inner: S) -> Self { Self::with_policy(inner, ViolationPolicy::default()) }

  pub fn with_policy(inner: S, policy: ViolationPolicy) -> Self {
    StrictSubscriber { inner, phase: Phase::Unsubscribed, policy }
  }

  pub fn into_inner(self) -> S { self.inner }

  fn admit(&mut self, signal: &'static str) -> bool {
    match self.phase {
      Phase::Subscribed => true,
      Phase::Unsubscribed => {
        report_violation(ProtocolViolation::SignalBeforeSubscribe { signal }, self.policy);
        false
      }
      Phase::Terminated => {
        report_violation(ProtocolViolation::SignalAfterTerminal { signal }, self.policy);
        false
      }
    }
  }
}

impl<T, E, S> Subscriber<T, E> for StrictSubscriber<S>
where
  S: Subscriber<T, E>,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    if self.phase == Phase::Unsubscribed {
      self.phase = Phase::Subscribed;
      self.inner.on_subscribe(subscription);
    } else {
      // A second subscription must not stay alive.
      subscription.cancel();
      report_violation(ProtocolViolation::DuplicateSubscribe, self.policy);
    }
  }

  fn on_next(&mut self, item: T) {
    if self.admit("on_next") {
      self.inner.on_next(item);
    }
  }

  fn on_error(&mut self, err: E) {
    if self.admit("on_error") {
      self.phase = Phase::Terminated;
      self.inner.on_error(err);
    }
  }

  fn on_complete(&mut self) {
    if self.admit("on_complete") {
      self.phase = Phase::Terminated;
      self.inner.on_complete();
    }
  }
}
