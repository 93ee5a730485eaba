//! The delegating subscriber every operator is built from.
//!
//! A [`DelegateSubscriber`] sits between an upstream publisher and a
//! downstream subscriber. By default it forwards every signal unchanged; an
//! operator supplies a [`Delegate`] that overrides the callbacks it cares
//! about. The [`Link`] passed to each callback owns the downstream subscriber
//! and the upstream subscription and guarantees the terminal-once rule: once a
//! delegate (or upstream) has terminated the link, nothing else reaches the
//! downstream subscriber.

use std::marker::PhantomData;

use crate::{
  error::{report_violation, ProtocolViolation, ViolationPolicy},
  subscriber::Subscriber,
  subscription::SubscriptionRef,
};

/// Downstream half of an operator node.
pub struct Link<D, O, E> {
  downstream: D,
  upstream: Option<SubscriptionRef>,
  done: bool,
  _p: PhantomData<fn(O, E)>,
}

impl<D, O, E> Link<D, O, E>
where
  D: Subscriber<O, E>,
{
  fn new(downstream: D) -> Self { Link { downstream, upstream: None, done: false, _p: PhantomData } }

  #[inline]
  pub fn is_done(&self) -> bool { self.done }

  /// The subscription granted by upstream, until the link terminates.
  pub fn upstream(&self) -> Option<&SubscriptionRef> { self.upstream.as_ref() }

  pub fn subscribe(&mut self, subscription: SubscriptionRef) { self.downstream.on_subscribe(subscription) }

  pub fn next(&mut self, item: O) {
    if !self.done {
      self.downstream.on_next(item);
    }
  }

  pub fn error(&mut self, err: E) {
    if !self.done {
      self.done = true;
      self.upstream = None;
      self.downstream.on_error(err);
    }
  }

  pub fn complete(&mut self) {
    if !self.done {
      self.done = true;
      self.upstream = None;
      self.downstream.on_complete();
    }
  }

  /// Cancels upstream. Signals upstream still sends afterwards are dropped
  /// once the link is terminated.
  pub fn cancel_upstream(&mut self) {
    if let Some(upstream) = self.upstream.take() {
      upstream.cancel();
    }
  }
}

/// Operator behavior plugged into a [`DelegateSubscriber`].
///
/// Only `on_next` is required; the other callbacks forward by default.
pub trait Delegate<T, E>: Send {
  type Out;

  fn on_subscribe<D>(&mut self, subscription: SubscriptionRef, link: &mut Link<D, Self::Out, E>)
  where
    D: Subscriber<Self::Out, E>,
  {
    link.subscribe(subscription);
  }

  fn on_next<D>(&mut self, item: T, link: &mut Link<D, Self::Out, E>)
  where
    D: Subscriber<Self::Out, E>;

  fn on_error<D>(&mut self, err: E, link: &mut Link<D, Self::Out, E>)
  where
    D: Subscriber<Self::Out, E>,
  {
    link.error(err);
  }

  fn on_complete<D>(&mut self, link: &mut Link<D, Self::Out, E>)
  where
    D: Subscriber<Self::Out, E>,
  {
    link.complete();
  }
}

/// Identity delegate: forwards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Forward;

impl<T, E> Delegate<T, E> for Forward {
  type Out = T;

  #[inline]
  fn on_next<D>(&mut self, item: T, link: &mut Link<D, T, E>)
  where
    D: Subscriber<T, E>,
  {
    link.next(item);
  }
}

/// Subscriber that runs a [`Delegate`] in front of `downstream`.
pub struct DelegateSubscriber<H, D, O, E> {
  delegate: H,
  link: Link<D, O, E>,
}

impl<H, D, O, E> DelegateSubscriber<H, D, O, E>
where
  D: Subscriber<O, E>,
{
  pub fn new(delegate: H, downstream: D) -> Self {
    DelegateSubscriber { delegate, link: Link::new(downstream) }
  }
}

impl<T, E, O, H, D> Subscriber<T, E> for DelegateSubscriber<H, D, O, E>
where
  H: Delegate<T, E, Out = O>,
  D: Subscriber<O, E>,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    if self.link.upstream.is_some() || self.link.done {
      subscription.cancel();
      report_violation(ProtocolViolation::DuplicateSubscribe, ViolationPolicy::default());
      return;
    }
    self.link.upstream = Some(subscription.clone());
    self.delegate.on_subscribe(subscription, &mut self.link);
  }

  fn on_next(&mut self, item: T) {
    if self.link.done {
      tracing::trace!("dropping on_next after the operator terminated");
      return;
    }
    self.delegate.on_next(item, &mut self.link);
  }

  fn on_error(&mut self, err: E) {
    if !self.link.done {
      self.delegate.on_error(err, &mut self.link);
    }
  }

  fn on_complete(&mut self) {
    if !self.link.done {
      self.delegate.on_complete(&mut self.link);
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::testing::{RecordingSubscription, TestSubscriber};
  use std::sync::Arc;

  #[test]
  fn forwards_by_default() {
    let probe = TestSubscriber::<i32, &str>::unbounded();
    let mut sub = DelegateSubscriber::new(Forward, probe.clone());
    let upstream = RecordingSubscription::default();
    sub.on_subscribe(Arc::new(upstream.clone()));
    sub.on_next(1);
    sub.on_next(2);
    sub.on_error("boom");
    sub.on_next(3);
    assert_eq!(probe.values(), vec![1, 2]);
    assert_eq!(probe.error(), Some("boom"));
    assert_eq!(upstream.request_calls(), vec![crate::subscription::UNBOUNDED]);
    assert!(probe.violations().is_empty());
  }

  #[test]
  fn terminal_is_forwarded_once() {
    let probe = TestSubscriber::<i32, ()>::unbounded();
    let mut sub = DelegateSubscriber::new(Forward, probe.clone());
    sub.on_subscribe(Arc::new(RecordingSubscription::default()));
    sub.on_complete();
    sub.on_complete();
    sub.on_error(());
    assert!(probe.is_completed());
    assert!(probe.error().is_none());
    assert!(probe.violations().is_empty());
  }
}
