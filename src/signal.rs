use std::fmt::{Debug, Formatter};

use crate::{subscriber::Subscriber, subscription::SubscriptionRef};

/// One protocol event travelling from a publisher to a subscriber.
///
/// Exactly one `Subscribe` starts the life of a subscription, at most one of
/// `Error` / `Complete` ends it.
pub enum Signal<T, E> {
  Subscribe(SubscriptionRef),
  Next(T),
  Error(E),
  Complete,
}

impl<T, E> Signal<T, E> {
  #[inline]
  pub fn is_terminal(&self) -> bool { matches!(self, Signal::Error(_) | Signal::Complete) }

  pub fn name(&self) -> &'static str {
    match self {
      Signal::Subscribe(_) => "on_subscribe",
      Signal::Next(_) => "on_next",
      Signal::Error(_) => "on_error",
      Signal::Complete => "on_complete",
    }
  }

  /// Delivers this signal to `subscriber`.
  pub fn dispatch<S>(self, subscriber: &mut S)
  where
    S: Subscriber<T, E> + ?Sized,
  {
    match self {
      Signal::Subscribe(s) => subscriber.on_subscribe(s),
      Signal::Next(v) => subscriber.on_next(v),
      Signal::Error(e) => subscriber.on_error(e),
      Signal::Complete => subscriber.on_complete(),
    }
  }
}

impl<T: Debug, E: Debug> Debug for Signal<T, E> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Signal::Subscribe(_) => f.write_str("Subscribe(..)"),
      Signal::Next(v) => f.debug_tuple("Next").field(v).finish(),
      Signal::Error(e) => f.debug_tuple("Error").field(e).finish(),
      Signal::Complete => f.write_str("Complete"),
    }
  }
}

impl<T: PartialEq, E: PartialEq> PartialEq for Signal<T, E> {
  /// Two `Subscribe` signals compare equal regardless of the handle.
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Signal::Subscribe(_), Signal::Subscribe(_)) => true,
      (Signal::Next(a), Signal::Next(b)) => a == b,
      (Signal::Error(a), Signal::Error(b)) => a == b,
      (Signal::Complete, Signal::Complete) => true,
      _ => false,
    }
  }
}
