//! Protocol violations.
//!
//! Domain failures travel through the generic `Err` type of a publisher and
//! reach the caller only through `on_error`. The types here cover the other
//! kind of failure: a participant breaking the publisher/subscriber contract.
//! Those are programmer errors, so they are reported loudly instead of being
//! folded into the stream.

use thiserror::Error;

/// A broken rule of the publisher/subscriber/subscription contract.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
  /// `request(0)` was called; demand must be strictly positive.
  #[error("request(n) requires n > 0")]
  NonPositiveRequest,

  /// A subscriber received `on_subscribe` more than once.
  #[error("on_subscribe delivered twice to the same subscriber")]
  DuplicateSubscribe,

  /// A signal arrived after `on_error` or `on_complete`.
  #[error("{signal} delivered after a terminal signal")]
  SignalAfterTerminal {
    /// Name of the offending signal.
    signal: &'static str,
  },

  /// More `on_next` signals arrived than demand was requested.
  #[error("on_next delivered without outstanding demand")]
  DemandExceeded,

  /// A signal other than `on_subscribe` arrived first.
  #[error("{signal} delivered before on_subscribe")]
  SignalBeforeSubscribe {
    /// Name of the offending signal.
    signal: &'static str,
  },
}

impl ProtocolViolation {
  /// Returns a short stable label (snake_case) for use in logs.
  pub fn as_label(&self) -> &'static str {
    match self {
      ProtocolViolation::NonPositiveRequest => "non_positive_request",
      ProtocolViolation::DuplicateSubscribe => "duplicate_subscribe",
      ProtocolViolation::SignalAfterTerminal { .. } => "signal_after_terminal",
      ProtocolViolation::DemandExceeded => "demand_exceeded",
      ProtocolViolation::SignalBeforeSubscribe { .. } => "signal_before_subscribe",
    }
  }
}

/// What to do when a [`ProtocolViolation`] is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationPolicy {
  /// Log the violation and panic.
  Panic,
  /// Log the violation, drop the offending call and keep going.
  Log,
}

impl Default for ViolationPolicy {
  fn default() -> Self {
    if cfg!(debug_assertions) {
      ViolationPolicy::Panic
    } else {
      ViolationPolicy::Log
    }
  }
}

/// Reports `violation` according to `policy`.
///
/// The offending call must be dropped by the caller when this returns.
pub fn report_violation(violation: ProtocolViolation, policy: ViolationPolicy) {
  tracing::error!(violation = violation.as_label(), "reactive streams protocol violation: {violation}");
  if policy == ViolationPolicy::Panic {
    panic!("reactive streams protocol violation: {violation}");
  }
}
