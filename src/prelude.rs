//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

// Errors and configuration
pub use crate::error::{ProtocolViolation, ViolationPolicy};
// Correlation registry
pub use crate::pending::{CorrelationId, PendingResults};
// Core traits
pub use crate::publisher::{BoxPublisher, Publisher, PublisherExt};
// Schedulers
#[cfg(feature = "tokio-scheduler")]
pub use crate::scheduler::TokioScheduler;
pub use crate::scheduler::{Executor, TestScheduler, Timer, TimerHandle};
pub use crate::signal::Signal;
// Sources
pub use crate::source::{
  create, from_callback, from_future, from_iter, from_supplier, generate, interval, interval_with, just,
  try_from_iter, Completer, CursorConfig, RefillPolicy,
};
// Subscriber
pub use crate::subscriber::{BoxSubscriber, LambdaSubscriber, StrictSubscriber, SubscribeHandle, Subscriber};
// Subscription
pub use crate::subscription::{Demand, EmptySubscription, Subscription, SubscriptionRef, UNBOUNDED};
