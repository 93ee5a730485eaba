//! # rxstreams: backpressure-aware reactive streams
//!
//! A publisher produces values, a subscriber consumes them, and the
//! subscription between the two carries demand upstream and cancellation.
//! Nothing is emitted that was not requested.
//!
//! ## Quick Start
//!
//! ```rust
//! use rxstreams::prelude::*;
//!
//! from_iter::<_, ()>(0..10)
//!   .map(|v| v * 2)
//!   .take(3)
//!   .subscribe_next(|v| println!("Value: {}", v));
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Publisher`] | Source of values, subscribed any number of times |
//! | [`Subscriber`] | Receives `on_subscribe`, `on_next*`, then one terminal signal |
//! | [`Subscription`] | Carries `request(n)` and `cancel()` back upstream |
//! | [`Executor`] / [`Timer`] | Explicit scheduling handles for relocation and timed sources |
//!
//! ## Feature Flags
//!
//! - **`futures-scheduler`** (default): `futures::executor::ThreadPool` as an
//!   [`Executor`]
//! - **`tokio-scheduler`**: [`TokioScheduler`](scheduler::TokioScheduler),
//!   executor and timer on a tokio runtime
//!
//! [`Publisher`]: publisher::Publisher
//! [`Subscriber`]: subscriber::Subscriber
//! [`Subscription`]: subscription::Subscription
//! [`Executor`]: scheduler::Executor
//! [`Timer`]: scheduler::Timer
#[cfg(test)]
#[macro_use]
extern crate bencher;

pub mod error;
pub mod ops;
pub mod pending;
pub mod prelude;
pub mod publisher;
pub mod scheduler;
pub mod signal;
pub mod source;
pub mod subscriber;
pub mod subscription;
pub mod testing;

// Re-export the prelude module
pub use prelude::*;

#[cfg(doctest)]
mod __markdown_doctests {
  mod readme {
    #![doc = include_str!("../README.md")]
  }
}
