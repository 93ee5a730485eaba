//! Publishers that produce values rather than transform them.
//!
//! Every source here is cold: each `subscribe` starts its own production,
//! independent of any other subscription.

pub mod create;
pub mod cursor;
pub mod from_callback;
pub mod from_future;
pub mod from_iter;
pub mod generate;
pub mod interval;

pub use create::{create, Create};
pub use cursor::{CursorConfig, RefillPolicy};
pub use from_callback::{from_callback, from_supplier, just, Completer, FromCallback, FromSupplier, Just};
pub use from_future::{from_future, FromFuture};
pub use from_iter::{from_iter, try_from_iter, FromIter, TryFromIter};
pub use generate::{generate, Generate};
pub use interval::{interval, interval_with, Interval, IntervalWith};
