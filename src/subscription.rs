//! Subscription: the per-subscribe mediator between a producer and its
//! subscriber.
//!
//! A subscription is the only state the producing and the consuming side
//! share. The consumer writes demand (`request`) and may ask for cancellation
//! (`cancel`); the producer reads and decrements demand and checks the
//! lifecycle before every emission. Both are plain atomics, so a subscription
//! can be handed across threads freely.

use std::sync::{
  atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering},
  Arc, Mutex, MutexGuard, PoisonError,
};

pub mod deferred;

/// Demand value meaning "no limit". Absorbs every further addition and is
/// never decremented.
pub const UNBOUNDED: u64 = u64::MAX;

/// Handle through which a subscriber signals demand and cancellation.
pub trait Subscription: Send + Sync {
  /// Adds `n` to the outstanding demand. `n` must be positive.
  fn request(&self, n: u64);

  /// Asks the producer to stop. Idempotent and best-effort: an emission
  /// already in flight is not retracted.
  fn cancel(&self);
}

/// Shared, type-erased subscription handle as delivered by `on_subscribe`.
pub type SubscriptionRef = Arc<dyn Subscription>;

impl<T: Subscription + ?Sized> Subscription for Arc<T> {
  #[inline]
  fn request(&self, n: u64) { (**self).request(n) }

  #[inline]
  fn cancel(&self) { (**self).cancel() }
}

/// A subscription that ignores everything. Used by sources that complete or
/// fail before any demand matters.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptySubscription;

impl Subscription for EmptySubscription {
  fn request(&self, _n: u64) {}
  fn cancel(&self) {}
}

// ============================================================================
// Demand
// ============================================================================

/// Outstanding demand: accumulated with saturating addition, consumed one
/// item at a time.
#[derive(Debug, Default)]
pub struct Demand(AtomicU64);

impl Demand {
  pub fn new() -> Self { Self::default() }

  /// Adds `n`, saturating at [`UNBOUNDED`]. Returns the new value.
  pub fn add(&self, n: u64) -> u64 {
    let prev = self
      .0
      .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| Some(cur.saturating_add(n)))
      .unwrap_or_else(|cur| cur);
    prev.saturating_add(n)
  }

  /// Takes one unit of demand if any is outstanding.
  pub fn try_consume(&self) -> bool {
    self
      .0
      .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| match cur {
        0 => None,
        UNBOUNDED => Some(UNBOUNDED),
        n => Some(n - 1),
      })
      .is_ok()
  }

  #[inline]
  pub fn get(&self) -> u64 { self.0.load(Ordering::Acquire) }

  #[inline]
  pub fn is_unbounded(&self) -> bool { self.get() == UNBOUNDED }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Observable state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
  Active,
  CancelRequested,
  Terminated,
}

const ACTIVE: u8 = 0;
const CANCEL_REQUESTED: u8 = 1;
const TERMINATED: u8 = 2;

/// Atomic tri-state `Active -> CancelRequested -> Terminated`.
///
/// `Terminated` is absorbing, and a cancel request can no longer be made once
/// the subscription terminated.
#[derive(Debug, Default)]
pub struct Lifecycle(AtomicU8);

impl Lifecycle {
  pub fn new() -> Self { Self::default() }

  pub fn state(&self) -> State {
    match self.0.load(Ordering::Acquire) {
      ACTIVE => State::Active,
      CANCEL_REQUESTED => State::CancelRequested,
      _ => State::Terminated,
    }
  }

  #[inline]
  pub fn is_active(&self) -> bool { self.0.load(Ordering::Acquire) == ACTIVE }

  /// Returns `true` only for the call that moved the state out of `Active`.
  pub fn request_cancel(&self) -> bool {
    self.0.compare_exchange(ACTIVE, CANCEL_REQUESTED, Ordering::AcqRel, Ordering::Acquire).is_ok()
  }

  /// Moves to `Terminated`. Returns `true` for the first caller only, which is
  /// the one allowed to emit the terminal signal.
  pub fn terminate(&self) -> bool { self.0.swap(TERMINATED, Ordering::AcqRel) != TERMINATED }
}

// ============================================================================
// Drain
// ============================================================================

/// Work-in-progress counter that serializes emission.
///
/// Whoever moves the counter off zero owns emission and must keep draining
/// until [`Drain::leave`] returns zero. Everybody else only bumps the counter,
/// which makes re-entrant `request` calls (a subscriber requesting more from
/// inside `on_next`) and calls from other threads safe without holding a lock
/// across a callback.
#[derive(Debug, Default)]
pub struct Drain(AtomicUsize);

impl Drain {
  /// A drain that is already owned by the creator. Used by sources so that
  /// demand requested from inside `on_subscribe` is only recorded until the
  /// subscriber has been installed.
  pub fn owned() -> Self { Drain(AtomicUsize::new(1)) }

  /// Returns `true` if the caller now owns emission.
  #[inline]
  pub fn enter(&self) -> bool { self.0.fetch_add(1, Ordering::AcqRel) == 0 }

  /// Gives back `done` units of work, returning how many arrived meanwhile.
  #[inline]
  pub fn leave(&self, done: usize) -> usize { self.0.fetch_sub(done, Ordering::AcqRel) - done }
}

/// Locks `mutex`, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
