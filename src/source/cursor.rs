//! Pull-driven emission shared by every cursor-backed source.
//!
//! A cursor is created fresh for each subscription, which is what makes these
//! sources cold. The subscription owns the cursor and the subscriber and only
//! emits from inside its drain loop, so a subscriber calling `request` from
//! `on_next`, or from another thread, never recurses into the producer.

use std::sync::{
  atomic::{AtomicU64, Ordering},
  Arc, Mutex,
};

use crate::{
  error::{report_violation, ProtocolViolation, ViolationPolicy},
  subscriber::Subscriber,
  subscription::{lock, Demand, Drain, Lifecycle, Subscription, UNBOUNDED},
};

/// How much a cursor source emits per `request` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefillPolicy {
  /// Emit until outstanding demand is used up.
  #[default]
  Strict,
  /// Emit at most `max_per_request` items for every `request` call. Demand
  /// left over stays outstanding, and is served once the subscriber calls
  /// `request` again. Unbounded demand is not capped.
  Bounded { max_per_request: u64 },
}

/// Typed configuration of a cursor source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorConfig {
  pub refill: RefillPolicy,
  pub violations: ViolationPolicy,
}

/// What a cursor will produce next, found out without consuming it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookahead {
  Value,
  Error,
  End,
}

/// Per-subscription production state.
pub trait Cursor: Send {
  type Item;
  type Err;

  fn peek(&mut self) -> Lookahead;

  /// Produces the step announced by the last `peek`.
  fn pull(&mut self) -> Option<Result<Self::Item, Self::Err>>;
}

/// Cursor over an iterator of results.
pub struct IterCursor<I: Iterator>(std::iter::Peekable<I>);

impl<I: Iterator> IterCursor<I> {
  pub fn new(iter: I) -> Self { IterCursor(iter.peekable()) }
}

impl<I, T, E> Cursor for IterCursor<I>
where
  I: Iterator<Item = Result<T, E>> + Send,
  I::Item: Send,
{
  type Item = T;
  type Err = E;

  fn peek(&mut self) -> Lookahead {
    match self.0.peek() {
      Some(Ok(_)) => Lookahead::Value,
      Some(Err(_)) => Lookahead::Error,
      None => Lookahead::End,
    }
  }

  #[inline]
  fn pull(&mut self) -> Option<Result<T, E>> { self.0.next() }
}

struct Emitter<C, S> {
  cursor: C,
  subscriber: S,
}

pub(crate) struct CursorSubscription<C, S> {
  demand: Demand,
  life: Lifecycle,
  drain: Drain,
  /// Number of `request` calls not served yet, for `RefillPolicy::Bounded`.
  grants: AtomicU64,
  emitter: Mutex<Option<Emitter<C, S>>>,
  config: CursorConfig,
}

impl<C, S> CursorSubscription<C, S>
where
  C: Cursor + 'static,
  S: Subscriber<C::Item, C::Err> + 'static,
{
  /// Subscribes `subscriber` to a new subscription producing from `cursor`.
  pub(crate) fn start(cursor: C, mut subscriber: S, config: CursorConfig) {
    let subscription = Arc::new(CursorSubscription {
      demand: Demand::new(),
      life: Lifecycle::new(),
      drain: Drain::owned(),
      grants: AtomicU64::new(0),
      emitter: Mutex::new(None),
      config,
    });
    tracing::trace!("cursor subscription started");
    subscriber.on_subscribe(subscription.clone());
    *lock(&subscription.emitter) = Some(Emitter { cursor, subscriber });
    subscription.drain_loop();
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

  fn budget(&self) -> u64 {
    match self.config.refill {
      RefillPolicy::Strict => UNBOUNDED,
      RefillPolicy::Bounded { max_per_request } => {
        let grants = self.grants.swap(0, Ordering::AcqRel);
        // nobody re-requests after asking for everything
        if self.demand.is_unbounded() {
          UNBOUNDED
        } else {
          grants.saturating_mul(max_per_request.max(1))
        }
      }
    }
  }

  fn pass(&self) {
    let mut slot = lock(&self.emitter);
    let Some(emitter) = slot.as_mut() else { return };
    let mut budget = self.budget();
    loop {
      if !self.life.is_active() {
        tracing::trace!("cursor subscription cancelled");
        self.life.terminate();
        *slot = None;
        return;
      }
      match emitter.cursor.peek() {
        Lookahead::End => {
          if self.life.terminate() {
            emitter.subscriber.on_complete();
          }
          *slot = None;
          return;
        }
        Lookahead::Error => {
          if let Some(Err(err)) = emitter.cursor.pull() {
            if self.life.terminate() {
              emitter.subscriber.on_error(err);
            }
          }
          *slot = None;
          return;
        }
        Lookahead::Value => {
          if budget == 0 || !self.demand.try_consume() {
            return;
          }
          budget = budget.saturating_sub(1);
          if let Some(Ok(item)) = emitter.cursor.pull() {
            emitter.subscriber.on_next(item);
          }
        }
      }
    }
  }
}

impl<C, S> Subscription for CursorSubscription<C, S>
where
  C: Cursor + 'static,
  S: Subscriber<C::Item, C::Err> + 'static,
{
  fn request(&self, n: u64) {
    if n == 0 {
      report_violation(ProtocolViolation::NonPositiveRequest, self.config.violations);
      return;
    }
    tracing::trace!(n, "cursor request");
    self.demand.add(n);
    self.grants.fetch_add(1, Ordering::AcqRel);
    self.drain();
  }

  fn cancel(&self) {
    if self.life.request_cancel() {
      self.drain();
    }
  }
}
