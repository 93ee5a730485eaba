//! Correlation of asynchronous replies with the requests awaiting them.
//!
//! A caller registers interest and gets back a [`CorrelationId`] plus a
//! receiver; whoever produces the reply later completes the slot by id. Slots
//! live in a map, so completing or cancelling one is constant time no matter
//! how many are outstanding.

use std::{
  collections::HashMap,
  fmt,
  sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
  },
};

use futures::channel::oneshot;

use crate::subscription::lock;

/// Identifier of one pending result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(u64);

impl CorrelationId {
  pub fn as_u64(&self) -> u64 { self.0 }
}

impl fmt::Display for CorrelationId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

/// Table of results not delivered yet.
pub struct PendingResults<T, E> {
  next_id: AtomicU64,
  slots: Mutex<HashMap<CorrelationId, oneshot::Sender<Result<T, E>>>>,
}

impl<T, E> Default for PendingResults<T, E> {
  fn default() -> Self { PendingResults { next_id: AtomicU64::new(0), slots: Mutex::new(HashMap::new()) } }
}

impl<T, E> PendingResults<T, E> {
  pub fn new() -> Self { Self::default() }

  /// Opens a slot. The receiver resolves once [`PendingResults::complete`]
  /// is called with the returned id, or fails with `Canceled` if the slot is
  /// cancelled instead.
  pub fn register(&self) -> (CorrelationId, oneshot::Receiver<Result<T, E>>) {
    let id = CorrelationId(self.next_id.fetch_add(1, Ordering::Relaxed));
    let (tx, rx) = oneshot::channel();
    lock(&self.slots).insert(id, tx);
    tracing::trace!(%id, "pending result registered");
    (id, rx)
  }

  /// Delivers `result` to the slot `id`. Returns `false` when no such slot is
  /// pending; a receiver that was dropped meanwhile still counts as pending.
  pub fn complete(&self, id: CorrelationId, result: Result<T, E>) -> bool {
    let Some(tx) = lock(&self.slots).remove(&id) else {
      tracing::debug!(%id, "no pending result for id");
      return false;
    };
    if tx.send(result).is_err() {
      tracing::debug!(%id, "pending result completed after its receiver was dropped");
    }
    true
  }

  /// Drops the slot `id`; its receiver fails with `Canceled`.
  pub fn cancel(&self, id: CorrelationId) -> bool { lock(&self.slots).remove(&id).is_some() }

  pub fn len(&self) -> usize { lock(&self.slots).len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}
