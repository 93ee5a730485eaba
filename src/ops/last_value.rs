use std::{
  future::Future,
  pin::Pin,
  task::{ready, Context, Poll},
};

use futures::channel::oneshot;
use pin_project_lite::pin_project;

use crate::{
  subscriber::Subscriber,
  subscription::{SubscriptionRef, UNBOUNDED},
};

pin_project! {
  /// Future returned by `last_value`: resolves once the stream terminates.
  ///
  /// A subscription that ends without a terminal signal (cancelled, or the
  /// source dropped its subscriber) resolves to `Ok(None)`.
  #[must_use = "futures do nothing unless you `.await` or poll them"]
  pub struct LastValue<T, E> {
    #[pin]
    rx: oneshot::Receiver<Result<Option<T>, E>>,
  }
}

impl<T, E> LastValue<T, E> {
  pub(crate) fn new() -> (Self, LastValueSubscriber<T, E>) {
    let (tx, rx) = oneshot::channel();
    (LastValue { rx }, LastValueSubscriber { tx: Some(tx), last: None })
  }
}

impl<T, E> Future for LastValue<T, E> {
  type Output = Result<Option<T>, E>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.project();
    match ready!(this.rx.poll(cx)) {
      Ok(result) => Poll::Ready(result),
      Err(oneshot::Canceled) => Poll::Ready(Ok(None)),
    }
  }
}

pub struct LastValueSubscriber<T, E> {
  tx: Option<oneshot::Sender<Result<Option<T>, E>>>,
  last: Option<T>,
}

impl<T: Send, E: Send> Subscriber<T, E> for LastValueSubscriber<T, E> {
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { subscription.request(UNBOUNDED) }

  fn on_next(&mut self, item: T) { self.last = Some(item) }

  fn on_error(&mut self, err: E) {
    if let Some(tx) = self.tx.take() {
      let _ = tx.send(Err(err));
    }
  }

  fn on_complete(&mut self) {
    if let Some(tx) = self.tx.take() {
      let _ = tx.send(Ok(self.last.take()));
    }
  }
}
