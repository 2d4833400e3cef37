//! Future resolving to the outcome of a spawned call chain.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::sync::oneshot;

use super::CallError;

/// Handle to a call chain running on the executor's worker pool.
///
/// Await it to obtain the chain's single terminal outcome. Dropping the
/// handle does not cancel the chain; its result is simply discarded.
#[derive(Debug)]
pub struct CallHandle<T> {
    rx: oneshot::Receiver<Result<T, CallError>>,
}

impl<T> CallHandle<T> {
    pub(crate) fn channel() -> (oneshot::Sender<Result<T, CallError>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }
}

impl<T> Future for CallHandle<T> {
    type Output = Result<T, CallError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // The sender only disappears without a value when the executor shut down.
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(CallError::Shutdown)))
    }
}
