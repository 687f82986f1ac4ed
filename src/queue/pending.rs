//! Pending Results
//!
//! Single-assignment handles connecting a submitter to the worker that runs
//! its task.

use crate::queue::error::TaskError;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

pin_project! {
    /// The eventual outcome of a submitted task
    ///
    /// Resolves exactly once: to the task's value, to its failure, or to
    /// [`TaskError::Abandoned`] if the queue stopped before running it.
    #[must_use = "a PendingResult does nothing unless awaited"]
    pub struct PendingResult<T, E> {
        #[pin]
        rx: oneshot::Receiver<Result<T, TaskError<E>>>,
    }
}

/// Write side of a [`PendingResult`]; consumed by the single resolution
pub(crate) struct Resolver<T, E> {
    tx: oneshot::Sender<Result<T, TaskError<E>>>,
}

pub(crate) fn channel<T, E>() -> (Resolver<T, E>, PendingResult<T, E>) {
    let (tx, rx) = oneshot::channel();
    (Resolver { tx }, PendingResult { rx })
}

impl<T, E> Resolver<T, E> {
    /// Deliver the outcome. A submitter that stopped waiting is not an error.
    pub(crate) fn resolve(self, outcome: Result<T, TaskError<E>>) {
        let _ = self.tx.send(outcome);
    }
}

impl<T, E> Future for PendingResult<T, E> {
    type Output = Result<T, TaskError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project().rx.poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // resolver dropped unresolved: the task never ran
            Poll::Ready(Err(_)) => Poll::Ready(Err(TaskError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}
