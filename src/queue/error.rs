//! Queue Errors

use thiserror::Error;

/// Why a queued task did not produce a value
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError<E> {
    /// The operation returned an error
    #[error("task failed: {0}")]
    Failed(E),

    /// The operation panicked; the worker caught it and kept running
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The queue stopped before the task ran
    #[error("task abandoned: queue stopped before it ran")]
    Abandoned,
}

impl<E> TaskError<E> {
    /// The operation's own error, if that is what this is
    pub fn into_failure(self) -> Option<E> {
        match self {
            TaskError::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// True when the task never ran because the queue stopped
    pub fn is_abandoned(&self) -> bool {
        matches!(self, TaskError::Abandoned)
    }
}

/// Errors from queue lifecycle operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue has already been stopped")]
    Stopped,
}
