//! Error types for queue operations and request outcomes

use thiserror::Error;

/// Errors returned synchronously by scheduler operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error(
        "Number of tasks ({tasks}) must match the number of completions ({completions}) and tags ({tags})"
    )]
    InvalidArgument {
        tags: usize,
        tasks: usize,
        completions: usize,
    },
}

/// Failure reported to a request's completion handler
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Request failed: {0}")]
    Failed(String),

    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Request task panicked: {0}")]
    Panicked(String),

    #[error("No async runtime available to run the request")]
    NoRuntime,

    /// The running task was dropped before it produced a result
    #[error("Request was dropped before it completed")]
    Aborted,
}

impl TaskError {
    /// Wrap a transport-level error (HTTP client, decoding, ...)
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        TaskError::Transport(Box::new(err))
    }

    /// Check if the task panicked instead of returning
    pub fn is_panic(&self) -> bool {
        matches!(self, TaskError::Panicked(_))
    }

    /// Build a `Panicked` error from a caught panic payload
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        TaskError::Panicked(message)
    }
}

/// Outcome of a single request
pub type TaskResult<T> = Result<T, TaskError>;
