//! Request tasks and completion handlers

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::TaskResult;

/// A not-yet-started asynchronous request
///
/// The scheduler takes ownership of the task and runs it at most once. Any
/// `Send` future resolving to a [`TaskResult`] is a task, so an `async` block
/// wrapping an HTTP call can be enqueued directly.
#[async_trait]
pub trait RequestTask<T>: Send {
    /// Run the request to completion
    async fn run(self: Box<Self>) -> TaskResult<T>;
}

#[async_trait]
impl<T, F> RequestTask<T> for F
where
    F: Future<Output = TaskResult<T>> + Send + 'static,
    T: Send + 'static,
{
    async fn run(self: Box<Self>) -> TaskResult<T> {
        (*self).await
    }
}

/// Type-erased task as stored in the queue
pub type BoxedTask<T> = Box<dyn RequestTask<T>>;

/// Box a task, mainly for building the vectors passed to `enqueue_batch`
pub fn boxed<T>(task: impl RequestTask<T> + 'static) -> BoxedTask<T> {
    Box::new(task)
}

type Callback<T> = Box<dyn FnOnce(TaskResult<T>) + Send>;

/// Where the result of a request is delivered
pub enum Completion<T> {
    /// Invoke a closure with the result
    Callback(Callback<T>),

    /// Send the result over a oneshot channel
    Channel(oneshot::Sender<TaskResult<T>>),

    /// Drop the result
    Ignore,
}

impl<T> Completion<T> {
    /// Completion that calls `f` with the result
    pub fn callback(f: impl FnOnce(TaskResult<T>) + Send + 'static) -> Self {
        Completion::Callback(Box::new(f))
    }

    /// Completion backed by a oneshot channel
    ///
    /// If the request is cancelled before it starts, the receiver sees the
    /// sender dropped.
    pub fn channel() -> (Self, oneshot::Receiver<TaskResult<T>>) {
        let (tx, rx) = oneshot::channel();
        (Completion::Channel(tx), rx)
    }

    /// Completion that discards the result
    pub fn ignore() -> Self {
        Completion::Ignore
    }

    /// Deliver the result
    ///
    /// A panicking callback is logged and swallowed so the drain loop keeps going.
    pub(crate) fn deliver(self, tag: &str, result: TaskResult<T>) {
        match self {
            Completion::Callback(f) => {
                debug!(%tag, "Completion::deliver: invoking callback");
                if panic::catch_unwind(AssertUnwindSafe(move || f(result))).is_err() {
                    warn!(%tag, "Completion callback panicked");
                }
            }
            Completion::Channel(tx) => {
                debug!(%tag, "Completion::deliver: sending on channel");
                if tx.send(result).is_err() {
                    debug!(%tag, "Completion::deliver: receiver dropped");
                }
            }
            Completion::Ignore => {
                debug!(%tag, "Completion::deliver: ignored");
            }
        }
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Completion::Callback(_) => write!(f, "Completion::Callback"),
            Completion::Channel(_) => write!(f, "Completion::Channel"),
            Completion::Ignore => write!(f, "Completion::Ignore"),
        }
    }
}
