//! reqqueue - single-flight, priority-ordered request scheduler
//!
//! Queues asynchronous requests and runs them strictly one at a time,
//! lowest priority value first. The drain loop can be started, paused,
//! resumed and stopped from outside while requests are queued or running.
//!
//! # Core Concepts
//!
//! - **Single flight**: never more than one request of a scheduler in flight
//! - **Priority order**: lower priority runs first, ties in enqueue order
//! - **Self-driving**: each completion releases the next request
//! - **Explicit instances**: no global queue; hosts own their schedulers
//!
//! # Modules
//!
//! - [`scheduler`] - Scheduler, tasks, completions, listener and events
//! - [`config`] - Configuration types and loading
//! - [`logging`] - Tracing subscriber setup
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```no_run
//! use reqqueue::{Completion, Scheduler, SchedulerConfig, TaskError};
//!
//! # async fn demo() {
//! let scheduler: Scheduler<String> = Scheduler::new(SchedulerConfig::default());
//! scheduler.enqueue(
//!     "product 1",
//!     async { Ok::<_, TaskError>("first".to_string()) },
//!     Completion::callback(|result| println!("product 1: {:?}", result)),
//! );
//! let reply = scheduler.enqueue_with_reply("product 2", async { Ok::<_, TaskError>("second".to_string()) });
//! scheduler.start();
//! let _second = reply.await;
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod scheduler;

// Re-export commonly used types
pub use config::{Config, LogConfig};
pub use error::{QueueError, TaskError, TaskResult};
pub use scheduler::{
    BoxedTask, Completion, PriorityPolicy, QueueEntry, QueueEntryStatus, QueueEvent, QueueListener, QueueState,
    RequestTask, RunState, Scheduler, SchedulerConfig, SchedulerStats, boxed,
};
