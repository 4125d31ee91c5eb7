//! Single-flight request scheduler
//!
//! Runs queued requests one at a time in priority order, with start, pause,
//! resume and stop controls that can be used while requests are queued or
//! in flight.

mod config;
mod core;
mod events;
mod item;
mod listener;
mod queue;
mod state;
mod task;

pub use config::SchedulerConfig;
pub use self::core::Scheduler;
pub use events::{DEFAULT_EVENT_CAPACITY, QueueEvent};
pub use item::PriorityPolicy;
pub use listener::QueueListener;
pub use state::{QueueEntry, QueueEntryStatus, QueueState, RunState, SchedulerStats};
pub use task::{BoxedTask, Completion, RequestTask, boxed};
