//! Queue event stream
//!
//! Every transition and request outcome is broadcast to subscribers. Unlike
//! the single [`QueueListener`](super::QueueListener), any number of
//! consumers can watch a scheduler this way.

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::debug;

/// Default channel capacity (events)
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Something that happened on a scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    Started,
    Paused,
    Finished,
    Enqueued {
        tag: String,
        priority: i64,
    },
    RequestStarted {
        tag: String,
        priority: i64,
    },
    RequestCompleted {
        tag: String,
        priority: i64,
        success: bool,
        elapsed: Duration,
    },
    Cancelled {
        tag: String,
    },
}

impl QueueEvent {
    /// Short name for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Paused => "paused",
            Self::Finished => "finished",
            Self::Enqueued { .. } => "enqueued",
            Self::RequestStarted { .. } => "request-started",
            Self::RequestCompleted { .. } => "request-completed",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

/// Broadcast sender wrapper
pub(crate) struct EventBus {
    tx: broadcast::Sender<QueueEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Fire-and-forget: with no subscribers the event is dropped
    pub(crate) fn emit(&self, event: QueueEvent) {
        debug!(event_type = event.event_type(), "EventBus::emit");
        let _ = self.tx.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.tx.subscribe()
    }
}
