//! Run state and introspection types

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Run state of a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

/// The request currently executing
#[derive(Debug, Clone)]
pub(crate) struct InFlight {
    pub tag: String,
    pub priority: i64,
    pub started_at: Instant,
    pub enqueued_at: Instant,
}

/// Counters for a scheduler
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub total_enqueued: u64,
    pub total_started: u64,
    pub total_succeeded: u64,
    pub total_failed: u64,
    pub total_cancelled: u64,
    pub total_cleared: u64,
    pub total_run_time_ms: u64,
    pub peak_queue_depth: usize,
}

/// Point-in-time view of a scheduler
#[derive(Debug, Clone, Serialize)]
pub struct QueueState {
    pub state: RunState,
    pub pending: usize,
    pub in_flight: Option<String>,
    pub auto_run: bool,
    pub stats: SchedulerStats,
}

/// One request in a queue listing
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub tag: String,
    pub priority: i64,
    pub status: QueueEntryStatus,
    pub wait_time: Duration,
}

/// Status of a queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEntryStatus {
    Running,
    Queued,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_display() {
        assert_eq!(RunState::Stopped.to_string(), "stopped");
        assert_eq!(RunState::Running.to_string(), "running");
        assert_eq!(RunState::Paused.to_string(), "paused");
        assert_eq!(RunState::default(), RunState::Stopped);
    }

    #[test]
    fn test_run_state_serde() {
        let json = serde_json::to_string(&RunState::Paused).unwrap();
        assert_eq!(json, "\"paused\"");

        let state: RunState = serde_json::from_str("\"running\"").unwrap();
        assert_eq!(state, RunState::Running);
    }
}
