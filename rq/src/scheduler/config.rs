//! Scheduler configuration

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Label used in logs and events to tell schedulers apart
    #[serde(default = "default_name")]
    pub name: String,

    /// Start draining automatically whenever a request is enqueued
    #[serde(rename = "auto-run", default)]
    pub auto_run: bool,
}

fn default_name() -> String {
    debug!("default_name: called");
    "default".to_string()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            auto_run: false,
        }
    }
}

impl SchedulerConfig {
    /// Config with the given name and defaults for everything else
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder-style toggle for auto-run
    pub fn with_auto_run(mut self, auto_run: bool) -> Self {
        self.auto_run = auto_run;
        self
    }
}
