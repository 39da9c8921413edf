//! Scheduling stage config.

use serde::{Deserialize, Serialize};
use vecsync_core::SourceSchemaInfo;

use crate::errors::{ConfigError, Result};

fn default_poll_interval_secs() -> u64 {
    300
}

/// How often the scheduler drains this vectorizer's queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "implementation", rename_all = "snake_case")]
pub enum SchedulingConfig {
    /// Never scheduled; the queue drains only via explicit worker runs.
    Disabled,
    /// Drained on a fixed interval.
    Interval {
        /// Seconds between scheduled runs.
        #[serde(default = "default_poll_interval_secs")]
        poll_interval_secs: u64,
    },
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self::Interval { poll_interval_secs: default_poll_interval_secs() }
    }
}

impl SchedulingConfig {
    /// Validate parameter ranges.
    pub fn validate(&self, _source: &SourceSchemaInfo) -> Result<()> {
        if let Self::Interval { poll_interval_secs } = self {
            if *poll_interval_secs == 0 {
                return Err(ConfigError::OutOfRange {
                    param: "poll_interval_secs",
                    detail: "must be greater than zero".into(),
                });
            }
        }
        Ok(())
    }
}
