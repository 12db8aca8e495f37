//! Update rate control for observer streams

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Update rate for progress and state observer streams
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every change the producer publishes
    Native,

    /// Throttled to maximum Hz
    /// If the requested rate exceeds the producer tick rate, Native is used
    Max(u32),
}

impl UpdateRate {
    /// Normalize rate against the producer tick rate
    pub fn normalize(self, source_hz: f64) -> Self {
        match self {
            UpdateRate::Native => UpdateRate::Native,
            UpdateRate::Max(0) => UpdateRate::Native,
            UpdateRate::Max(hz) if hz as f64 >= source_hz => UpdateRate::Native,
            UpdateRate::Max(hz) => UpdateRate::Max(hz),
        }
    }

    /// Get throttle interval if needed
    pub fn throttle_interval(self, source_hz: f64) -> Option<Duration> {
        match self.normalize(source_hz) {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}
