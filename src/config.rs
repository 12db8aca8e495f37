//! Waterfall configuration
//!
//! Every field has a default, so a YAML document only needs the values it
//! overrides:
//!
//! ```rust
//! use sonar_waterfall::WaterfallConfig;
//!
//! let config = WaterfallConfig::from_yaml_str("window_width: 600\nframe_interval_ms: 20\n").unwrap();
//! assert_eq!(config.window_width, 600);
//! assert_eq!(config.progress_granularity, 100);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::color::ColorPolicy;
use crate::{Result, WaterfallError};

/// Tunables for cache building, playback and the frame pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterfallConfig {
    /// Maximum packets retained in the sample cache
    pub column_capacity: usize,

    /// Maximum sample slots (rows) retained per packet
    pub max_sample_slots: usize,

    /// Columns per visible frame
    pub window_width: usize,

    /// Discrete progress steps, matching the progress indicator's maximum
    pub progress_granularity: u32,

    /// Sleep between producer ticks
    pub frame_interval_ms: u64,

    /// Bounded frame queue capacity
    pub queue_capacity: usize,

    /// Columns advanced per tick at start
    pub speed: usize,

    /// Speed used by the fast-forward toggle
    pub fast_forward_speed: usize,

    /// Upper clamp for `set_speed`
    pub max_speed: usize,

    /// Frames per throughput measurement
    pub throughput_window: u32,

    /// Intensity to colour bucket policy
    pub color: ColorPolicy,

    /// Fail the load on the first malformed record instead of skipping it
    pub abort_on_malformed: bool,

    /// Buffered status events per observer
    pub status_capacity: usize,
}

impl Default for WaterfallConfig {
    fn default() -> Self {
        Self {
            column_capacity: 20_000,
            max_sample_slots: 800,
            window_width: 1399,
            progress_granularity: 100,
            frame_interval_ms: 40,
            queue_capacity: 8,
            speed: 1,
            fast_forward_speed: 5,
            max_speed: 64,
            throughput_window: 10,
            color: ColorPolicy::default(),
            abort_on_malformed: false,
            status_capacity: 64,
        }
    }
}

impl WaterfallConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("column_capacity", self.column_capacity),
            ("max_sample_slots", self.max_sample_slots),
            ("window_width", self.window_width),
            ("queue_capacity", self.queue_capacity),
            ("max_speed", self.max_speed),
            ("status_capacity", self.status_capacity),
            ("progress_granularity", self.progress_granularity as usize),
            ("throughput_window", self.throughput_window as usize),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(WaterfallError::invalid_configuration(field, "must be greater than zero"));
            }
        }

        if self.speed > self.max_speed || self.fast_forward_speed > self.max_speed {
            return Err(WaterfallError::invalid_configuration(
                "speed",
                format!("speeds must not exceed max_speed ({})", self.max_speed),
            ));
        }

        if let ColorPolicy::DynamicGain { gain } = self.color {
            if !(0.0..=100.0).contains(&gain) {
                return Err(WaterfallError::invalid_configuration(
                    "color.gain",
                    format!("{gain} is outside 0..=100"),
                ));
            }
        }

        Ok(())
    }

    /// Producer tick interval
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    /// Producer ticks per second
    pub fn tick_rate(&self) -> f64 {
        1.0 / self.frame_interval().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = WaterfallConfig::default();
        config.validate().unwrap();
        assert_eq!(config.window_width, 1399);
        assert_eq!(config.column_capacity, 20_000);
        assert_eq!(config.tick_rate(), 25.0);
    }

    #[test]
    fn zero_window_or_granularity_is_rejected() {
        let err = WaterfallConfig { window_width: 0, ..Default::default() }.validate().unwrap_err();
        assert!(matches!(err, WaterfallError::InvalidConfiguration { ref field, .. } if field == "window_width"));

        let err =
            WaterfallConfig { progress_granularity: 0, ..Default::default() }.validate().unwrap_err();
        assert!(err.to_string().contains("progress_granularity"));
    }

    #[test]
    fn yaml_overrides_and_policy() {
        let yaml = "window_width: 32\ncolor:\n  policy: dynamic_gain\n  gain: 60.0\n";
        let config = WaterfallConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.window_width, 32);
        assert_eq!(config.color, ColorPolicy::DynamicGain { gain: 60.0 });
        assert_eq!(config.queue_capacity, 8);
    }

    #[test]
    fn bad_yaml_is_a_config_error() {
        let err = WaterfallConfig::from_yaml_str("window_width: [1, 2]").unwrap_err();
        assert!(matches!(err, WaterfallError::Config { .. }));

        let err = WaterfallConfig::from_yaml_str("color:\n  policy: dynamic_gain\n  gain: 300\n")
            .unwrap_err();
        assert!(matches!(err, WaterfallError::InvalidConfiguration { .. }));
    }
}
