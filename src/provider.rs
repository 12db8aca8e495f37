//! Provider trait for waterfall sources

use crate::Result;
use crate::types::Frame;

/// Outcome of one producer tick
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// A frame to enqueue, with a progress value when a step boundary was crossed
    Frame { frame: Frame, progress: Option<u32> },
    /// Nothing to enqueue this tick (paused, or no new data)
    Idle,
    /// Source exhausted (normal termination)
    Finished,
}

/// Trait for waterfall data sources
///
/// Providers abstract over file replay and live streams. The driver owns the
/// provider, paces it with a fixed interval and applies runtime controls
/// between ticks, so a provider never sees concurrent calls.
#[async_trait::async_trait]
pub trait Provider: Send + 'static {
    /// Produce the next step, advancing by `speed` columns where applicable
    ///
    /// Returns:
    /// - `Ok(Step::Frame { .. })` - frame ready for the queue
    /// - `Ok(Step::Idle)` - nothing to send this tick
    /// - `Ok(Step::Finished)` - stream ended
    /// - `Err(e)` - skippable errors are reported and the loop continues,
    ///   anything else aborts playback
    async fn next_step(&mut self, speed: usize) -> Result<Step>;

    /// Move to a progress step; returns the new column position
    fn seek(&mut self, progress: u32) -> Result<usize>;

    /// Apply a gain value; returns the value actually applied
    fn set_gain(&mut self, gain: f32) -> f32;

    /// Stop advancing until [`Provider::resume`]
    fn pause(&mut self);

    /// Continue advancing from the current position
    fn resume(&mut self);

    /// Progress steps, or `None` when the source length is unknown
    fn progress_granularity(&self) -> Option<u32>;
}
