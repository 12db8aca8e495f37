//! Scroll/playback controller
//!
//! Owns the sample cache and the playback position of one file source and
//! turns ticks into frames. The controller is synchronous and single-owner:
//! the producer task drives it, runtime controls reach it only through the
//! driver between ticks.
//!
//! ```rust
//! use sonar_waterfall::playback::PlaybackController;
//! use sonar_waterfall::provider::Step;
//! use sonar_waterfall::{PlaybackState, WaterfallConfig};
//!
//! let config = WaterfallConfig { window_width: 4, ..Default::default() };
//! let mut controller = PlaybackController::new(&config).unwrap();
//! assert_eq!(controller.state(), PlaybackState::Stopped);
//! assert!(matches!(controller.tick(1), Step::Idle));
//! ```

use tracing::{debug, info, trace};

use crate::cache::SampleCache;
use crate::provider::Step;
use crate::types::{Frame, PlaybackState};
use crate::{Result, WaterfallConfig, WaterfallError};

/// Playback state machine over a [`SampleCache`]
#[derive(Debug)]
pub struct PlaybackController {
    window_width: usize,
    state: PlaybackState,
    position: usize,
    cache: Option<SampleCache>,
}

impl PlaybackController {
    /// Create a stopped controller
    pub fn new(config: &WaterfallConfig) -> Result<Self> {
        if config.window_width == 0 {
            return Err(WaterfallError::invalid_configuration(
                "window_width",
                "must be greater than zero",
            ));
        }
        Ok(Self { window_width: config.window_width, state: PlaybackState::Stopped, position: 0, cache: None })
    }

    /// Current state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// First visible column
    pub fn position(&self) -> usize {
        self.position
    }

    /// Columns per frame
    pub fn window_width(&self) -> usize {
        self.window_width
    }

    /// Populated columns of the loaded cache
    pub fn total_columns(&self) -> usize {
        self.cache.as_ref().map_or(0, SampleCache::total_columns)
    }

    /// Columns per progress step of the loaded cache
    pub fn columns_per_progress_step(&self) -> usize {
        self.cache.as_ref().map_or(0, SampleCache::columns_per_progress_step)
    }

    /// Progress steps of the loaded cache
    pub fn progress_granularity(&self) -> Option<u32> {
        self.cache.as_ref().map(SampleCache::progress_granularity)
    }

    /// Loaded cache, if any
    pub fn cache(&self) -> Option<&SampleCache> {
        self.cache.as_ref()
    }

    /// Recolour later frames with a new gain; `None` until a cache is loaded
    pub fn set_gain(&mut self, gain: f32) -> Option<f32> {
        self.cache.as_mut().map(|cache| cache.set_gain(gain))
    }

    /// A new source was selected; the previous cache is released
    pub fn begin_loading(&mut self) -> Result<()> {
        if self.state == PlaybackState::Loading {
            return Err(WaterfallError::invalid_state("load a new source", self.state));
        }
        debug!("Playback {} -> loading", self.state);
        self.cache = None;
        self.position = 0;
        self.state = PlaybackState::Loading;
        Ok(())
    }

    /// Cache is ready; playback starts at column 0
    pub fn finish_loading(&mut self, cache: SampleCache) -> Result<()> {
        if self.state != PlaybackState::Loading {
            return Err(WaterfallError::invalid_state("finish loading", self.state));
        }
        info!(
            "Playback ready: {} columns, window {}, {} columns per progress step",
            cache.total_columns(),
            self.window_width,
            cache.columns_per_progress_step()
        );
        self.cache = Some(cache);
        self.position = 0;
        self.state = PlaybackState::Playing;
        Ok(())
    }

    /// Stop for good; returns false if already terminal
    pub fn abort(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        debug!("Playback {} -> aborted", self.state);
        self.state = PlaybackState::Aborted;
        true
    }

    /// Playing -> Paused; returns whether the state changed
    pub fn pause(&mut self) -> bool {
        if self.state != PlaybackState::Playing {
            return false;
        }
        self.state = PlaybackState::Paused;
        true
    }

    /// Paused -> Playing; position is kept
    pub fn resume(&mut self) -> bool {
        if self.state != PlaybackState::Paused {
            return false;
        }
        self.state = PlaybackState::Playing;
        true
    }

    /// Jump to a progress step
    ///
    /// `position = columns_per_progress_step * progress`, clamped to
    /// `[0, total_columns - window_width]`. Rejected while loading or when no
    /// source is loaded.
    pub fn seek(&mut self, progress: u32) -> Result<usize> {
        let Some(cache) = self.cache.as_ref().filter(|_| self.state != PlaybackState::Loading)
        else {
            return Err(WaterfallError::invalid_state("seek", self.state));
        };

        let progress = progress.min(cache.progress_granularity()) as usize;
        let last_start = cache.total_columns().saturating_sub(self.window_width);
        self.position = cache.columns_per_progress_step().saturating_mul(progress).min(last_start);
        debug!("Seek to step {} -> column {}", progress, self.position);
        Ok(self.position)
    }

    /// Frame at the current position, without advancing
    pub fn frame(&self) -> Option<Frame> {
        self.cache.as_ref().map(|cache| cache.window(self.position, self.window_width))
    }

    /// Advance one tick
    ///
    /// While playing: copy the frame at the current position, then move
    /// forward by `speed` columns. When the window reaches the end of the
    /// cache the controller finishes, rewinds to column 0 and reports full
    /// progress; the frame of that tick is still returned. Any later tick
    /// returns [`Step::Finished`].
    pub fn tick(&mut self, speed: usize) -> Step {
        match self.state {
            PlaybackState::Playing => {}
            PlaybackState::Finished | PlaybackState::Aborted => return Step::Finished,
            PlaybackState::Stopped | PlaybackState::Loading | PlaybackState::Paused => {
                return Step::Idle;
            }
        }
        let Some(cache) = self.cache.as_ref() else {
            return Step::Idle;
        };

        let frame = cache.window(self.position, self.window_width);
        let total = cache.total_columns();
        let step = cache.columns_per_progress_step();
        self.position = self.position.saturating_add(speed);

        if self.position.saturating_add(self.window_width) >= total {
            info!("Playback finished at column {}", self.position.min(total));
            self.position = 0;
            self.state = PlaybackState::Finished;
            return Step::Frame { frame, progress: Some(cache.progress_granularity()) };
        }

        let progress = (step > 0 && speed > 0 && self.position % step == 0)
            .then(|| (self.position / step) as u32);
        trace!("Tick -> column {} of {}", self.position, total);
        Step::Frame { frame, progress }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheBuilder;
    use crate::color::ColorTable;
    use crate::test_utils::synthetic_records;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn loaded(records: usize, width: usize, granularity: u32) -> PlaybackController {
        let config =
            WaterfallConfig { window_width: width, progress_granularity: granularity, ..Default::default() };
        let cache = CacheBuilder::new(&config, Arc::new(ColorTable::default()))
            .build(&synthetic_records(records, 3), |_| {})
            .unwrap();
        let mut controller = PlaybackController::new(&config).unwrap();
        controller.begin_loading().unwrap();
        controller.finish_loading(cache).unwrap();
        controller
    }

    fn ticks_until_finished(controller: &mut PlaybackController, speed: usize) -> usize {
        let mut ticks = 0;
        while controller.state() != PlaybackState::Finished {
            controller.tick(speed);
            ticks += 1;
            assert!(ticks < 100_000, "controller never finished");
        }
        ticks
    }

    #[test]
    fn gain_needs_a_loaded_cache() {
        let mut idle = PlaybackController::new(&WaterfallConfig::default()).unwrap();
        assert_eq!(idle.set_gain(30.0), None);

        let mut controller = loaded(50, 4, 10);
        assert_eq!(controller.set_gain(30.0), Some(30.0));
        assert_eq!(controller.cache().map(SampleCache::gain), Some(30.0));
    }

    #[test]
    fn zero_window_is_invalid() {
        let config = WaterfallConfig { window_width: 0, ..Default::default() };
        assert!(matches!(
            PlaybackController::new(&config),
            Err(WaterfallError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn lifecycle_transitions() {
        let config = WaterfallConfig { window_width: 4, ..Default::default() };
        let mut controller = PlaybackController::new(&config).unwrap();
        assert_eq!(controller.state(), PlaybackState::Stopped);

        controller.begin_loading().unwrap();
        assert_eq!(controller.state(), PlaybackState::Loading);
        assert!(controller.begin_loading().is_err());
        assert!(matches!(controller.seek(3), Err(WaterfallError::InvalidState { .. })));
        assert_eq!(controller.tick(1), Step::Idle);

        assert!(controller.abort());
        assert_eq!(controller.state(), PlaybackState::Aborted);
        assert!(!controller.abort());
        assert_eq!(controller.tick(1), Step::Finished);
    }

    #[test]
    fn pause_holds_position() {
        let mut controller = loaded(101, 10, 10);
        controller.tick(3);
        assert_eq!(controller.position(), 3);

        assert!(controller.pause());
        assert!(!controller.pause());
        assert_eq!(controller.tick(3), Step::Idle);
        assert_eq!(controller.position(), 3);

        assert!(controller.resume());
        controller.tick(3);
        assert_eq!(controller.position(), 6);
    }

    #[test]
    fn progress_reported_on_step_boundaries() {
        // 100 columns, 10 steps -> 10 columns per step
        let mut controller = loaded(101, 10, 10);
        let mut reported = Vec::new();
        for _ in 0..25 {
            if let Step::Frame { progress: Some(p), .. } = controller.tick(1) {
                reported.push(p);
            }
        }
        assert_eq!(reported, vec![1, 2]);
    }

    #[test]
    fn finishing_rewinds_and_reports_full_progress() {
        let mut controller = loaded(31, 10, 10);
        let mut last = None;
        while controller.state() == PlaybackState::Playing {
            last = Some(controller.tick(7));
        }
        assert_eq!(controller.state(), PlaybackState::Finished);
        assert_eq!(controller.position(), 0);
        assert!(matches!(last, Some(Step::Frame { progress: Some(10), .. })));
        assert_eq!(controller.tick(7), Step::Finished);
    }

    #[test]
    fn seek_clamps_to_last_window() {
        let mut controller = loaded(101, 10, 10);
        assert_eq!(controller.seek(4).unwrap(), 40);
        assert_eq!(controller.seek(10).unwrap(), 90);
        assert_eq!(controller.seek(500).unwrap(), 90);
        assert_eq!(controller.seek(0).unwrap(), 0);
    }

    #[test]
    fn seek_matches_direct_positioning() {
        let mut controller = loaded(101, 10, 10);
        controller.seek(6).unwrap();
        let via_seek = controller.frame().unwrap();
        let direct = controller.cache().unwrap().window(60, 10);
        assert_eq!(via_seek, direct);
        if let Step::Frame { frame, .. } = controller.tick(1) {
            assert_eq!(frame, direct);
        } else {
            panic!("expected a frame after seek");
        }
    }

    #[test]
    fn short_sources_finish_on_first_tick() {
        let mut controller = loaded(5, 10, 10);
        assert!(matches!(controller.tick(1), Step::Frame { .. }));
        assert_eq!(controller.state(), PlaybackState::Finished);
    }

    #[test]
    fn zero_speed_never_advances() {
        let mut controller = loaded(101, 10, 10);
        for _ in 0..10 {
            assert!(matches!(controller.tick(0), Step::Frame { progress: None, .. }));
        }
        assert_eq!(controller.position(), 0);
        assert_eq!(controller.state(), PlaybackState::Playing);
    }

    proptest! {
        #[test]
        fn finishes_within_bound(records in 20usize..400, width in 1usize..19, speed in 1usize..25) {
            let mut controller = loaded(records, width, 10);
            let total = controller.total_columns();
            let bound = (total - width).div_ceil(speed).max(1);
            let ticks = ticks_until_finished(&mut controller, speed);
            prop_assert!(ticks <= bound, "took {} ticks, bound {}", ticks, bound);
            prop_assert_eq!(controller.position(), 0);
        }
    }
}
