//! Replay provider for packet log files

use std::path::Path;
use tracing::{debug, info, warn};

use crate::cache::CacheBuilder;
use crate::color::ColorMapper;
use crate::packet::PacketLogReader;
use crate::playback::PlaybackController;
use crate::provider::{Provider, Step};
use crate::types::StatusEvent;
use crate::{Result, WaterfallConfig};

/// Replay provider that scrolls through a pre-built sample cache
pub struct ReplayProvider {
    /// Playback state machine owning the cache
    controller: PlaybackController,

    /// Display name of the source
    source: String,
}

impl ReplayProvider {
    /// Read a packet log and build its sample cache
    ///
    /// Blocking: decoding is proportional to the file size. The session runs
    /// this on the blocking pool. `notify` receives load progress and skipped
    /// record events.
    pub fn load<P, F>(
        path: P,
        config: &WaterfallConfig,
        mapper: ColorMapper,
        notify: F,
    ) -> Result<Self>
    where
        P: AsRef<Path>,
        F: FnMut(StatusEvent),
    {
        let reader = PacketLogReader::open(path)?;
        let source = reader.display_name();
        Self::from_records(source, reader.records(), config, mapper, notify)
    }

    /// Build a provider from in-memory records
    pub fn from_records<F>(
        source: impl Into<String>,
        records: &[String],
        config: &WaterfallConfig,
        mapper: ColorMapper,
        mut notify: F,
    ) -> Result<Self>
    where
        F: FnMut(StatusEvent),
    {
        let source = source.into();
        let mut controller = PlaybackController::new(config)?;
        controller.begin_loading()?;

        let built = CacheBuilder::from_mapper(config, mapper).build(records, &mut notify);
        let cache = match built {
            Ok(cache) => cache,
            Err(e) => {
                controller.abort();
                return Err(e);
            }
        };

        notify(StatusEvent::Loaded {
            source: source.clone(),
            columns: cache.total_columns(),
            skipped: cache.skipped_records(),
        });
        controller.finish_loading(cache)?;
        info!("Replay source {} ready ({} columns)", source, controller.total_columns());

        Ok(Self { controller, source })
    }

    /// Display name of the source
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Playback controller
    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }
}

#[async_trait::async_trait]
impl Provider for ReplayProvider {
    async fn next_step(&mut self, speed: usize) -> Result<Step> {
        Ok(self.controller.tick(speed))
    }

    fn seek(&mut self, progress: u32) -> Result<usize> {
        self.controller.seek(progress)
    }

    fn set_gain(&mut self, gain: f32) -> f32 {
        let Some(applied) = self.controller.set_gain(gain) else {
            warn!("No cache loaded for {}, gain {} not applied", self.source, gain);
            return gain;
        };
        debug!("Recolouring {} with gain {}", self.source, applied);
        applied
    }

    fn pause(&mut self) {
        self.controller.pause();
    }

    fn resume(&mut self) {
        self.controller.resume();
    }

    fn progress_granularity(&self) -> Option<u32> {
        self.controller.progress_granularity()
    }
}

impl std::fmt::Debug for ReplayProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayProvider")
            .field("source", &self.source)
            .field("state", &self.controller.state())
            .field("position", &self.controller.position())
            .finish()
    }
}
