//! Playback session: one source, one producer, many observers

use futures::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tracing::{debug, info, warn};

use crate::color::{ColorMapper, ColorTable};
use crate::controls::PlaybackControls;
use crate::driver::{Driver, DriverSettings, Sinks};
use crate::packet::PacketLogReader;
use crate::provider::Provider;
use crate::providers::{LiveProvider, ReplayProvider};
use crate::queue::{FrameReceiver, frame_queue};
use crate::stream::ThrottleExt;
use crate::types::{Frame, PlaybackState, StatusEvent, UpdateRate};
use crate::{Result, WaterfallConfig, WaterfallError};

/// Speed the fast-forward toggle returns to
const NORMAL_SPEED: usize = 1;

/// A running waterfall
///
/// Owns the control block and the producer task of the current source. The
/// frame queue and the observer channels outlive a source switch, so
/// consumers keep their handles.
pub struct WaterfallSession {
    config: WaterfallConfig,
    /// Template mapper; each load starts from a clone carrying the current gain
    mapper: ColorMapper,
    controls: Arc<PlaybackControls>,
    sinks: Arc<Sinks>,
    frames: FrameReceiver,
    producer: Option<JoinHandle<PlaybackState>>,
    source: String,
}

impl WaterfallSession {
    /// Load a packet log and start playing it
    ///
    /// The file is read and decoded on the blocking pool. Returns once the
    /// producer has been started.
    pub async fn open<P: AsRef<Path>>(path: P, config: WaterfallConfig) -> Result<Self> {
        let mut session = Self::idle(config, ColorTable::default())?;
        let tx = session.fresh_queue().await;
        session.start_replay(path.as_ref().to_path_buf(), tx).await?;
        Ok(session)
    }

    /// Scroll records from a live feed as they arrive
    ///
    /// Must be called within a Tokio runtime.
    pub async fn live(records: mpsc::Receiver<String>, config: WaterfallConfig) -> Result<Self> {
        let mut session = Self::idle(config, ColorTable::default())?;
        let provider = LiveProvider::new(records, &session.config, session.mapper.clone())?;
        let tx = session.fresh_queue().await;
        session.source = "live".to_string();
        session.spawn(provider, tx);
        info!("Live session started");
        Ok(session)
    }

    fn idle(config: WaterfallConfig, table: ColorTable) -> Result<Self> {
        config.validate()?;
        let (_, frames) = frame_queue(config.queue_capacity);
        Ok(Self {
            mapper: ColorMapper::new(table, config.color),
            controls: Arc::new(PlaybackControls::new(config.speed, config.max_speed)),
            sinks: Arc::new(Sinks::new(config.status_capacity)),
            frames,
            producer: None,
            source: String::new(),
            config,
        })
    }

    /// Stop the current source and play another packet log
    ///
    /// Speed and gain carry over; pause does not.
    pub async fn switch_source<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        info!("Switching source to {}", path.display());
        self.shutdown_producer().await;

        let speed = self.controls.speed();
        self.controls = Arc::new(PlaybackControls::new(speed, self.config.max_speed));

        let tx = self.fresh_queue().await;
        self.start_replay(path, tx).await
    }

    /// New bounded queue; every receiver clone now reads from it
    async fn fresh_queue(&mut self) -> mpsc::Sender<Frame> {
        let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));
        self.frames.replace(rx).await;
        tx
    }

    async fn start_replay(&mut self, path: PathBuf, frames: mpsc::Sender<Frame>) -> Result<()> {
        let sinks = self.sinks.clone();
        let config = self.config.clone();
        let mapper = self.mapper.clone();

        let loaded = tokio::task::spawn_blocking(move || {
            let reader = PacketLogReader::open_limited(&path, config.column_capacity)?;
            sinks.set_state(PlaybackState::Loading);
            sinks.progress(0);
            ReplayProvider::from_records(
                reader.display_name(),
                reader.records(),
                &config,
                mapper,
                |event| sinks.status(event),
            )
        })
        .await
        .map_err(|e| WaterfallError::Channel { context: format!("cache build task failed: {e}") })
        .and_then(|built| built);

        match loaded {
            Ok(provider) => {
                self.source = provider.source().to_string();
                self.spawn(provider, frames);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to load source: {}", e);
                if self.sinks.state() == PlaybackState::Loading {
                    self.sinks.set_state(PlaybackState::Aborted);
                }
                self.sinks.status(StatusEvent::Error(e.to_string()));
                Err(e)
            }
        }
    }

    fn spawn<P: Provider>(&mut self, provider: P, frames: mpsc::Sender<Frame>) {
        let settings = DriverSettings {
            frame_interval: self.config.frame_interval(),
            throughput_window: self.config.throughput_window,
        };
        self.producer =
            Some(Driver::spawn(provider, self.controls.clone(), frames, self.sinks.clone(), settings));
    }

    async fn shutdown_producer(&mut self) {
        self.controls.stop();
        if let Some(handle) = self.producer.take() {
            match handle.await {
                Ok(state) => debug!("Previous producer ended {}", state),
                Err(e) => warn!("Previous producer task failed: {}", e),
            }
        }
    }

    /// Set columns advanced per tick; returns the clamped value
    pub fn set_speed(&self, speed: usize) -> usize {
        self.controls.set_speed(speed)
    }

    /// Switch between normal and fast-forward speed; returns the new speed
    pub fn toggle_fast_forward(&self) -> usize {
        let target = if self.controls.speed() == self.config.fast_forward_speed {
            NORMAL_SPEED
        } else {
            self.config.fast_forward_speed
        };
        self.controls.set_speed(target)
    }

    /// Current speed
    pub fn speed(&self) -> usize {
        self.controls.speed()
    }

    pub fn pause(&self) {
        self.controls.set_paused(true);
    }

    pub fn resume(&self) {
        self.controls.set_paused(false);
    }

    /// Flip pause; returns whether playback is now paused
    pub fn toggle_pause(&self) -> bool {
        self.controls.toggle_paused()
    }

    /// Stop the producer; playback ends in [`PlaybackState::Aborted`]
    pub fn stop(&self) {
        self.controls.stop();
    }

    /// Jump to a progress step, clamped to the progress granularity
    ///
    /// Applied on the producer's next tick. Live sources reject seeks with a
    /// status error.
    pub fn seek(&self, progress: u32) {
        self.controls.request_seek(progress.min(self.config.progress_granularity));
    }

    /// Change gain (dynamic policy) or threshold (fixed policy)
    ///
    /// Applied on the producer's next tick: file sources recolour the cached
    /// intensities, live sources colour the next record with it. Later loads
    /// start from it too. Returns the clamped value.
    pub fn set_gain(&mut self, gain: f32) -> f32 {
        let applied = self.mapper.set_gain(gain);
        self.controls.request_gain(applied);
        applied
    }

    /// Current gain or threshold
    pub fn gain(&self) -> f32 {
        self.mapper.gain()
    }

    /// Consumer handle for the frame queue
    pub fn frames(&self) -> FrameReceiver {
        self.frames.clone()
    }

    /// Frames as a stream; each frame goes to exactly one consumer
    pub fn frame_stream(&self) -> impl Stream<Item = Frame> + 'static {
        futures::stream::unfold(self.frames.clone(), |frames| async move {
            frames.next_frame().await.map(|frame| (frame, frames))
        })
    }

    /// Wait for the next frame of the current source
    pub async fn next_frame(&self) -> Option<Frame> {
        self.frames.next_frame().await
    }

    /// Current playback state
    pub fn state(&self) -> PlaybackState {
        self.sinks.state()
    }

    /// State transitions, starting with the current state
    pub fn state_updates(&self) -> impl Stream<Item = PlaybackState> + 'static {
        WatchStream::new(self.sinks.subscribe_state())
    }

    /// Last published progress step
    pub fn progress(&self) -> u32 {
        *self.sinks.subscribe_progress().borrow()
    }

    /// Progress steps, optionally throttled
    pub fn progress_updates(&self, rate: UpdateRate) -> impl Stream<Item = u32> + 'static {
        let progress = WatchStream::new(self.sinks.subscribe_progress());
        match rate.throttle_interval(self.config.tick_rate()) {
            None => progress.boxed(),
            Some(interval) => progress.throttle(interval).boxed(),
        }
    }

    /// Subscribe to status events
    pub fn status(&self) -> broadcast::Receiver<StatusEvent> {
        self.sinks.subscribe_status()
    }

    /// Status events as a stream; events missed by a lagging observer are dropped
    pub fn status_updates(&self) -> impl Stream<Item = StatusEvent> + Unpin + 'static {
        BroadcastStream::new(self.sinks.subscribe_status())
            .filter_map(|event| async move { event.ok() })
            .boxed()
    }

    /// Most recent throughput measurement in frames per second
    pub fn throughput(&self) -> Option<f64> {
        *self.sinks.subscribe_throughput().borrow()
    }

    /// Wait until playback finishes or aborts
    pub async fn wait_finished(&self) -> PlaybackState {
        let mut state = self.sinks.subscribe_state();
        match state.wait_for(|s| s.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => self.sinks.state(),
        }
    }

    /// Display name of the current source
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn config(&self) -> &WaterfallConfig {
        &self.config
    }
}

impl Drop for WaterfallSession {
    fn drop(&mut self) {
        debug!("Dropping waterfall session");
        self.controls.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::encode_record;
    use crate::test_utils::{synthetic_records, write_packet_log};

    fn fast_config(width: usize) -> WaterfallConfig {
        WaterfallConfig { window_width: width, frame_interval_ms: 1, ..Default::default() }
    }

    #[tokio::test]
    async fn missing_file_is_source_unavailable() {
        let err = match WaterfallSession::open("/no/such/survey.txt", fast_config(4)).await {
            Ok(_) => panic!("expected an error"),
            Err(e) => e,
        };
        assert!(matches!(err, WaterfallError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_loading() {
        let err = match WaterfallSession::open("/no/such/survey.txt", fast_config(0)).await {
            Ok(_) => panic!("expected an error"),
            Err(e) => e,
        };
        assert!(matches!(err, WaterfallError::InvalidConfiguration { .. }));
    }

    #[tokio::test]
    async fn fast_forward_toggles() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_packet_log(dir.path(), "a.txt", &synthetic_records(40, 2)).unwrap();
        let session = WaterfallSession::open(&path, fast_config(4)).await.unwrap();

        assert_eq!(session.speed(), 1);
        assert_eq!(session.toggle_fast_forward(), 5);
        assert_eq!(session.toggle_fast_forward(), 1);
        assert_eq!(session.set_speed(1000), 64);
        session.stop();
    }

    #[tokio::test]
    async fn switch_source_keeps_consumers() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_packet_log(dir.path(), "first.txt", &synthetic_records(200, 2)).unwrap();
        let second = write_packet_log(dir.path(), "second.txt", &synthetic_records(9, 3)).unwrap();

        let mut session = WaterfallSession::open(&first, fast_config(4)).await.unwrap();
        let frames = session.frames();
        assert_eq!(frames.next_frame().await.map(|f| f.height), Some(2));

        session.set_speed(3);
        session.switch_source(&second).await.unwrap();
        assert_eq!(session.source(), "second.txt");
        assert_eq!(session.speed(), 3);

        let mut heights = Vec::new();
        while let Some(frame) = frames.next_frame().await {
            heights.push(frame.height);
        }
        // 8 columns, window 4, speed 3 -> two frames
        assert_eq!(heights, vec![3, 3]);
        assert_eq!(session.wait_finished().await, PlaybackState::Finished);
    }

    #[tokio::test]
    async fn switch_source_restarts_progress() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_packet_log(dir.path(), "first.txt", &synthetic_records(41, 2)).unwrap();
        let second = write_packet_log(dir.path(), "second.txt", &synthetic_records(2_001, 2)).unwrap();

        let mut session = WaterfallSession::open(&first, fast_config(4)).await.unwrap();
        let frames = session.frames();
        while frames.next_frame().await.is_some() {}
        assert_eq!(session.wait_finished().await, PlaybackState::Finished);
        assert_eq!(session.progress(), 100);

        // hold the new source at its first window
        session.set_speed(0);
        session.switch_source(&second).await.unwrap();
        assert_eq!(session.progress(), 0);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(session.progress(), 0);
        assert_eq!(session.state(), PlaybackState::Playing);
        session.stop();
    }

    #[tokio::test]
    async fn status_updates_can_be_polled_in_place() {
        let (_tx, rx) = mpsc::channel::<String>(16);
        let session = WaterfallSession::live(rx, fast_config(3)).await.unwrap();
        let mut updates = session.status_updates();

        session.seek(10);
        loop {
            match updates.next().await {
                Some(StatusEvent::Error(message)) => {
                    assert!(message.contains("seek"));
                    break;
                }
                Some(_) => continue,
                None => panic!("status stream ended"),
            }
        }
        session.stop();
    }

    #[tokio::test]
    async fn live_session_scrolls_and_finishes_on_close() {
        let (tx, rx) = mpsc::channel(16);
        let session = WaterfallSession::live(rx, fast_config(3)).await.unwrap();
        let frames = session.frames();

        tx.send(encode_record(&[100, 200])).await.unwrap();
        let frame = frames.next_frame().await.unwrap();
        assert_eq!(frame.height, 2);

        drop(tx);
        assert_eq!(session.wait_finished().await, PlaybackState::Finished);
    }

    #[tokio::test]
    async fn live_seek_reports_an_error() {
        let (_tx, rx) = mpsc::channel::<String>(16);
        let session = WaterfallSession::live(rx, fast_config(3)).await.unwrap();
        let mut status = session.status();

        session.seek(10);
        loop {
            if let StatusEvent::Error(message) = status.recv().await.unwrap() {
                assert!(message.contains("seek"));
                break;
            }
        }
        session.stop();
        assert_eq!(session.wait_finished().await, PlaybackState::Aborted);
    }
}
