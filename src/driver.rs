//! Driver spawns and runs the frame producer task

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, trace, warn};

use crate::controls::PlaybackControls;
use crate::monitor::ThroughputMonitor;
use crate::provider::{Provider, Step};
use crate::types::{Frame, PlaybackState, StatusEvent};

/// Observer channels a producer publishes to
///
/// Shared between the session (which reports loading) and the producer task.
#[derive(Debug)]
pub struct Sinks {
    state: watch::Sender<PlaybackState>,
    progress: watch::Sender<u32>,
    throughput: watch::Sender<Option<f64>>,
    status: broadcast::Sender<StatusEvent>,
}

impl Sinks {
    /// Create sinks; `status_capacity` bounds each status observer's backlog
    pub fn new(status_capacity: usize) -> Self {
        let (state, _) = watch::channel(PlaybackState::Stopped);
        let (progress, _) = watch::channel(0);
        let (throughput, _) = watch::channel(None);
        let (status, _) = broadcast::channel(status_capacity.max(1));
        Self { state, progress, throughput, status }
    }

    /// Publish a state transition
    pub fn set_state(&self, state: PlaybackState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            info!("Playback {} -> {}", previous, state);
            self.status(StatusEvent::StateChanged(state));
        }
    }

    /// Publish a progress value
    pub fn progress(&self, value: u32) {
        self.progress.send_replace(value);
    }

    /// Publish a throughput measurement
    pub fn throughput(&self, fps: f64) {
        self.throughput.send_replace(Some(fps));
        self.status(StatusEvent::Throughput { fps });
    }

    /// Fire-and-forget status message
    pub fn status(&self, event: StatusEvent) {
        // No subscribers is fine.
        let _ = self.status.send(event);
    }

    /// Current state
    pub fn state(&self) -> PlaybackState {
        *self.state.borrow()
    }

    /// Watch state transitions; the receiver starts at the current state
    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.state.subscribe()
    }

    /// Watch progress steps in `[0, granularity]`
    pub fn subscribe_progress(&self) -> watch::Receiver<u32> {
        self.progress.subscribe()
    }

    /// Watch the latest frames-per-second figure, `None` until one is measured
    pub fn subscribe_throughput(&self) -> watch::Receiver<Option<f64>> {
        self.throughput.subscribe()
    }

    /// Receive status events sent after this call
    ///
    /// A receiver that falls more than the status capacity behind gets
    /// `Lagged` and skips ahead.
    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusEvent> {
        self.status.subscribe()
    }
}

/// Producer loop settings
#[derive(Debug, Clone, Copy)]
pub struct DriverSettings {
    /// Sleep between ticks
    pub frame_interval: Duration,
    /// Frames per throughput measurement
    pub throughput_window: u32,
}

/// Driver spawns the producer task for a provider
///
/// The producer owns the provider (and through it the sample cache and
/// playback position). Runtime controls are polled once per tick; frames are
/// pushed into the bounded queue, waiting while it is full.
pub struct Driver;

impl Driver {
    /// Spawn the producer task
    ///
    /// The task resolves to the terminal state it ended in.
    pub fn spawn<P>(
        provider: P,
        controls: Arc<PlaybackControls>,
        frames: mpsc::Sender<Frame>,
        sinks: Arc<Sinks>,
        settings: DriverSettings,
    ) -> JoinHandle<PlaybackState>
    where
        P: Provider,
    {
        tokio::spawn(Self::producer_task(provider, controls, frames, sinks, settings))
    }

    async fn producer_task<P>(
        mut provider: P,
        controls: Arc<PlaybackControls>,
        frames: mpsc::Sender<Frame>,
        sinks: Arc<Sinks>,
        settings: DriverSettings,
    ) -> PlaybackState
    where
        P: Provider,
    {
        info!("Producer task started ({:?} per tick)", settings.frame_interval);
        let cancel = controls.cancellation().clone();
        let mut ticker = interval(settings.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut monitor = ThroughputMonitor::new(settings.throughput_window);
        let mut speed = controls.speed();
        let mut paused = false;
        let mut frame_count = 0u64;

        sinks.set_state(PlaybackState::Playing);

        let final_state = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Producer cancelled");
                    break PlaybackState::Aborted;
                }
                _ = ticker.tick() => {}
            }

            let requested = controls.speed();
            if requested != speed {
                debug!("Speed {} -> {}", speed, requested);
                speed = requested;
                ticker.reset();
                sinks.status(StatusEvent::SpeedChanged(speed));
            }

            if let Some(gain) = controls.take_gain() {
                let applied = provider.set_gain(gain);
                sinks.status(StatusEvent::GainChanged(applied));
            }

            if let Some(progress) = controls.take_seek() {
                match provider.seek(progress) {
                    Ok(position) => {
                        sinks.progress(progress);
                        sinks.status(StatusEvent::Seeked { progress, position });
                    }
                    Err(e) => {
                        warn!("Seek rejected: {}", e);
                        sinks.status(StatusEvent::Error(e.to_string()));
                    }
                }
            }

            let want_pause = controls.is_paused();
            if want_pause != paused {
                paused = want_pause;
                if paused {
                    provider.pause();
                    sinks.set_state(PlaybackState::Paused);
                } else {
                    provider.resume();
                    sinks.set_state(PlaybackState::Playing);
                }
            }

            match provider.next_step(speed).await {
                Ok(Step::Frame { mut frame, progress }) => {
                    frame_count += 1;
                    frame.tick = frame_count;
                    trace!("Frame {} at column {}", frame_count, frame.position);

                    let sent = tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("Producer cancelled while the frame queue was full");
                            break PlaybackState::Aborted;
                        }
                        sent = frames.send(frame) => sent,
                    };
                    if sent.is_err() {
                        debug!("Frame receiver dropped, shutting down");
                        break PlaybackState::Aborted;
                    }

                    if let Some(value) = progress {
                        sinks.progress(value);
                    }
                    if let Some(fps) = monitor.record() {
                        debug!("Producing {:.1} frames/s", fps);
                        sinks.throughput(fps);
                    }
                }
                Ok(Step::Idle) => {}
                Ok(Step::Finished) => break PlaybackState::Finished,
                Err(e) if e.is_skippable() => {
                    warn!("Skipping: {}", e);
                    sinks.status(StatusEvent::Error(e.to_string()));
                }
                Err(e) => {
                    error!("Producer error: {}", e);
                    sinks.status(StatusEvent::Error(e.to_string()));
                    break PlaybackState::Aborted;
                }
            }
        };

        if final_state == PlaybackState::Finished {
            if let Some(granularity) = provider.progress_granularity() {
                sinks.progress(granularity);
            }
        }
        sinks.set_state(final_state);
        info!("Producer task ended ({} frames, {})", frame_count, final_state);
        final_state
    }
}
