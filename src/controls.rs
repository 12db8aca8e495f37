//! Runtime playback controls shared between the session and its producer
//!
//! Every control is a lock-free atomic (or a cancellation token) written by
//! the coordinating side and polled by the producer once per tick. Values are
//! clamped on write, so callers can issue any control at any time.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const NONE: u64 = u64::MAX;

/// Control block for one producer
#[derive(Debug)]
pub struct PlaybackControls {
    cancel: CancellationToken,
    paused: AtomicBool,
    speed: AtomicUsize,
    max_speed: usize,
    pending_seek: AtomicU64,
    pending_gain: AtomicU64,
}

impl PlaybackControls {
    /// Controls starting unpaused at `speed` (clamped to `max_speed`)
    pub fn new(speed: usize, max_speed: usize) -> Self {
        Self {
            cancel: CancellationToken::new(),
            paused: AtomicBool::new(false),
            speed: AtomicUsize::new(speed.min(max_speed)),
            max_speed,
            pending_seek: AtomicU64::new(NONE),
            pending_gain: AtomicU64::new(NONE),
        }
    }

    /// Request a cooperative stop
    pub fn stop(&self) {
        debug!("Stop requested");
        self.cancel.cancel();
    }

    /// Whether a stop was requested
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token the producer selects on while sleeping or pushing
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Pause or resume
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    /// Flip pause state; returns the new value
    pub fn toggle_paused(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::Relaxed)
    }

    /// Whether playback should hold its position
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Set columns advanced per tick; returns the clamped value
    pub fn set_speed(&self, speed: usize) -> usize {
        let speed = speed.min(self.max_speed);
        self.speed.store(speed, Ordering::Relaxed);
        speed
    }

    /// Columns advanced per tick
    pub fn speed(&self) -> usize {
        self.speed.load(Ordering::Relaxed)
    }

    /// Upper bound for [`PlaybackControls::set_speed`]
    pub fn max_speed(&self) -> usize {
        self.max_speed
    }

    /// Queue a seek; a later request before the next tick replaces it
    pub fn request_seek(&self, progress: u32) {
        self.pending_seek.store(u64::from(progress), Ordering::Relaxed);
    }

    /// Take the pending seek, if any
    pub fn take_seek(&self) -> Option<u32> {
        match self.pending_seek.swap(NONE, Ordering::Relaxed) {
            NONE => None,
            progress => Some(progress as u32),
        }
    }

    /// Queue a gain change; non-finite values are dropped
    pub fn request_gain(&self, gain: f32) {
        if gain.is_finite() {
            self.pending_gain.store(u64::from(gain.to_bits()), Ordering::Relaxed);
        }
    }

    /// Take the pending gain change, if any
    pub fn take_gain(&self) -> Option<f32> {
        match self.pending_gain.swap(NONE, Ordering::Relaxed) {
            NONE => None,
            bits => Some(f32::from_bits(bits as u32)),
        }
    }
}
