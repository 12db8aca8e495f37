//! Producer throughput measurement

use std::time::Instant;

/// Counts produced frames and reports a rate every `window` frames
///
/// Observability only: the monitor never feeds back into the producer loop.
#[derive(Debug, Clone)]
pub struct ThroughputMonitor {
    window: u32,
    count: u32,
    window_start: Option<Instant>,
    last_fps: Option<f64>,
}

impl ThroughputMonitor {
    /// Monitor reporting every `window` frames (at least one)
    pub fn new(window: u32) -> Self {
        Self { window: window.max(1), count: 0, window_start: None, last_fps: None }
    }

    /// Record a frame produced now
    pub fn record(&mut self) -> Option<f64> {
        self.record_at(Instant::now())
    }

    /// Record a frame produced at `now`
    ///
    /// The first call only opens the measurement window. Returns the rate when
    /// a window of `window` frames completes.
    pub fn record_at(&mut self, now: Instant) -> Option<f64> {
        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            return None;
        };

        self.count += 1;
        if self.count < self.window {
            return None;
        }

        let elapsed = now.duration_since(start).as_secs_f64();
        self.count = 0;
        self.window_start = Some(now);
        if elapsed <= 0.0 {
            return None;
        }

        let fps = f64::from(self.window) / elapsed;
        self.last_fps = Some(fps);
        Some(fps)
    }

    /// Most recent measurement
    pub fn last_fps(&self) -> Option<f64> {
        self.last_fps
    }
}
