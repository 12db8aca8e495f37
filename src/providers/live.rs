//! Live provider for streamed packet records
//!
//! A live source is any channel of record strings (one datagram per item),
//! typically fed by a socket reader outside this crate. The total length is
//! unknown, so progress reporting and seeking are unavailable. Incoming
//! records are coloured on arrival and kept in a rolling window of the most
//! recent `window_width` columns.

use std::collections::VecDeque;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info, trace};

use crate::color::ColorMapper;
use crate::packet::decode_record;
use crate::provider::{Provider, Step};
use crate::types::{Frame, PlaybackState, Rgb};
use crate::{Result, WaterfallConfig, WaterfallError};

/// Live provider that scrolls as records arrive
pub struct LiveProvider {
    /// Incoming records
    source: mpsc::Receiver<String>,

    /// Colour mapper; gain changes apply to the next record
    mapper: ColorMapper,

    /// Most recent columns, oldest first
    columns: VecDeque<Vec<Rgb>>,

    window_width: usize,
    max_sample_slots: usize,

    /// Tallest column seen so far (capped)
    rows: usize,

    /// Records received, including skipped ones
    received: usize,

    /// Columns added since the last emitted frame
    dirty: bool,

    paused: bool,
    closed: bool,
}

impl LiveProvider {
    /// Create a live provider reading from `source`
    pub fn new(source: mpsc::Receiver<String>, config: &WaterfallConfig, mapper: ColorMapper) -> Result<Self> {
        if config.window_width == 0 {
            return Err(WaterfallError::invalid_configuration(
                "window_width",
                "must be greater than zero",
            ));
        }
        info!("Live source attached (window {} columns)", config.window_width);
        Ok(Self {
            source,
            mapper,
            columns: VecDeque::with_capacity(config.window_width),
            window_width: config.window_width,
            max_sample_slots: config.max_sample_slots,
            rows: 0,
            received: 0,
            dirty: false,
            paused: false,
            closed: false,
        })
    }

    /// Records received so far
    pub fn received(&self) -> usize {
        self.received
    }

    fn push_record(&mut self, record: &str) -> Result<()> {
        self.received += 1;
        let samples = decode_record(record).map_err(|e| e.at_line(self.received))?;
        let samples = &samples[..samples.len().min(self.max_sample_slots)];

        self.rows = self.rows.max(samples.len());
        if self.columns.len() == self.window_width {
            self.columns.pop_front();
        }
        self.columns.push_back(self.mapper.map_record(samples));
        self.dirty = true;
        Ok(())
    }

    fn frame(&self) -> Frame {
        let width = self.window_width;
        let mut pixels = vec![Rgb::BACKGROUND; width * self.rows];
        for (column, colors) in self.columns.iter().enumerate() {
            for (row, color) in colors.iter().enumerate() {
                pixels[row * width + column] = *color;
            }
        }
        Frame::new(width, self.rows, pixels, self.received - self.columns.len())
    }
}

#[async_trait::async_trait]
impl Provider for LiveProvider {
    async fn next_step(&mut self, _speed: usize) -> Result<Step> {
        if self.paused {
            return Ok(Step::Idle);
        }

        // Live data is never held back: drain whatever has arrived.
        while !self.closed {
            match self.source.try_recv() {
                Ok(record) => self.push_record(&record)?,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("Live source closed after {} records", self.received);
                    self.closed = true;
                }
            }
        }

        if self.dirty {
            self.dirty = false;
            trace!("Live frame ending at record {}", self.received);
            return Ok(Step::Frame { frame: self.frame(), progress: None });
        }

        Ok(if self.closed { Step::Finished } else { Step::Idle })
    }

    fn seek(&mut self, _progress: u32) -> Result<usize> {
        let state = if self.paused { PlaybackState::Paused } else { PlaybackState::Playing };
        Err(WaterfallError::invalid_state("seek a live stream", state))
    }

    fn set_gain(&mut self, gain: f32) -> f32 {
        let applied = self.mapper.set_gain(gain);
        debug!("Live gain set to {}", applied);
        applied
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn progress_granularity(&self) -> Option<u32> {
        None
    }
}
