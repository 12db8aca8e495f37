//! Sample cache for file playback
//!
//! The cache is a bounded 2D grid of decoded intensities: one column per
//! packet, one row per sample slot. It is built once per source. Cells are
//! coloured when a window is copied out, so a gain change recolours the next
//! frame without decoding the log again.
//!
//! ## Capacity
//!
//! At most `column_capacity` records are considered and `min(records, capacity) - 1`
//! columns are populated. Rows are capped at `max_sample_slots`; samples past
//! the cap are dropped, and slots a short record does not reach stay at the
//! background colour.
//!
//! ## Running maximum
//!
//! Each column keeps the running maximum as it stood after its own record, so
//! dynamic gain colours a column exactly as a front-to-back pass would.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::color::{ColorMapper, ColorTable};
use crate::packet::format::decode_record;
use crate::types::{Frame, Rgb, StatusEvent};
use crate::{Result, WaterfallConfig, WaterfallError};

/// Decoded samples of one source
#[derive(Debug, Clone)]
pub struct SampleCache {
    rows: usize,
    columns: usize,
    /// Row-major, `rows * columns`
    samples: Vec<u16>,
    /// Slots each column's record filled; 0 for skipped records
    filled: Vec<usize>,
    /// Running maximum after each column's record
    running_max: Vec<u16>,
    mapper: ColorMapper,
    progress_granularity: u32,
    columns_per_progress_step: usize,
    skipped_records: usize,
}

impl SampleCache {
    /// Populated packet columns (`total_line_num`)
    pub fn total_columns(&self) -> usize {
        self.columns
    }

    /// Sample slots per column
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Progress steps the cache was built for
    pub fn progress_granularity(&self) -> u32 {
        self.progress_granularity
    }

    /// Columns per progress step (`total_columns / progress_granularity`)
    pub fn columns_per_progress_step(&self) -> usize {
        self.columns_per_progress_step
    }

    /// Records left blank because they could not be decoded
    pub fn skipped_records(&self) -> usize {
        self.skipped_records
    }

    /// Change the gain used for every later window; returns the clamped value
    pub fn set_gain(&mut self, gain: f32) -> f32 {
        self.mapper.set_gain(gain)
    }

    pub fn gain(&self) -> f32 {
        self.mapper.gain()
    }

    /// Decoded intensity at `(row, column)`, `None` for unfilled slots
    pub fn intensity(&self, row: usize, column: usize) -> Option<u16> {
        if row >= self.rows || column >= self.columns || row >= self.filled[column] {
            return None;
        }
        self.samples.get(row * self.columns + column).copied()
    }

    /// Pixel at `(row, column)`
    pub fn pixel(&self, row: usize, column: usize) -> Option<Rgb> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        Some(self.color_at(row, column))
    }

    fn color_at(&self, row: usize, column: usize) -> Rgb {
        match self.intensity(row, column) {
            Some(intensity) => self.mapper.color_against(intensity, self.running_max[column]),
            None => Rgb::BACKGROUND,
        }
    }

    /// Copy `width` columns starting at `start` into a new frame
    ///
    /// Columns past the end of the cache are background.
    pub fn window(&self, start: usize, width: usize) -> Frame {
        let mut pixels = Vec::with_capacity(self.rows * width);
        let start = start.min(self.columns);
        let end = start.saturating_add(width).min(self.columns);
        let pad = width - (end - start);

        for row in 0..self.rows {
            pixels.extend((start..end).map(|column| self.color_at(row, column)));
            pixels.extend(std::iter::repeat_n(Rgb::BACKGROUND, pad));
        }

        Frame::new(width, self.rows, pixels, start)
    }
}

/// Builds a [`SampleCache`] from packet records
pub struct CacheBuilder {
    column_capacity: usize,
    max_sample_slots: usize,
    progress_granularity: u32,
    abort_on_malformed: bool,
    mapper: ColorMapper,
}

impl CacheBuilder {
    /// Builder using the capacities and colour policy from `config`
    pub fn new(config: &WaterfallConfig, table: Arc<ColorTable>) -> Self {
        Self::from_mapper(config, ColorMapper::new(table, config.color))
    }

    /// Builder with an explicit mapper, e.g. one carrying a runtime gain
    pub fn from_mapper(config: &WaterfallConfig, mapper: ColorMapper) -> Self {
        Self {
            column_capacity: config.column_capacity,
            max_sample_slots: config.max_sample_slots,
            progress_granularity: config.progress_granularity,
            abort_on_malformed: config.abort_on_malformed,
            mapper,
        }
    }

    /// Decode and store `records`
    ///
    /// `notify` receives advisory status events: load progress every 10% and
    /// one event per skipped record.
    pub fn build<F>(mut self, records: &[String], mut notify: F) -> Result<SampleCache>
    where
        F: FnMut(StatusEvent),
    {
        if self.progress_granularity == 0 {
            return Err(WaterfallError::invalid_configuration(
                "progress_granularity",
                "must be greater than zero",
            ));
        }
        if self.column_capacity == 0 || self.max_sample_slots == 0 {
            return Err(WaterfallError::invalid_configuration(
                "column_capacity",
                "cache capacities must be greater than zero",
            ));
        }

        let columns = records.len().min(self.column_capacity).saturating_sub(1);
        let retained = &records[..columns];
        if records.len() > self.column_capacity {
            warn!(
                "Source has {} records, keeping the first {} columns",
                records.len(),
                columns
            );
        }

        let mut decoded = Vec::with_capacity(columns);
        let mut skipped_records = 0usize;
        let mut last_decile = 0usize;

        for (column, record) in retained.iter().enumerate() {
            match decode_record(record) {
                Ok(samples) => decoded.push(Some(samples)),
                Err(e) => {
                    let e = e.at_line(column + 1);
                    if self.abort_on_malformed {
                        return Err(e);
                    }
                    warn!("Skipping record {}: {}", column + 1, e);
                    skipped_records += 1;
                    decoded.push(None);
                    if let WaterfallError::MalformedRecord { line, reason } = e {
                        notify(StatusEvent::RecordSkipped { line, reason });
                    }
                }
            }

            let decile = (column + 1) * 10 / columns;
            if decile > last_decile {
                last_decile = decile;
                notify(StatusEvent::Loading { percent: (decile * 10) as u8 });
            }
        }

        // only records that decoded decide the height
        let rows = decoded
            .iter()
            .flatten()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .min(self.max_sample_slots);

        let columns_per_progress_step = columns / self.progress_granularity as usize;
        debug!(
            "Building sample cache: {} columns x {} rows, {} columns per progress step",
            columns, rows, columns_per_progress_step
        );

        let mut samples = vec![0u16; rows * columns];
        let mut filled = vec![0usize; columns];
        let mut running_max = vec![0u16; columns];

        for (column, record) in decoded.into_iter().enumerate() {
            if let Some(record) = record {
                let kept = &record[..record.len().min(rows)];
                if let Some(&max) = kept.iter().max() {
                    self.mapper.observe(max);
                }
                for (row, &sample) in kept.iter().enumerate() {
                    samples[row * columns + column] = sample;
                }
                filled[column] = kept.len();
            }
            running_max[column] = self.mapper.running_max();
        }

        info!(
            "Sample cache ready: {} columns, {} rows, {} skipped",
            columns, rows, skipped_records
        );

        Ok(SampleCache {
            rows,
            columns,
            samples,
            filled,
            running_max,
            mapper: self.mapper,
            progress_granularity: self.progress_granularity,
            columns_per_progress_step,
            skipped_records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorPolicy;
    use crate::packet::encode_record;
    use crate::test_utils::synthetic_records;

    fn builder(config: &WaterfallConfig) -> CacheBuilder {
        CacheBuilder::new(config, Arc::new(ColorTable::default()))
    }

    #[test]
    fn populates_one_less_than_record_count() {
        let config = WaterfallConfig::default();
        let records = synthetic_records(11, 4);
        let cache = builder(&config).build(&records, |_| {}).unwrap();

        assert_eq!(cache.total_columns(), 10);
        assert_eq!(cache.rows(), 4);
        assert_eq!(cache.columns_per_progress_step(), 0);
    }

    #[test]
    fn capacity_caps_columns() {
        let config = WaterfallConfig { column_capacity: 50, ..Default::default() };
        let records = synthetic_records(120, 3);
        let cache = builder(&config).build(&records, |_| {}).unwrap();
        assert_eq!(cache.total_columns(), 49);
    }

    #[test]
    fn progress_step_is_floor_of_columns_over_granularity() {
        let config = WaterfallConfig { progress_granularity: 10, ..Default::default() };
        let records = synthetic_records(236, 2);
        let cache = builder(&config).build(&records, |_| {}).unwrap();
        assert_eq!(cache.total_columns(), 235);
        assert_eq!(cache.columns_per_progress_step(), 23);
    }

    #[test]
    fn zero_granularity_is_invalid() {
        let config = WaterfallConfig { progress_granularity: 0, ..Default::default() };
        let err = builder(&config).build(&synthetic_records(5, 2), |_| {}).unwrap_err();
        assert!(matches!(err, WaterfallError::InvalidConfiguration { .. }));
    }

    #[test]
    fn short_records_leave_background_slots() {
        let config = WaterfallConfig::default();
        let records = vec![
            encode_record(&[u16::MAX, u16::MAX, u16::MAX]),
            encode_record(&[u16::MAX]),
            encode_record(&[0]),
        ];
        let cache = builder(&config).build(&records, |_| {}).unwrap();

        assert_eq!(cache.rows(), 3);
        assert_eq!(cache.total_columns(), 2);
        let top = ColorTable::default().lookup(15);
        assert_eq!(cache.pixel(2, 0), Some(top));
        assert_eq!(cache.pixel(0, 1), Some(top));
        assert_eq!(cache.pixel(1, 1), Some(Rgb::BACKGROUND));
        assert_eq!(cache.pixel(2, 1), Some(Rgb::BACKGROUND));
    }

    #[test]
    fn rows_are_capped() {
        let config = WaterfallConfig { max_sample_slots: 2, ..Default::default() };
        let records = synthetic_records(4, 10);
        let cache = builder(&config).build(&records, |_| {}).unwrap();
        assert_eq!(cache.rows(), 2);
    }

    #[test]
    fn malformed_records_are_skipped_and_reported() {
        let config = WaterfallConfig::default();
        let mut records = synthetic_records(5, 2);
        records[1] = "0000000000000400ZZ".to_string();

        let mut events = Vec::new();
        let cache = builder(&config).build(&records, |e| events.push(e)).unwrap();

        assert_eq!(cache.skipped_records(), 1);
        assert_eq!(cache.pixel(0, 1), Some(Rgb::BACKGROUND));
        assert!(events.iter().any(|e| matches!(e, StatusEvent::RecordSkipped { line: Some(2), .. })));
    }

    #[test]
    fn malformed_records_abort_when_configured() {
        let config = WaterfallConfig { abort_on_malformed: true, ..Default::default() };
        let mut records = synthetic_records(5, 2);
        records[2] = "garbage".to_string();
        let err = builder(&config).build(&records, |_| {}).unwrap_err();
        assert!(matches!(err, WaterfallError::MalformedRecord { line: Some(3), .. }));
    }

    #[test]
    fn load_progress_is_reported_in_tenths() {
        let config = WaterfallConfig::default();
        let records = synthetic_records(101, 1);
        let mut percents = Vec::new();
        builder(&config)
            .build(&records, |e| {
                if let StatusEvent::Loading { percent } = e {
                    percents.push(percent);
                }
            })
            .unwrap();
        assert_eq!(percents, vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
    }

    #[test]
    fn dynamic_gain_uses_running_max_across_records() {
        let config = WaterfallConfig {
            color: ColorPolicy::DynamicGain { gain: 100.0 },
            ..Default::default()
        };
        let records = vec![encode_record(&[100]), encode_record(&[200, 100]), encode_record(&[0])];
        let cache = builder(&config).build(&records, |_| {}).unwrap();
        let table = ColorTable::default();

        // first record is its own maximum
        assert_eq!(cache.pixel(0, 0), Some(table.lookup(16)));
        // 100 against a running max of 200 lands half way
        assert_eq!(cache.pixel(1, 1), Some(table.lookup(8)));
    }

    #[test]
    fn rows_ignore_headers_of_undecodable_records() {
        let config = WaterfallConfig::default();
        let mut records = synthetic_records(6, 2);
        // declares 0xFFFF samples, carries one
        records[2] = "000000000000FFFF0100".to_string();

        let cache = builder(&config).build(&records, |_| {}).unwrap();
        assert_eq!(cache.rows(), 2);
        assert_eq!(cache.skipped_records(), 1);
        assert_eq!(cache.window(0, 5).pixels.len(), 10);
    }

    #[test]
    fn gain_change_recolours_cached_windows() {
        let config = WaterfallConfig {
            color: ColorPolicy::FixedThreshold { threshold: 0, max_intensity: u16::MAX },
            ..Default::default()
        };
        let records = vec![encode_record(&[40_000]), encode_record(&[40_000]), encode_record(&[0])];
        let mut cache = builder(&config).build(&records, |_| {}).unwrap();
        let table = ColorTable::default();

        let before = cache.window(0, 2);
        assert_eq!(before.pixel(0, 0), Some(table.lookup(9)));
        assert_eq!(cache.intensity(0, 0), Some(40_000));

        assert_eq!(cache.set_gain(40_000.0), 40_000.0);
        let after = cache.window(0, 2);
        assert_eq!(after.pixel(0, 0), Some(table.lookup(0)));
        assert_eq!(after.pixel(0, 1), Some(table.lookup(0)));
        assert_eq!(cache.gain(), 40_000.0);
    }

    #[test]
    fn dynamic_gain_change_keeps_per_column_maximum() {
        let config = WaterfallConfig {
            color: ColorPolicy::DynamicGain { gain: 100.0 },
            ..Default::default()
        };
        let records = vec![encode_record(&[100]), encode_record(&[200, 100]), encode_record(&[0])];
        let mut cache = builder(&config).build(&records, |_| {}).unwrap();
        let table = ColorTable::default();

        // threshold 150 against the maximum of 200 seen by column 1
        cache.set_gain(25.0);
        assert_eq!(cache.pixel(1, 1), Some(table.lookup(0)));
        // column 0 only saw 100, so 100 still lands on top
        assert_eq!(cache.pixel(0, 0), Some(table.lookup(16)));
    }

    #[test]
    fn window_pads_past_the_end() {
        let config = WaterfallConfig::default();
        let records = synthetic_records(6, 2);
        let cache = builder(&config).build(&records, |_| {}).unwrap();

        let frame = cache.window(3, 4);
        assert_eq!(frame.width, 4);
        assert_eq!(frame.height, 2);
        assert_eq!(frame.position, 3);
        assert_eq!(frame.pixel(0, 0), cache.pixel(0, 3));
        assert_eq!(frame.pixel(0, 1), cache.pixel(0, 4));
        assert_eq!(frame.pixel(0, 2), Some(Rgb::BACKGROUND));
        assert_eq!(frame.pixel(1, 3), Some(Rgb::BACKGROUND));
    }

    #[test]
    fn empty_source_builds_empty_cache() {
        let cache = builder(&WaterfallConfig::default()).build(&[], |_| {}).unwrap();
        assert_eq!(cache.total_columns(), 0);
        assert_eq!(cache.window(0, 3).pixels.len(), 0);
    }
}
