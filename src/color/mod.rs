//! Intensity to colour mapping
//!
//! A [`ColorTable`] holds `N` ordered colours plus one overflow entry, so any
//! bucket in `[0, N]` is a valid index. A [`ColorPolicy`] decides how a raw
//! echo intensity becomes a bucket:
//!
//! - [`ColorPolicy::FixedThreshold`]: intensities above an additive threshold
//!   are spread linearly over `N` buckets of width `max_intensity / N`.
//! - [`ColorPolicy::DynamicGain`]: the threshold follows the running maximum
//!   intensity; `gain` is the percentage of that maximum mapped onto the table.
//!
//! The two policies read "gain" differently, so [`ColorMapper::set_gain`]
//! interprets its argument according to the active policy.
//!
//! ```rust
//! use sonar_waterfall::color::{ColorMapper, ColorPolicy, ColorTable};
//!
//! let mut mapper = ColorMapper::new(ColorTable::default(), ColorPolicy::DynamicGain { gain: 100.0 });
//! mapper.observe(4000);
//! assert_eq!(mapper.bucket(4000), 16); // overflow entry
//! assert_eq!(mapper.bucket(0), 0);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::types::Rgb;

/// Number of regular (non-overflow) levels in the default table
pub const DEFAULT_LEVELS: usize = 16;

/// Ordered colour levels plus an overflow entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
    /// `levels + 1` entries; the last one is the overflow colour
    entries: Vec<Rgb>,
}

impl ColorTable {
    /// Build a table from its regular levels and an overflow colour
    ///
    /// An empty `levels` list yields a table where every bucket is the overflow colour.
    pub fn new(levels: Vec<Rgb>, overflow: Rgb) -> Self {
        let mut entries = levels;
        entries.push(overflow);
        Self { entries }
    }

    /// Number of regular levels (`N`)
    pub fn levels(&self) -> usize {
        self.entries.len() - 1
    }

    /// Colour for a bucket; buckets above `N` clamp to the overflow entry
    pub fn lookup(&self, bucket: usize) -> Rgb {
        self.entries[bucket.min(self.levels())]
    }

    /// All entries, overflow last
    pub fn entries(&self) -> &[Rgb] {
        &self.entries
    }
}

impl Default for ColorTable {
    /// Echo-sounder ramp: deep blue through cyan and yellow to red, white overflow
    fn default() -> Self {
        const LEVELS: [Rgb; DEFAULT_LEVELS] = [
            Rgb::new(0, 0, 32),
            Rgb::new(0, 0, 96),
            Rgb::new(0, 0, 160),
            Rgb::new(0, 48, 224),
            Rgb::new(0, 112, 255),
            Rgb::new(0, 176, 255),
            Rgb::new(0, 240, 240),
            Rgb::new(0, 255, 160),
            Rgb::new(64, 255, 64),
            Rgb::new(160, 255, 0),
            Rgb::new(240, 240, 0),
            Rgb::new(255, 192, 0),
            Rgb::new(255, 128, 0),
            Rgb::new(255, 64, 0),
            Rgb::new(224, 0, 0),
            Rgb::new(160, 0, 0),
        ];
        Self::new(LEVELS.to_vec(), Rgb::new(255, 255, 255))
    }
}

/// Bucket selection policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ColorPolicy {
    /// Linear buckets above an additive threshold, clamped to `[0, N-1]`
    FixedThreshold { threshold: u16, max_intensity: u16 },

    /// Threshold at `gain` percent below the running maximum, clamped to `[0, N]`
    DynamicGain { gain: f32 },
}

impl Default for ColorPolicy {
    fn default() -> Self {
        ColorPolicy::FixedThreshold { threshold: 0, max_intensity: u16::MAX }
    }
}

/// Stateful mapper from intensities to colours
///
/// Tracks the running maximum intensity for the dynamic-gain policy. One mapper
/// is used per source so the maximum never leaks across sources.
#[derive(Debug, Clone)]
pub struct ColorMapper {
    table: Arc<ColorTable>,
    policy: ColorPolicy,
    running_max: u16,
}

impl ColorMapper {
    /// Create a mapper
    pub fn new(table: impl Into<Arc<ColorTable>>, policy: ColorPolicy) -> Self {
        Self { table: table.into(), policy, running_max: 0 }
    }

    /// Active policy
    pub fn policy(&self) -> ColorPolicy {
        self.policy
    }

    /// Colour table in use
    pub fn table(&self) -> &ColorTable {
        &self.table
    }

    /// Largest intensity observed so far
    pub fn running_max(&self) -> u16 {
        self.running_max
    }

    /// Fold an intensity into the running maximum
    pub fn observe(&mut self, intensity: u16) {
        self.running_max = self.running_max.max(intensity);
    }

    /// Apply a gain value, interpreted by the active policy
    ///
    /// Fixed-threshold treats it as the additive threshold, dynamic-gain as a
    /// percentage. Values are clamped; non-finite values are ignored. Returns
    /// the value actually applied.
    pub fn set_gain(&mut self, value: f32) -> f32 {
        if !value.is_finite() {
            return self.gain();
        }
        match &mut self.policy {
            ColorPolicy::FixedThreshold { threshold, max_intensity } => {
                *threshold = value.clamp(0.0, f32::from(*max_intensity)) as u16;
            }
            ColorPolicy::DynamicGain { gain } => {
                *gain = value.clamp(0.0, 100.0);
            }
        }
        debug!("Colour gain set to {}", self.gain());
        self.gain()
    }

    /// Current gain as understood by the active policy
    pub fn gain(&self) -> f32 {
        match self.policy {
            ColorPolicy::FixedThreshold { threshold, .. } => f32::from(threshold),
            ColorPolicy::DynamicGain { gain } => gain,
        }
    }

    /// Bucket index for an intensity, always within `[0, N]`
    pub fn bucket(&self, intensity: u16) -> usize {
        self.bucket_against(intensity, self.running_max)
    }

    /// Bucket index as if `running_max` had been observed
    ///
    /// Only the dynamic-gain policy reads the maximum.
    pub fn bucket_against(&self, intensity: u16, running_max: u16) -> usize {
        let levels = self.table.levels();
        let n = levels as f64;
        let intensity = f64::from(intensity);

        match self.policy {
            ColorPolicy::FixedThreshold { threshold, max_intensity } => {
                let threshold = f64::from(threshold);
                let width = f64::from(max_intensity) / n;
                if width <= 0.0 || intensity <= threshold {
                    return 0;
                }
                let bucket = ((intensity - threshold) / width).floor() as usize;
                bucket.min(levels.saturating_sub(1))
            }
            ColorPolicy::DynamicGain { gain } => {
                let max = f64::from(running_max);
                let denom = max * f64::from(gain) / 100.0;
                let threshold = max - denom;
                if denom <= 0.0 || intensity <= threshold {
                    return 0;
                }
                let bucket = ((intensity - threshold) / denom * n).floor() as usize;
                bucket.min(levels)
            }
        }
    }

    /// Colour for an intensity under the current running maximum
    pub fn color(&self, intensity: u16) -> Rgb {
        self.table.lookup(self.bucket(intensity))
    }

    /// Colour for an intensity under an explicit running maximum
    pub fn color_against(&self, intensity: u16, running_max: u16) -> Rgb {
        self.table.lookup(self.bucket_against(intensity, running_max))
    }

    /// Colour a whole record
    ///
    /// The record's own maximum is folded into the running maximum first, so
    /// the strongest echo of the first record already reaches the top bucket.
    pub fn map_record(&mut self, samples: &[u16]) -> Vec<Rgb> {
        if let Some(&max) = samples.iter().max() {
            self.observe(max);
        }
        samples.iter().map(|&sample| self.color(sample)).collect()
    }
}
