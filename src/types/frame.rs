//! Waterfall frame types

use serde::{Deserialize, Serialize};

/// One colour-mapped pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Build a pixel from its components
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Background colour used for slots no packet has written
    pub const BACKGROUND: Rgb = Rgb::new(0, 0, 0);
}

/// Visible slice of the waterfall
///
/// Frames are the unit that flows through the bounded frame queue. Pixels are
/// copied out of the sample cache, so a frame never aliases producer state.
/// Layout is row-major: one row per sample slot, one column per packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Number of packet columns in the frame
    pub width: usize,

    /// Number of sample slots (rows) in the frame
    pub height: usize,

    /// Row-major pixel data, `width * height` entries
    pub pixels: Vec<Rgb>,

    /// Cache column the frame starts at
    pub position: usize,

    /// Monotonic frame counter assigned by the producer
    pub tick: u64,
}

impl Frame {
    /// Create a frame from row-major pixels
    pub fn new(width: usize, height: usize, pixels: Vec<Rgb>, position: usize) -> Self {
        debug_assert_eq!(pixels.len(), width * height);
        Self { width, height, pixels, position, tick: 0 }
    }

    /// Create a frame filled with the background colour
    pub fn blank(width: usize, height: usize) -> Self {
        Self::new(width, height, vec![Rgb::BACKGROUND; width * height], 0)
    }

    /// Pixel at `(row, column)`, if inside the frame
    pub fn pixel(&self, row: usize, column: usize) -> Option<Rgb> {
        if row >= self.height || column >= self.width {
            return None;
        }
        self.pixels.get(row * self.width + column).copied()
    }

    /// One row (sample slot) across all columns
    pub fn row(&self, row: usize) -> Option<&[Rgb]> {
        if row >= self.height {
            return None;
        }
        let start = row * self.width;
        self.pixels.get(start..start + self.width)
    }

    /// Packed `RGB888` bytes, row-major, for handing to a rendering surface
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|px| [px.r, px.g, px.b]).collect()
    }
}
