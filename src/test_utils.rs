//! Test utilities for synthesising packet logs
//!
//! Real survey logs are large and not redistributable, so tests and benches
//! build records with a deterministic echo pattern instead.

#![cfg(any(test, feature = "benchmark"))]

use std::path::{Path, PathBuf};

use crate::packet::encode_record;

/// Deterministic sample values for one record
///
/// A bright "bottom" echo moves slowly down the column while the rest of the
/// slots carry low-level noise, which is close enough to a real echogram to
/// exercise every colour bucket.
pub fn synthetic_samples(index: usize, slots: usize) -> Vec<u16> {
    let bottom = if slots == 0 { 0 } else { (slots / 2 + index / 8) % slots };
    (0..slots)
        .map(|slot| {
            if slot == bottom {
                u16::MAX - (index % 512) as u16
            } else {
                let noise = (slot * 131 + index * 17) % 2048;
                (noise as u16).wrapping_mul(4)
            }
        })
        .collect()
}

/// `count` encoded records with `slots` samples each
pub fn synthetic_records(count: usize, slots: usize) -> Vec<String> {
    (0..count).map(|index| encode_record(&synthetic_samples(index, slots))).collect()
}

/// Write records to `dir/name`, one per line, and return the path
pub fn write_packet_log(dir: &Path, name: &str, records: &[String]) -> std::io::Result<PathBuf> {
    let path = dir.join(name);
    let mut text = records.join("\n");
    text.push('\n');
    std::fs::write(&path, text)?;
    Ok(path)
}
