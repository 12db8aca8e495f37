//! Sonar packet record format
//!
//! A record is one ASCII line (or one datagram) of hexadecimal text:
//!
//! ```text
//! chars  0..12   header, ignored by the decoder
//! chars 12..16   payload length, uint16 little-endian (low byte first)
//! chars 16..     payload_length samples, 4 hex chars each, uint16 little-endian
//! ```
//!
//! Every 16-bit field is written low byte first, so `"0200"` is 2 and
//! `"3412"` is `0x1234`.

use crate::{Result, WaterfallError};

/// Offset of the payload length field, in characters
pub const LENGTH_FIELD_OFFSET: usize = 12;

/// Offset of the first sample field, in characters
pub const PAYLOAD_OFFSET: usize = 16;

/// Characters per 16-bit field
pub const FIELD_WIDTH: usize = 4;

/// Decode one record into its sample intensities.
///
/// Trailing whitespace (including a CR from CRLF logs) is ignored, as is
/// anything past the declared payload.
pub fn decode_record(record: &str) -> Result<Vec<u16>> {
    let bytes = record.trim_end().as_bytes();

    if !bytes.is_ascii() {
        return Err(WaterfallError::malformed_record(None, "record contains non-ASCII text"));
    }
    if bytes.len() < PAYLOAD_OFFSET {
        return Err(WaterfallError::malformed_record(
            None,
            format!("record has {} chars, header needs {}", bytes.len(), PAYLOAD_OFFSET),
        ));
    }

    let payload_length = parse_u16_swapped(bytes, LENGTH_FIELD_OFFSET)? as usize;
    let required = PAYLOAD_OFFSET + payload_length * FIELD_WIDTH;
    if bytes.len() < required {
        return Err(WaterfallError::malformed_record(
            None,
            format!(
                "payload length {} needs {} chars, record has {}",
                payload_length,
                required,
                bytes.len()
            ),
        ));
    }

    (0..payload_length)
        .map(|slot| parse_u16_swapped(bytes, PAYLOAD_OFFSET + slot * FIELD_WIDTH))
        .collect()
}

/// Peek at the declared payload length without decoding samples.
pub fn payload_length(record: &str) -> Result<usize> {
    let bytes = record.as_bytes();
    if bytes.len() < PAYLOAD_OFFSET {
        return Err(WaterfallError::malformed_record(None, "record shorter than header"));
    }
    Ok(parse_u16_swapped(bytes, LENGTH_FIELD_OFFSET)? as usize)
}

/// Encode samples into a record with a zeroed header.
///
/// Inverse of [`decode_record`]; used to synthesise logs.
pub fn encode_record(samples: &[u16]) -> String {
    let mut out = String::with_capacity(PAYLOAD_OFFSET + samples.len() * FIELD_WIDTH);
    out.push_str(&"0".repeat(LENGTH_FIELD_OFFSET));
    push_u16_swapped(&mut out, samples.len() as u16);
    for &sample in samples {
        push_u16_swapped(&mut out, sample);
    }
    out
}

fn parse_u16_swapped(bytes: &[u8], offset: usize) -> Result<u16> {
    let field = bytes.get(offset..offset + FIELD_WIDTH).ok_or_else(|| {
        WaterfallError::malformed_record(None, format!("field at {offset} out of bounds"))
    })?;
    let low = parse_hex_byte(field[0], field[1], offset)?;
    let high = parse_hex_byte(field[2], field[3], offset + 2)?;
    Ok(u16::from(high) * 256 + u16::from(low))
}

fn parse_hex_byte(hi: u8, lo: u8, offset: usize) -> Result<u8> {
    let digit = |c: u8, at: usize| {
        (c as char).to_digit(16).ok_or_else(|| {
            WaterfallError::malformed_record(
                None,
                format!("non-hex character {:?} at {}", c as char, at),
            )
        })
    };
    Ok((digit(hi, offset)? * 16 + digit(lo, offset + 1)?) as u8)
}

fn push_u16_swapped(out: &mut String, value: u16) {
    let [low, high] = value.to_le_bytes();
    out.push_str(&format!("{low:02X}{high:02X}"));
}
