//! Sonar packet records: wire format decoding and log file loading

pub mod format;
pub mod reader;

pub use format::{decode_record, encode_record};
pub use reader::PacketLogReader;
