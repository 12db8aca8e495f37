//! Packet log reader
//!
//! Loads a logged text file of packet records into memory. Each non-empty
//! line is one record; decoding happens later, when the sample cache is built.
//! Lines that are not valid UTF-8 are kept (lossily converted) so the decoder
//! can reject them one at a time.
//!
//! ```rust,no_run
//! use sonar_waterfall::packet::PacketLogReader;
//!
//! fn count() -> sonar_waterfall::Result<()> {
//!     let reader = PacketLogReader::open("survey.txt")?;
//!     println!("{} records", reader.record_count());
//!     Ok(())
//! }
//! ```

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::{Result, WaterfallError};

/// In-memory packet log
#[derive(Debug, Clone)]
pub struct PacketLogReader {
    path: PathBuf,
    records: Vec<String>,
}

impl PacketLogReader {
    /// Read a packet log from disk
    ///
    /// Fails with [`WaterfallError::SourceUnavailable`] if the file is missing
    /// or a read fails.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_limited(path, usize::MAX)
    }

    /// Read at most `max_records` records, leaving the rest of the file unread
    pub fn open_limited<P: AsRef<Path>>(path: P, max_records: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file =
            File::open(&path).map_err(|e| WaterfallError::source_unavailable(path.clone(), e))?;

        let mut records = Vec::new();
        let mut not_utf8 = 0usize;
        for line in BufReader::new(file).split(b'\n') {
            if records.len() >= max_records {
                debug!("Stopped reading at {} records", max_records);
                break;
            }
            let line = line.map_err(|e| WaterfallError::source_unavailable(path.clone(), e))?;
            let text = String::from_utf8_lossy(&line);
            if matches!(text, Cow::Owned(_)) {
                not_utf8 += 1;
            }
            let text = text.trim_end();
            if !text.is_empty() {
                records.push(text.to_owned());
            }
        }
        if not_utf8 > 0 {
            warn!("{} lines in {} are not valid UTF-8", not_utf8, path.display());
        }

        info!("Opened packet log {}: {} records", path.display(), records.len());
        Ok(Self { path, records })
    }

    /// Create a reader from in-memory text (for testing)
    pub fn from_text(text: &str) -> Self {
        Self::from_text_with_path(text, PathBuf::from("<memory>"))
    }

    fn from_text_with_path(text: &str, path: PathBuf) -> Self {
        let records: Vec<String> = text
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();
        debug!("Split {} bytes into {} records", text.len(), records.len());
        Self { path, records }
    }

    /// Records in file order
    pub fn records(&self) -> &[String] {
        &self.records
    }

    /// Consume the reader, keeping only the records
    pub fn into_records(self) -> Vec<String> {
        self.records
    }

    /// Number of records in the log
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Path the log was read from
    pub fn file_path(&self) -> &Path {
        &self.path
    }

    /// File name for status messages
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{decode_record, encode_record};
    use std::io::Write;

    #[test]
    fn blank_lines_are_dropped() {
        let reader = PacketLogReader::from_text("a\n\n  \nb\r\nc");
        assert_eq!(reader.records(), &["a", "b", "c"]);
        assert_eq!(reader.display_name(), "<memory>");
    }

    #[test]
    fn missing_file_is_source_unavailable() {
        let err = PacketLogReader::open("/definitely/not/here.txt").unwrap_err();
        assert!(matches!(err, WaterfallError::SourceUnavailable { .. }));
        assert!(err.to_string().contains("/definitely/not/here.txt"));
    }

    #[test]
    fn reads_records_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "00000000000001000100").unwrap();
        writeln!(file, "00000000000001000200").unwrap();

        let reader = PacketLogReader::open(file.path()).unwrap();
        assert_eq!(reader.record_count(), 2);
        assert_eq!(reader.file_path(), file.path());
    }

    #[test]
    fn invalid_utf8_line_is_kept_for_the_decoder() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"00000000000001000100\n0000\xFF\xFE000001000200\n00000000000001000300\n")
            .unwrap();

        let reader = PacketLogReader::open(file.path()).unwrap();
        assert_eq!(reader.record_count(), 3);
        assert_eq!(decode_record(&reader.records()[0]).unwrap(), vec![1]);
        assert!(matches!(
            decode_record(&reader.records()[1]),
            Err(WaterfallError::MalformedRecord { .. })
        ));
        assert_eq!(decode_record(&reader.records()[2]).unwrap(), vec![3]);
    }

    #[test]
    fn limited_open_stops_at_the_record_limit() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..10 {
            writeln!(file, "{}", encode_record(&[i])).unwrap();
            writeln!(file).unwrap();
        }

        let reader = PacketLogReader::open_limited(file.path(), 4).unwrap();
        assert_eq!(reader.record_count(), 4);
        assert_eq!(decode_record(reader.records().last().unwrap()).unwrap(), vec![3]);
        assert_eq!(PacketLogReader::open(file.path()).unwrap().record_count(), 10);
    }
}
