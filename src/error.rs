//! Error types for sonar waterfall processing.
//!
//! All errors implement `std::error::Error` and carry enough context to be turned
//! into a status message for the operator.
//!
//! ## Error Categories
//!
//! - **Record Errors**: a single packet line could not be decoded
//! - **Configuration Errors**: invalid window width, granularity, capacities or YAML
//! - **Source Errors**: the packet log is missing or unreadable
//! - **State Errors**: a control was issued in a state that does not accept it
//!
//! A cooperative stop is *not* an error: it ends playback in
//! [`PlaybackState::Aborted`](crate::PlaybackState::Aborted).
//!
//! ## Skippable errors
//!
//! ```rust
//! use sonar_waterfall::WaterfallError;
//!
//! let error = WaterfallError::malformed_record(Some(42), "non-hex character 'z'");
//! assert!(error.is_skippable());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

use crate::types::PlaybackState;

/// Result type alias for waterfall operations.
pub type Result<T, E = WaterfallError> = std::result::Result<T, E>;

/// Main error type for waterfall operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WaterfallError {
    #[error("Malformed record{}: {reason}", line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    MalformedRecord { line: Option<usize>, reason: String },

    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("Source unavailable: {}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot {operation} while {state}")]
    InvalidState { operation: String, state: PlaybackState },

    #[error("Configuration parse error: {details}")]
    Config { details: String },

    #[error("Channel closed: {context}")]
    Channel { context: String },
}

impl WaterfallError {
    /// Returns whether the pipeline may skip the offending item and carry on.
    pub fn is_skippable(&self) -> bool {
        match self {
            WaterfallError::MalformedRecord { .. } => true,
            WaterfallError::InvalidState { .. } => true,
            WaterfallError::InvalidConfiguration { .. } => false,
            WaterfallError::SourceUnavailable { .. } => false,
            WaterfallError::Config { .. } => false,
            WaterfallError::Channel { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            WaterfallError::MalformedRecord { .. } => vec![
                "Check the log was captured from a supported fish-finder",
                "Look for truncated lines at the end of the file",
                "Enable skipping of malformed records",
            ],
            WaterfallError::InvalidConfiguration { .. } => vec![
                "Use a positive window width and progress granularity",
                "Keep capacities above zero",
            ],
            WaterfallError::SourceUnavailable { .. } => vec![
                "Check the file exists and is readable",
                "Verify the path points to a packet log (.txt)",
            ],
            WaterfallError::InvalidState { .. } => vec![
                "Wait for loading to complete",
                "Seeking is only available for file sources",
            ],
            WaterfallError::Config { .. } => vec![
                "Check the YAML syntax",
                "Compare field names against the defaults",
            ],
            WaterfallError::Channel { .. } => vec![
                "The producer has finished or was stopped",
                "Open a new session to restart playback",
            ],
        }
    }

    /// Helper constructor for malformed records.
    pub fn malformed_record(line: Option<usize>, reason: impl Into<String>) -> Self {
        WaterfallError::MalformedRecord { line, reason: reason.into() }
    }

    /// Helper constructor for invalid configuration values.
    pub fn invalid_configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        WaterfallError::InvalidConfiguration { field: field.into(), reason: reason.into() }
    }

    /// Helper constructor for unreadable sources.
    pub fn source_unavailable(path: PathBuf, source: std::io::Error) -> Self {
        WaterfallError::SourceUnavailable { path, source }
    }

    /// Helper constructor for controls rejected by the current state.
    pub fn invalid_state(operation: impl Into<String>, state: PlaybackState) -> Self {
        WaterfallError::InvalidState { operation: operation.into(), state }
    }

    /// Attach a line number to a record error, leaving other errors untouched.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            WaterfallError::MalformedRecord { reason, .. } => {
                WaterfallError::MalformedRecord { line: Some(line), reason }
            }
            other => other,
        }
    }
}

impl From<std::io::Error> for WaterfallError {
    fn from(err: std::io::Error) -> Self {
        WaterfallError::SourceUnavailable { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<serde_yaml_ng::Error> for WaterfallError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        WaterfallError::Config { details: err.to_string() }
    }
}
