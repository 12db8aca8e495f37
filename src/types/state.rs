//! Playback state and status events

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a playback session
///
/// ```text
/// Stopped -> Loading -> Playing <-> Paused
///                          |
///                          v
///                       Finished
/// (any non-terminal state) -> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No source selected
    #[default]
    Stopped,
    /// Building the sample cache
    Loading,
    /// Producing frames
    Playing,
    /// Producer alive but not advancing
    Paused,
    /// End of source reached; position was reset
    Finished,
    /// Stopped on request or by a fatal error
    Aborted,
}

impl PlaybackState {
    /// Terminal states end the producer loop
    pub fn is_terminal(self) -> bool {
        matches!(self, PlaybackState::Finished | PlaybackState::Aborted)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Stopped => "stopped",
            PlaybackState::Loading => "loading",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Finished => "finished",
            PlaybackState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Human-readable status notifications for a status bar or log
///
/// Delivery is fire-and-forget; slow observers may miss events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatusEvent {
    /// Cache build progress in percent of records processed
    Loading { percent: u8 },
    /// Cache ready for playback
    Loaded { source: String, columns: usize, skipped: usize },
    /// A record could not be decoded and was left blank
    RecordSkipped { line: Option<usize>, reason: String },
    /// Playback state transition
    StateChanged(PlaybackState),
    /// Columns advanced per tick changed
    SpeedChanged(usize),
    /// Gain (or threshold) changed
    GainChanged(f32),
    /// Playback position moved by a seek
    Seeked { progress: u32, position: usize },
    /// Measured producer rate
    Throughput { fps: f64 },
    /// Error surfaced to the operator
    Error(String),
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::Loading { percent } => write!(f, "Loading {percent}%"),
            StatusEvent::Loaded { source, columns, skipped: 0 } => {
                write!(f, "Loaded {source} ({columns} packets)")
            }
            StatusEvent::Loaded { source, columns, skipped } => {
                write!(f, "Loaded {source} ({columns} packets, {skipped} skipped)")
            }
            StatusEvent::RecordSkipped { line: Some(line), reason } => {
                write!(f, "Skipped record at line {line}: {reason}")
            }
            StatusEvent::RecordSkipped { line: None, reason } => {
                write!(f, "Skipped record: {reason}")
            }
            StatusEvent::StateChanged(state) => write!(f, "Playback {state}"),
            StatusEvent::SpeedChanged(speed) => write!(f, "Speed {speed}x"),
            StatusEvent::GainChanged(gain) => write!(f, "Gain {gain}"),
            StatusEvent::Seeked { progress, position } => {
                write!(f, "Seeked to step {progress} (column {position})")
            }
            StatusEvent::Throughput { fps } => write!(f, "{fps:.1} FPS"),
            StatusEvent::Error(msg) => write!(f, "Error: {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(PlaybackState::Finished.is_terminal());
        assert!(PlaybackState::Aborted.is_terminal());
        assert!(!PlaybackState::Paused.is_terminal());
        assert!(!PlaybackState::Loading.is_terminal());
    }

    #[test]
    fn status_strings_are_readable() {
        assert_eq!(StatusEvent::Loading { percent: 40 }.to_string(), "Loading 40%");
        assert_eq!(
            StatusEvent::Loaded { source: "a.txt".into(), columns: 9, skipped: 0 }.to_string(),
            "Loaded a.txt (9 packets)"
        );
        assert_eq!(
            StatusEvent::StateChanged(PlaybackState::Paused).to_string(),
            "Playback paused"
        );
        assert_eq!(StatusEvent::Throughput { fps: 24.96 }.to_string(), "25.0 FPS");
    }
}
