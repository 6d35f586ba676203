use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::RecordingError;

/// Capture lifecycle of one recording instance
///
/// ```text
/// Idle --start--> Recording --pause--> Paused --resume--> Recording
/// Recording --stop--> Stopped
/// Paused --stop--> Stopped
/// ```
///
/// `Stopped` is terminal: a new take needs a new instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
    Paused,
    Stopped,
}

/// Requested lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Start,
    Pause,
    Resume,
    Stop,
}

impl RecordingState {
    /// Pure transition table
    pub fn apply(self, transition: Transition) -> Result<RecordingState, RecordingError> {
        use RecordingState::*;
        use Transition::*;

        match (self, transition) {
            (Idle, Start) => Ok(Recording),
            (Recording, Pause) => Ok(Paused),
            (Paused, Resume) => Ok(Recording),
            (Recording | Paused, Stop) => Ok(Stopped),
            (from, transition) => Err(RecordingError::InvalidTransition { from, transition }),
        }
    }

    /// Whether the device is held in this state
    pub fn holds_device(self) -> bool {
        matches!(self, RecordingState::Recording | RecordingState::Paused)
    }

    pub fn is_terminal(self) -> bool {
        self == RecordingState::Stopped
    }

    /// Header label shown above the recording controls
    pub fn label(self) -> &'static str {
        match self {
            RecordingState::Idle => "Ready to Record",
            RecordingState::Recording => "Recording Live",
            RecordingState::Paused => "Recording Paused",
            RecordingState::Stopped => "Recording Stopped",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordingState::Idle => "idle",
            RecordingState::Recording => "recording",
            RecordingState::Paused => "paused",
            RecordingState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Transition {
    pub fn as_str(self) -> &'static str {
        match self {
            Transition::Start => "start",
            Transition::Pause => "pause",
            Transition::Resume => "resume",
            Transition::Stop => "stop",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
