use thiserror::Error;

use super::state::{RecordingState, Transition};

/// Errors surfaced by the recording core
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordingError {
    /// The input device could not be acquired (permission denied, no device)
    #[error("Unable to access microphone. Please check permissions. ({reason})")]
    DeviceUnavailable { reason: String },

    /// A transition was requested from a state that does not permit it
    #[error("cannot {transition} while {from}")]
    InvalidTransition {
        from: RecordingState,
        transition: Transition,
    },

    /// The encoder stopped producing chunks unexpectedly
    #[error("encoder failure: {reason}")]
    EncoderFailure { reason: String },

    /// The recorder task has shut down
    #[error("recorder is closed")]
    Closed,
}

impl RecordingError {
    pub fn device(reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            reason: reason.into(),
        }
    }

    /// Invalid transitions are recoverable and never change state
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}
