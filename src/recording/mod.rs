//! Recording session core
//!
//! This module provides the recording lifecycle for one session take:
//! - `RecordingState` transitions (idle -> recording <-> paused -> stopped)
//! - Chunk accumulation and payload finalization (upload handoff)
//! - Level metering from a frequency-domain snapshot
//! - Elapsed-time counting that excludes paused intervals
//!
//! Platform capture, encoding and analysis sit behind the traits in
//! `device`, so the machine can be driven without a real microphone.

mod device;
mod error;
mod event;
mod machine;
mod meter;
mod payload;
mod recorder;
mod state;
mod stopwatch;

pub use device::{
    Analyser, AudioFrame, AudioInput, CaptureConstraints, CaptureStream, Encoder, EncoderEvent,
};
pub use error::RecordingError;
pub use event::{EventSink, RecordingEvent, RecordingUpdate, UpdateKind};
pub use machine::{RecorderOptions, RecordingMachine};
pub use meter::{level_from_spectrum, LevelMeter, LevelSample, LevelZone, DEFAULT_FFT_SIZE};
pub use payload::{AudioChunk, ChunkBuffer, Payload};
pub use recorder::{Recorder, RecorderSnapshot};
pub use state::{RecordingState, Transition};
pub use stopwatch::{format_elapsed, Stopwatch};
