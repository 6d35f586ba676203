use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

use super::error::RecordingError;
use super::payload::AudioChunk;

/// Options requested when acquiring the audio input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            sample_rate: 48000,
            channels: 1,
        }
    }
}

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Delivered by an encoder on its event channel
#[derive(Debug, Clone)]
pub enum EncoderEvent {
    /// A periodic chunk of encoded audio
    Chunk(AudioChunk),
    /// The encoder stopped producing chunks unexpectedly
    Failed { reason: String },
}

/// Source of audio input streams (microphone, file replay, generator)
#[async_trait::async_trait]
pub trait AudioInput: Send + Sync {
    /// Acquire a live input stream
    ///
    /// Fails with `RecordingError::DeviceUnavailable` when permission is
    /// denied or no device exists.
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureStream>, RecordingError>;

    /// Input name for logging
    fn name(&self) -> &str;
}

/// A live, exclusively owned input stream
///
/// Implementations must also release the device when dropped.
pub trait CaptureStream: Send {
    /// Create the encoder attached to this stream
    fn encoder(&mut self) -> Box<dyn Encoder>;

    /// Create a read-only frequency analyser over this stream
    fn analyser(&mut self, fft_size: usize) -> Box<dyn Analyser>;

    /// Release the underlying device (idempotent)
    fn release(&mut self);

    fn is_live(&self) -> bool;
}

/// Turns the stream into an ordered sequence of binary chunks
pub trait Encoder: Send {
    /// MIME type of the produced chunks
    fn mime_type(&self) -> String;

    /// Begin emitting a chunk every `timeslice`
    fn start(
        &mut self,
        timeslice: Duration,
        events: mpsc::UnboundedSender<EncoderEvent>,
    ) -> Result<(), RecordingError>;

    fn pause(&mut self);

    fn resume(&mut self);

    /// Stop encoding and return whatever was buffered since the last chunk
    fn stop(&mut self) -> Option<AudioChunk>;
}

/// Frequency-domain view of the input stream
pub trait Analyser: Send {
    /// Fill `out` with the current magnitude spectrum, one byte per bin
    fn byte_frequency_data(&mut self, out: &mut [u8]);
}
