use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::file::AudioFile;
use super::pcm::PcmStream;
use crate::recording::{AudioFrame, AudioInput, CaptureConstraints, CaptureStream, RecordingError};

/// Frame size produced by the built-in inputs
const FRAME_MS: u64 = 20;

/// Audio input selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputSource {
    /// Generated sine tone (always available)
    Tone {
        #[serde(default = "default_tone_hz")]
        frequency_hz: f32,
        #[serde(default = "default_tone_amplitude")]
        amplitude: f32,
    },
    /// Replay a WAV file in real time
    File { path: PathBuf },
}

fn default_tone_hz() -> f32 {
    440.0
}

fn default_tone_amplitude() -> f32 {
    0.25
}

impl Default for InputSource {
    fn default() -> Self {
        InputSource::Tone {
            frequency_hz: default_tone_hz(),
            amplitude: default_tone_amplitude(),
        }
    }
}

/// Audio input factory
pub struct InputFactory;

impl InputFactory {
    pub fn create(source: &InputSource) -> Arc<dyn AudioInput> {
        match source {
            InputSource::Tone {
                frequency_hz,
                amplitude,
            } => Arc::new(ToneInput::new(*frequency_hz, *amplitude)),
            InputSource::File { path } => Arc::new(WavFileInput::new(path.clone())),
        }
    }
}

/// Sine tone generator, paced in real time
pub struct ToneInput {
    frequency_hz: f32,
    amplitude: f32,
}

impl ToneInput {
    pub fn new(frequency_hz: f32, amplitude: f32) -> Self {
        Self {
            frequency_hz,
            amplitude: amplitude.clamp(0.0, 1.0),
        }
    }
}

#[async_trait::async_trait]
impl AudioInput for ToneInput {
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureStream>, RecordingError> {
        if constraints.sample_rate == 0 || constraints.channels == 0 {
            return Err(RecordingError::device(format!(
                "unsupported format {}Hz/{}ch",
                constraints.sample_rate, constraints.channels
            )));
        }
        debug!(
            "Tone input ignores echo_cancellation={} noise_suppression={}",
            constraints.echo_cancellation, constraints.noise_suppression
        );

        let sample_rate = constraints.sample_rate;
        let channels = constraints.channels;
        let frequency = self.frequency_hz;
        let amplitude = self.amplitude * i16::MAX as f32;
        let per_frame = (sample_rate as u64 * FRAME_MS / 1000).max(1) as usize;
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(FRAME_MS));
            let mut oscillator = Oscillator::new(frequency, sample_rate);
            let mut timestamp_ms = 0;

            loop {
                interval.tick().await;
                let mut samples = Vec::with_capacity(per_frame * channels as usize);
                for _ in 0..per_frame {
                    let value = oscillator.next_sample() * amplitude;
                    for _ in 0..channels {
                        samples.push(value as i16);
                    }
                }

                let frame = AudioFrame {
                    samples,
                    sample_rate,
                    channels,
                    timestamp_ms,
                };
                if tx.send(frame).await.is_err() {
                    break;
                }
                timestamp_ms += FRAME_MS;
            }
            debug!("Tone generator stopped");
        });

        info!(
            "Tone input acquired: {:.0}Hz at {}Hz/{}ch",
            frequency, sample_rate, channels
        );

        Ok(Box::new(PcmStream::new("tone", sample_rate, channels, rx)))
    }

    fn name(&self) -> &str {
        "tone"
    }
}

/// Replays a WAV file as if it were a live microphone
pub struct WavFileInput {
    path: PathBuf,
    name: String,
}

impl WavFileInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("file:{}", path.display());
        Self { path, name }
    }
}

#[async_trait::async_trait]
impl AudioInput for WavFileInput {
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureStream>, RecordingError> {
        let path = self.path.clone();
        let file = tokio::task::spawn_blocking(move || AudioFile::open(path))
            .await
            .map_err(|e| RecordingError::device(format!("file loader panicked: {}", e)))?
            .map_err(|e| RecordingError::device(format!("{:#}", e)))?;

        if file.sample_rate != constraints.sample_rate || file.channels != constraints.channels {
            warn!(
                "{} is {}Hz/{}ch, requested {}Hz/{}ch; using the file format",
                self.name,
                file.sample_rate,
                file.channels,
                constraints.sample_rate,
                constraints.channels
            );
        }

        let (sample_rate, channels) = (file.sample_rate, file.channels);
        let frames = file.frames(FRAME_MS);
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(FRAME_MS));
            for frame in frames {
                interval.tick().await;
                if tx.send(frame).await.is_err() {
                    return;
                }
            }
            debug!("File replay finished");
        });

        Ok(Box::new(PcmStream::new(
            self.name.clone(),
            sample_rate,
            channels,
            rx,
        )))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Sine oscillator whose phase is kept in cycles, wrapped to [0, 1)
struct Oscillator {
    phase: f64,
    step: f64,
}

impl Oscillator {
    fn new(frequency_hz: f32, sample_rate: u32) -> Self {
        Self {
            phase: 0.0,
            step: frequency_hz as f64 / sample_rate.max(1) as f64,
        }
    }

    fn next_sample(&mut self) -> f32 {
        let value = (2.0 * PI * self.phase).sin();
        self.phase = (self.phase + self.step).rem_euclid(1.0);
        value as f32
    }
}
