use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::device::{Analyser, CaptureConstraints, CaptureStream, Encoder, EncoderEvent};
use super::error::RecordingError;
use super::event::{EventSink, RecordingEvent};
use super::meter::{LevelMeter, LevelSample, DEFAULT_FFT_SIZE};
use super::payload::{AudioChunk, ChunkBuffer};
use super::state::{RecordingState, Transition};
use super::stopwatch::Stopwatch;

/// Per-recorder settings, passed by value from configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderOptions {
    pub constraints: CaptureConstraints,
    /// Interval between encoder chunks (default: 1000ms)
    pub timeslice_ms: u64,
    /// Level meter sampling interval (default: 16ms, one display frame)
    pub meter_interval_ms: u64,
    /// Analyser FFT size (default: 256)
    pub fft_size: usize,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            constraints: CaptureConstraints::default(),
            timeslice_ms: 1000,
            meter_interval_ms: 16,
            fft_size: DEFAULT_FFT_SIZE,
        }
    }
}

impl RecorderOptions {
    pub fn timeslice(&self) -> Duration {
        Duration::from_millis(self.timeslice_ms.max(1))
    }

    pub fn meter_interval(&self) -> Duration {
        Duration::from_millis(self.meter_interval_ms.max(1))
    }
}

/// Synchronous recording core
///
/// Owns the device handle, the encoder and the chunk sequence for one take.
/// Every mutation goes through `&mut self`, so callers serialize access by
/// construction; the async `Recorder` drives it from a single task.
pub struct RecordingMachine {
    session_id: String,
    options: RecorderOptions,
    state: RecordingState,
    stream: Option<Box<dyn CaptureStream>>,
    encoder: Option<Box<dyn Encoder>>,
    analyser: Option<Box<dyn Analyser>>,
    mime_type: String,
    chunks: ChunkBuffer,
    clock: Stopwatch,
    meter: LevelMeter,
    sink: Box<dyn EventSink>,
}

impl RecordingMachine {
    pub fn new(
        session_id: impl Into<String>,
        options: RecorderOptions,
        sink: impl EventSink,
    ) -> Self {
        let meter = LevelMeter::new(options.fft_size);
        Self {
            session_id: session_id.into(),
            options,
            state: RecordingState::Idle,
            stream: None,
            encoder: None,
            analyser: None,
            mime_type: String::new(),
            chunks: ChunkBuffer::new(),
            clock: Stopwatch::new(),
            meter,
            sink: Box::new(sink),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn options(&self) -> &RecorderOptions {
        &self.options
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Time spent in `Recording` so far
    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    pub fn level(&self) -> LevelSample {
        self.meter.current()
    }

    pub fn subscribe_level(&self) -> watch::Receiver<LevelSample> {
        self.meter.subscribe()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn holds_device(&self) -> bool {
        self.stream.is_some()
    }

    /// Validate a transition without performing it
    pub fn check(&self, transition: Transition) -> Result<RecordingState, RecordingError> {
        self.state.apply(transition).inspect_err(|e| {
            debug!("Session {}: rejected transition: {}", self.session_id, e);
        })
    }

    /// Complete `start()` once the device has been acquired
    ///
    /// The stream is released again if the machine is no longer idle or the
    /// encoder refuses to start.
    pub fn begin(
        &mut self,
        mut stream: Box<dyn CaptureStream>,
        encoder_events: mpsc::UnboundedSender<EncoderEvent>,
    ) -> Result<(), RecordingError> {
        let next = match self.check(Transition::Start) {
            Ok(next) => next,
            Err(e) => {
                stream.release();
                return Err(e);
            }
        };

        let mut encoder = stream.encoder();
        if let Err(e) = encoder.start(self.options.timeslice(), encoder_events) {
            warn!("Session {}: encoder failed to start: {}", self.session_id, e);
            stream.release();
            return Err(e);
        }

        self.mime_type = encoder.mime_type();
        self.analyser = Some(stream.analyser(self.options.fft_size));
        self.encoder = Some(encoder);
        self.stream = Some(stream);
        self.state = next;
        self.clock.run();

        info!(
            "Session {}: recording started ({}, {}ms chunks)",
            self.session_id, self.mime_type, self.options.timeslice_ms
        );
        self.sink.emit(RecordingEvent::Started {
            session_id: self.session_id.clone(),
            timestamp: Utc::now(),
        });

        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), RecordingError> {
        let next = self.check(Transition::Pause)?;

        if let Some(encoder) = self.encoder.as_mut() {
            encoder.pause();
        }
        self.clock.halt();
        self.meter.reset();
        self.state = next;

        info!(
            "Session {}: recording paused at {:.1}s",
            self.session_id,
            self.clock.elapsed().as_secs_f64()
        );
        self.sink.emit(RecordingEvent::Paused {
            session_id: self.session_id.clone(),
            timestamp: Utc::now(),
        });

        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), RecordingError> {
        let next = self.check(Transition::Resume)?;

        if let Some(encoder) = self.encoder.as_mut() {
            encoder.resume();
        }
        self.clock.run();
        self.state = next;

        info!("Session {}: recording resumed", self.session_id);
        self.sink.emit(RecordingEvent::Resumed {
            session_id: self.session_id.clone(),
            timestamp: Utc::now(),
        });

        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), RecordingError> {
        self.check(Transition::Stop)?;
        let last = self.halt_encoder();
        self.finish(last, None);
        Ok(())
    }

    /// Stop, folding in every event the encoder queued before it halted
    ///
    /// The encoder is stopped first, so nothing more can be queued and the
    /// drain is exhaustive. Its final chunk is appended after the drained ones.
    pub fn stop_draining(
        &mut self,
        pending: &mut mpsc::UnboundedReceiver<EncoderEvent>,
    ) -> Result<(), RecordingError> {
        self.check(Transition::Stop)?;
        let last = self.halt_encoder();

        let mut truncation = None;
        while let Ok(event) = pending.try_recv() {
            match event {
                EncoderEvent::Chunk(chunk) => {
                    debug!(
                        "Session {}: chunk {} ({} bytes) drained on stop",
                        self.session_id,
                        chunk.sequence,
                        chunk.len()
                    );
                    self.chunks.push(chunk);
                }
                EncoderEvent::Failed { reason } => {
                    warn!("Session {}: encoder failed before stop: {}", self.session_id, reason);
                    truncation = Some(reason);
                }
            }
        }

        self.finish(last, truncation);
        Ok(())
    }

    /// Feed a chunk or failure from the encoder channel
    pub fn on_encoder_event(&mut self, event: EncoderEvent) {
        match event {
            EncoderEvent::Chunk(chunk) => {
                if self.state.holds_device() {
                    debug!(
                        "Session {}: chunk {} ({} bytes)",
                        self.session_id,
                        chunk.sequence,
                        chunk.len()
                    );
                    self.chunks.push(chunk);
                } else {
                    debug!(
                        "Session {}: ignoring chunk {} while {}",
                        self.session_id, chunk.sequence, self.state
                    );
                }
            }
            EncoderEvent::Failed { reason } => {
                if self.state.holds_device() {
                    warn!(
                        "Session {}: encoder failed, finalizing {} collected chunks: {}",
                        self.session_id,
                        self.chunks.len(),
                        reason
                    );
                    let last = self.halt_encoder();
                    self.finish(last, Some(reason));
                } else {
                    debug!(
                        "Session {}: ignoring encoder failure while {}: {}",
                        self.session_id, self.state, reason
                    );
                }
            }
        }
    }

    /// Take one level sample; only samples while `Recording`
    pub fn sample_level(&mut self) -> Option<LevelSample> {
        if self.state != RecordingState::Recording {
            return None;
        }
        let analyser = self.analyser.as_mut()?;
        Some(self.meter.tick(analyser.as_mut()))
    }

    /// Abnormal shutdown: release everything without emitting events
    pub fn teardown(&mut self) {
        if self.state.holds_device() {
            warn!(
                "Session {}: torn down while {}, discarding {} chunks",
                self.session_id,
                self.state,
                self.chunks.len()
            );
        }
        if let Some(mut encoder) = self.encoder.take() {
            encoder.stop();
        }
        self.analyser = None;
        self.release_device();
        self.clock.halt();
        self.meter.reset();
        self.chunks = ChunkBuffer::new();
        self.state = RecordingState::Stopped;
    }

    fn halt_encoder(&mut self) -> Option<AudioChunk> {
        self.encoder.take().and_then(|mut encoder| encoder.stop())
    }

    fn finish(&mut self, last: Option<AudioChunk>, truncation: Option<String>) {
        self.clock.halt();
        self.meter.reset();

        if let Some(last) = last {
            self.chunks.push(last);
        }
        self.analyser = None;
        self.release_device();
        self.state = RecordingState::Stopped;

        let duration = self.clock.elapsed();
        let payload = std::mem::take(&mut self.chunks).finalize(self.mime_type.clone());

        info!(
            "Session {}: recording stopped after {:.1}s ({} chunks, {} bytes)",
            self.session_id,
            duration.as_secs_f64(),
            payload.chunk_count,
            payload.len()
        );

        let timestamp = Utc::now();
        self.sink.emit(RecordingEvent::Stopped {
            session_id: self.session_id.clone(),
            timestamp,
            duration,
            payload,
        });

        if let Some(reason) = truncation {
            self.sink.emit(RecordingEvent::Truncated {
                session_id: self.session_id.clone(),
                timestamp,
                reason,
            });
        }
    }

    fn release_device(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
            debug!("Session {}: input device released", self.session_id);
        }
    }
}

impl Drop for RecordingMachine {
    fn drop(&mut self) {
        if self.stream.is_some() {
            self.teardown();
        }
    }
}
