// Test doubles for the recording seams
//
// `MockInput` hands out streams whose encoder sender is captured in
// `MockDevice`, so tests can push chunks and failures by hand and observe
// whether the device was released.

#![allow(dead_code)]

use bytes::Bytes;
use podcast_studio::recording::{
    Analyser, AudioChunk, AudioInput, CaptureConstraints, CaptureStream, Encoder, EncoderEvent,
    RecordingError, RecordingEvent,
};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

pub const MOCK_MIME: &str = "audio/webm;codecs=opus";

/// Shared view of everything the mock device did
#[derive(Clone, Default)]
pub struct MockDevice {
    pub acquired: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
    pub paused: Arc<AtomicBool>,
    pub level_byte: Arc<AtomicU8>,
    pub final_chunk: Arc<Mutex<Option<AudioChunk>>>,
    pub emit_on_stop: Arc<Mutex<Option<AudioChunk>>>,
    pub encoder_tx: Arc<Mutex<Option<mpsc::UnboundedSender<EncoderEvent>>>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stream(&self) -> Box<dyn CaptureStream> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Box::new(MockStream {
            device: self.clone(),
            live: true,
        })
    }

    pub fn released_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn set_level_byte(&self, value: u8) {
        self.level_byte.store(value, Ordering::SeqCst);
    }

    pub fn set_final_chunk(&self, sequence: u64, data: &'static [u8]) {
        *self.final_chunk.lock().unwrap() = Some(chunk(sequence, data));
    }

    /// Queue a timeslice chunk on the channel while the encoder is stopping,
    /// the way a ticker firing just before the tap is removed would
    pub fn set_emit_on_stop(&self, sequence: u64, data: &'static [u8]) {
        *self.emit_on_stop.lock().unwrap() = Some(chunk(sequence, data));
    }

    /// Deliver an encoder chunk the way a running encoder would
    pub fn push_chunk(&self, sequence: u64, data: &'static [u8]) {
        self.send(EncoderEvent::Chunk(chunk(sequence, data)));
    }

    pub fn fail(&self, reason: &str) {
        self.send(EncoderEvent::Failed {
            reason: reason.to_string(),
        });
    }

    fn send(&self, event: EncoderEvent) {
        let guard = self.encoder_tx.lock().unwrap();
        let tx = guard.as_ref().expect("encoder was started");
        tx.send(event).expect("recorder is listening");
    }
}

pub fn chunk(sequence: u64, data: &'static [u8]) -> AudioChunk {
    AudioChunk::new(
        sequence,
        Duration::from_millis(sequence * 1000),
        Bytes::from_static(data),
    )
}

struct MockStream {
    device: MockDevice,
    live: bool,
}

impl CaptureStream for MockStream {
    fn encoder(&mut self) -> Box<dyn Encoder> {
        Box::new(MockEncoder {
            device: self.device.clone(),
        })
    }

    fn analyser(&mut self, _fft_size: usize) -> Box<dyn Analyser> {
        Box::new(MockAnalyser {
            device: self.device.clone(),
        })
    }

    fn release(&mut self) {
        if self.live {
            self.live = false;
            self.device.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.release();
    }
}

struct MockEncoder {
    device: MockDevice,
}

impl Encoder for MockEncoder {
    fn mime_type(&self) -> String {
        MOCK_MIME.to_string()
    }

    fn start(
        &mut self,
        _timeslice: Duration,
        events: mpsc::UnboundedSender<EncoderEvent>,
    ) -> Result<(), RecordingError> {
        *self.device.encoder_tx.lock().unwrap() = Some(events);
        Ok(())
    }

    fn pause(&mut self) {
        self.device.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&mut self) {
        self.device.paused.store(false, Ordering::SeqCst);
    }

    fn stop(&mut self) -> Option<AudioChunk> {
        if let Some(chunk) = self.device.emit_on_stop.lock().unwrap().take() {
            self.device.send(EncoderEvent::Chunk(chunk));
        }
        self.device.final_chunk.lock().unwrap().take()
    }
}

struct MockAnalyser {
    device: MockDevice,
}

impl Analyser for MockAnalyser {
    fn byte_frequency_data(&mut self, out: &mut [u8]) {
        out.fill(self.device.level_byte.load(Ordering::SeqCst));
    }
}

/// Input that hands out `MockDevice` streams, or fails like a denied microphone
pub struct MockInput {
    pub device: MockDevice,
    pub deny: Option<String>,
    /// Each acquire consumes one permit; with none left it waits
    pub gate: Option<Arc<Semaphore>>,
}

impl MockInput {
    pub fn new(device: MockDevice) -> Self {
        Self {
            device,
            deny: None,
            gate: None,
        }
    }

    pub fn gated(device: MockDevice, gate: Arc<Semaphore>) -> Self {
        Self {
            device,
            deny: None,
            gate: Some(gate),
        }
    }

    pub fn denied(reason: &str) -> Self {
        Self {
            device: MockDevice::new(),
            deny: Some(reason.to_string()),
            gate: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioInput for MockInput {
    async fn acquire(
        &self,
        _constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureStream>, RecordingError> {
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| RecordingError::device("gate closed"))?
                .forget();
        }
        match &self.deny {
            Some(reason) => Err(RecordingError::device(reason.clone())),
            None => Ok(self.device.stream()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Drain every event currently queued
pub fn drain(rx: &mut mpsc::UnboundedReceiver<RecordingEvent>) -> Vec<RecordingEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn kinds(events: &[RecordingEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.kind()).collect()
}
