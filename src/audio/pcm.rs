// Raw PCM capture stream
//
// A `PcmStream` wraps a channel of `AudioFrame`s coming from some source
// (tone generator, file replay, hardware callback). One pump task reads the
// frames and fans them out to:
// - a rolling mono window, read by the analyser for level metering
// - the encoder tap, which buffers s16le bytes while not paused
//
// The encoder emits the buffered bytes as one chunk per timeslice. When the
// source ends while the encoder is active, the remaining bytes are flushed
// and an `EncoderEvent::Failed` follows.

use bytes::BytesMut;
use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::recording::{
    Analyser, AudioChunk, AudioFrame, CaptureStream, Encoder, EncoderEvent, RecordingError,
};

/// Samples kept for analysis (enough for the largest supported FFT)
const WINDOW_CAPACITY: usize = 4096;

/// Decibel range mapped onto 0..255 analyser bytes
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

#[derive(Default)]
struct Shared {
    live: bool,
    window: VecDeque<f32>,
    tap: Option<EncoderTap>,
}

impl Shared {
    fn push_window(&mut self, frame: &AudioFrame) {
        let channels = frame.channels.max(1) as usize;
        for group in frame.samples.chunks(channels) {
            let sum: f32 = group.iter().map(|&s| s as f32 / 32768.0).sum();
            self.window.push_back(sum / group.len() as f32);
        }
        while self.window.len() > WINDOW_CAPACITY {
            self.window.pop_front();
        }
    }
}

struct EncoderTap {
    pending: BytesMut,
    paused: bool,
    started: Instant,
    sequence: u64,
    events: mpsc::UnboundedSender<EncoderEvent>,
}

impl EncoderTap {
    fn take_chunk(&mut self) -> Option<AudioChunk> {
        if self.pending.is_empty() {
            return None;
        }
        let chunk = AudioChunk::new(
            self.sequence,
            self.started.elapsed(),
            self.pending.split().freeze(),
        );
        self.sequence += 1;
        Some(chunk)
    }

    fn emit_chunk(&mut self) {
        if let Some(chunk) = self.take_chunk() {
            if self.events.send(EncoderEvent::Chunk(chunk)).is_err() {
                debug!("Encoder event receiver dropped");
            }
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Live PCM input stream with an attached encoder and analyser
pub struct PcmStream {
    source: String,
    sample_rate: u32,
    channels: u16,
    shared: Arc<Mutex<Shared>>,
    pump: Option<JoinHandle<()>>,
}

impl PcmStream {
    /// Start pumping frames from `frames`
    pub fn new(
        source: impl Into<String>,
        sample_rate: u32,
        channels: u16,
        frames: mpsc::Receiver<AudioFrame>,
    ) -> Self {
        let source = source.into();
        let shared = Arc::new(Mutex::new(Shared {
            live: true,
            ..Default::default()
        }));

        let pump = tokio::spawn(pump(source.clone(), frames, Arc::clone(&shared)));

        info!(
            "PCM stream opened: {} ({}Hz, {} channels)",
            source, sample_rate, channels
        );

        Self {
            source,
            sample_rate,
            channels,
            shared,
            pump: Some(pump),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

async fn pump(source: String, mut frames: mpsc::Receiver<AudioFrame>, shared: Arc<Mutex<Shared>>) {
    while let Some(frame) = frames.recv().await {
        let mut state = lock(&shared);
        if !state.live {
            return;
        }
        state.push_window(&frame);
        if let Some(tap) = state.tap.as_mut().filter(|tap| !tap.paused) {
            for sample in &frame.samples {
                tap.pending.extend_from_slice(&sample.to_le_bytes());
            }
        }
    }

    let mut state = lock(&shared);
    if !state.live {
        return;
    }
    state.live = false;
    if let Some(mut tap) = state.tap.take() {
        warn!("Input {} ended while encoding", source);
        tap.emit_chunk();
        let _ = tap.events.send(EncoderEvent::Failed {
            reason: format!("input {} ended", source),
        });
    } else {
        debug!("Input {} ended", source);
    }
}

impl CaptureStream for PcmStream {
    fn encoder(&mut self) -> Box<dyn Encoder> {
        Box::new(PcmEncoder {
            mime_type: format!(
                "audio/pcm;rate={};channels={}",
                self.sample_rate, self.channels
            ),
            shared: Arc::clone(&self.shared),
            ticker: None,
        })
    }

    fn analyser(&mut self, fft_size: usize) -> Box<dyn Analyser> {
        Box::new(SpectrumAnalyser::new(Arc::clone(&self.shared), fft_size))
    }

    fn release(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
            let mut state = lock(&self.shared);
            state.live = false;
            state.tap = None;
            state.window.clear();
            info!("PCM stream released: {}", self.source);
        }
    }

    fn is_live(&self) -> bool {
        self.pump.is_some() && lock(&self.shared).live
    }
}

impl Drop for PcmStream {
    fn drop(&mut self) {
        self.release();
    }
}

/// Emits raw s16le PCM chunks every timeslice
pub struct PcmEncoder {
    mime_type: String,
    shared: Arc<Mutex<Shared>>,
    ticker: Option<JoinHandle<()>>,
}

impl Encoder for PcmEncoder {
    fn mime_type(&self) -> String {
        self.mime_type.clone()
    }

    fn start(
        &mut self,
        timeslice: Duration,
        events: mpsc::UnboundedSender<EncoderEvent>,
    ) -> Result<(), RecordingError> {
        {
            let mut state = lock(&self.shared);
            if !state.live {
                return Err(RecordingError::EncoderFailure {
                    reason: "input stream is not live".to_string(),
                });
            }
            if state.tap.is_some() {
                return Err(RecordingError::EncoderFailure {
                    reason: "encoder already started".to_string(),
                });
            }
            state.tap = Some(EncoderTap {
                pending: BytesMut::new(),
                paused: false,
                started: Instant::now(),
                sequence: 0,
                events,
            });
        }

        let shared = Arc::clone(&self.shared);
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + timeslice, timeslice);
            loop {
                interval.tick().await;
                let mut state = lock(&shared);
                match state.tap.as_mut() {
                    Some(tap) if !tap.paused => tap.emit_chunk(),
                    Some(_) => {}
                    None => break,
                }
            }
        }));

        Ok(())
    }

    fn pause(&mut self) {
        if let Some(tap) = lock(&self.shared).tap.as_mut() {
            tap.paused = true;
        }
    }

    fn resume(&mut self) {
        if let Some(tap) = lock(&self.shared).tap.as_mut() {
            tap.paused = false;
        }
    }

    fn stop(&mut self) -> Option<AudioChunk> {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        lock(&self.shared).tap.take()?.take_chunk()
    }
}

impl Drop for PcmEncoder {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

/// Windowed DFT magnitude spectrum over the most recent samples
///
/// Mirrors the WebAudio analyser scale: bin magnitudes in dB, mapped
/// linearly from [-100 dB, -30 dB] onto 0..255.
pub struct SpectrumAnalyser {
    shared: Arc<Mutex<Shared>>,
    fft_size: usize,
    window: Vec<f32>,
    cos: Vec<f32>,
    sin: Vec<f32>,
    frame: Vec<f32>,
}

impl SpectrumAnalyser {
    fn new(shared: Arc<Mutex<Shared>>, fft_size: usize) -> Self {
        let fft_size = fft_size.clamp(32, WINDOW_CAPACITY);
        let n = fft_size as f32;

        // Blackman window
        let window = (0..fft_size)
            .map(|i| {
                let x = i as f32 / n;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();
        let cos = (0..fft_size).map(|i| (2.0 * PI * i as f32 / n).cos()).collect();
        let sin = (0..fft_size).map(|i| (2.0 * PI * i as f32 / n).sin()).collect();

        Self {
            shared,
            fft_size,
            window,
            cos,
            sin,
            frame: vec![0.0; fft_size],
        }
    }

    fn load_frame(&mut self) {
        let state = lock(&self.shared);
        let available = state.window.len().min(self.fft_size);
        let pad = self.fft_size - available;

        self.frame[..pad].fill(0.0);
        let recent = state.window.iter().skip(state.window.len() - available);
        for (slot, sample) in self.frame[pad..].iter_mut().zip(recent) {
            *slot = *sample;
        }
    }
}

impl Analyser for SpectrumAnalyser {
    fn byte_frequency_data(&mut self, out: &mut [u8]) {
        self.load_frame();

        let n = self.fft_size;
        let bins = out.len().min(n / 2);
        for (k, slot) in out.iter_mut().enumerate().take(bins) {
            let (mut re, mut im) = (0.0f32, 0.0f32);
            for (i, sample) in self.frame.iter().enumerate() {
                let value = sample * self.window[i];
                let idx = (k * i) % n;
                re += value * self.cos[idx];
                im -= value * self.sin[idx];
            }
            let magnitude = (re * re + im * im).sqrt() / n as f32;
            let db = 20.0 * magnitude.max(1e-12).log10();
            let scaled = (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS) * 255.0;
            *slot = scaled.clamp(0.0, 255.0) as u8;
        }
        out[bins..].fill(0);
    }
}
