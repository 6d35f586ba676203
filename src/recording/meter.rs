// Live input level metering
//
// Each tick reads a frequency-domain snapshot from the analyser and reduces
// it to one intensity value: the mean bin magnitude normalized to [0, 100].
// Samples are published on a watch channel so readers always see the latest
// value and never queue stale ones.

use serde::Serialize;
use tokio::sync::watch;

use super::device::Analyser;

/// Analyser FFT size used by the recorder (128 frequency bins)
pub const DEFAULT_FFT_SIZE: usize = 256;

/// Normalized input intensity in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
pub struct LevelSample(f32);

impl LevelSample {
    pub const SILENT: LevelSample = LevelSample(0.0);

    pub fn new(level: f32) -> Self {
        if level.is_nan() {
            return Self::SILENT;
        }
        Self(level.clamp(0.0, 100.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Meter colour band: red above 80, amber above 50, green otherwise
    pub fn zone(self) -> LevelZone {
        if self.0 > 80.0 {
            LevelZone::Hot
        } else if self.0 > 50.0 {
            LevelZone::Warm
        } else {
            LevelZone::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelZone {
    Normal,
    Warm,
    Hot,
}

/// Mean of byte frequency bins, scaled to [0, 100]
pub fn level_from_spectrum(bins: &[u8]) -> LevelSample {
    if bins.is_empty() {
        return LevelSample::SILENT;
    }
    let sum: u32 = bins.iter().map(|&b| b as u32).sum();
    let average = sum as f32 / bins.len() as f32;
    LevelSample::new((average / 255.0 * 100.0).min(100.0))
}

pub struct LevelMeter {
    bins: Vec<u8>,
    publisher: watch::Sender<LevelSample>,
}

impl LevelMeter {
    pub fn new(fft_size: usize) -> Self {
        let (publisher, _) = watch::channel(LevelSample::SILENT);
        Self {
            bins: vec![0; (fft_size / 2).max(1)],
            publisher,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LevelSample> {
        self.publisher.subscribe()
    }

    pub fn current(&self) -> LevelSample {
        *self.publisher.borrow()
    }

    /// Take one sample from the analyser and publish it
    pub fn tick(&mut self, analyser: &mut dyn Analyser) -> LevelSample {
        analyser.byte_frequency_data(&mut self.bins);
        let sample = level_from_spectrum(&self.bins);
        self.publisher.send_replace(sample);
        sample
    }

    /// Drop back to silence (used when sampling is suspended)
    pub fn reset(&mut self) {
        self.bins.fill(0);
        self.publisher.send_replace(LevelSample::SILENT);
    }
}
