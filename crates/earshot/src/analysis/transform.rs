//! Block transform
//!
//! Converts one block of frames into a [`FeatureSnapshot`]: RMS amplitude,
//! dominant frequency and a log-compressed banded magnitude spectrum.
//! The free functions are pure; [`BlockTransform`] only adds cached FFT plans
//! and scratch buffers on top of them.

use std::ops::Range;

use rustfft::{num_complex::Complex, FftPlanner};

use crate::audio::types::Frame;
use crate::config::{AnalysisChannel, AnalysisConfig};

use super::snapshot::FeatureSnapshot;

impl AnalysisChannel {
    /// Reduce a stereo frame to the analyzed scalar
    pub fn extract(self, frame: &Frame) -> f32 {
        match self {
            AnalysisChannel::Left => frame[0],
            AnalysisChannel::Right => frame[1],
            AnalysisChannel::Mix => (frame[0] + frame[1]) * 0.5,
        }
    }
}

/// Root-mean-square of `samples`, 0 for an empty slice
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Frequency of the strongest bin.
///
/// `n` is the number of samples that went into the transform, not the
/// nominal block size. Ties and an all-zero spectrum resolve to the lowest
/// bin, so silence reports 0 Hz.
pub fn dominant_frequency(magnitudes: &[f32], sample_rate: u32, n: usize) -> f32 {
    if n == 0 {
        return 0.0;
    }
    let mut max_mag = 0.0f32;
    let mut max_index = 0usize;
    for (i, &mag) in magnitudes.iter().enumerate() {
        if mag > max_mag {
            max_mag = mag;
            max_index = i;
        }
    }
    max_index as f32 * sample_rate as f32 / n as f32
}

/// Contiguous bin ranges for each band.
///
/// Every band is `bins / bands` wide and the last one absorbs the remainder,
/// so the ranges cover `0..bins` exactly once.
pub fn band_ranges(bins: usize, bands: usize) -> impl Iterator<Item = Range<usize>> {
    let width = if bands == 0 { 0 } else { bins / bands };
    (0..bands).map(move |i| {
        let start = i * width;
        let end = if i + 1 == bands { bins } else { start + width };
        start..end
    })
}

/// Average `log10(mag + ε)` per band, scaled by the divisor and clamped at 0
pub fn banded_spectrum(magnitudes: &[f32], config: &AnalysisConfig) -> Vec<f32> {
    band_ranges(magnitudes.len(), config.bands)
        .map(|range| {
            if range.is_empty() {
                return 0.0;
            }
            let count = range.len() as f32;
            let sum: f32 = magnitudes[range]
                .iter()
                .map(|&m| (m + config.epsilon).log10())
                .sum();
            (sum / count / config.log_divisor).max(0.0)
        })
        .collect()
}

/// Blend each band with its left neighbour's previous value.
///
/// Band 0 is left alone. Nothing happens when `previous` has a different
/// band count (first block of a track, or a config change).
pub fn smooth_bands(bands: &mut [f32], previous: &[f32], weight: f32) {
    if previous.len() != bands.len() || weight <= 0.0 {
        return;
    }
    for i in 1..bands.len() {
        bands[i] = (bands[i] + weight * previous[i - 1]) / (1.0 + weight);
    }
}

/// Per-block feature extraction with cached FFT plans
pub struct BlockTransform {
    config: AnalysisConfig,
    planner: FftPlanner<f32>,
    samples: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl BlockTransform {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            planner: FftPlanner::new(),
            samples: Vec::new(),
            spectrum: Vec::new(),
            scratch: Vec::new(),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze `block` (every frame in it) at `sample_rate`.
    ///
    /// `previous` is the last snapshot of the same track; it drives band
    /// smoothing and the sequence number.
    pub fn analyze(
        &mut self,
        block: &[Frame],
        sample_rate: u32,
        previous: Option<&FeatureSnapshot>,
    ) -> FeatureSnapshot {
        let sequence = previous.map_or(1, |p| p.sequence + 1);
        let n = block.len();
        if n == 0 {
            return FeatureSnapshot {
                sequence,
                ..FeatureSnapshot::silent(self.config.bands)
            };
        }

        let channel = self.config.channel;
        self.samples.clear();
        self.samples.extend(block.iter().map(|f| channel.extract(f)));

        let rms = rms(&self.samples);
        let magnitudes = self.magnitudes();
        let dominant_hz = dominant_frequency(&magnitudes, sample_rate, n);

        let mut bands = banded_spectrum(&magnitudes, &self.config);
        if let Some(prev) = previous {
            smooth_bands(&mut bands, &prev.bands, self.config.smoothing_weight);
        }

        FeatureSnapshot {
            rms,
            dominant_hz,
            bands,
            frames: n,
            sequence,
        }
    }

    /// Magnitudes of the first `n / 2` bins of the FFT of `self.samples`
    fn magnitudes(&mut self) -> Vec<f32> {
        let n = self.samples.len();
        let fft = self.planner.plan_fft_forward(n);

        self.spectrum.clear();
        self.spectrum
            .extend(self.samples.iter().map(|&s| Complex::new(s, 0.0)));
        self.scratch
            .resize(fft.get_inplace_scratch_len(), Complex::new(0.0, 0.0));
        fft.process_with_scratch(&mut self.spectrum, &mut self.scratch);

        self.spectrum[..n / 2].iter().map(|c| c.norm()).collect()
    }
}
