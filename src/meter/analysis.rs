//! Frequency-domain audio analysis.
//!
//! Derives byte-valued frequency bins from the most recent capture window
//! using a fixed-size FFT with per-bin exponential smoothing. One analysis
//! context exists per session; it is owned by the session controller and
//! closed exactly once on teardown. A closed context yields silent frames
//! instead of erroring, so the meter loop can simply skip them.

use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

/// Decibel floor mapped to byte value 0.
const MIN_DECIBELS: f32 = -100.0;
/// Decibel ceiling mapped to byte value 255.
const MAX_DECIBELS: f32 = -30.0;

/// Which metering flavor the analysis branch runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MeterVariant {
    /// High-fidelity variant for live mirroring: small window, light
    /// smoothing, level is the maximum bin value.
    #[default]
    Mirror,
    /// Standalone mic-test variant: larger window, heavier smoothing,
    /// level is the mean of all bins.
    MicTest,
}

impl MeterVariant {
    /// FFT window size in samples.
    pub fn window_size(&self) -> usize {
        match self {
            Self::Mirror => 128,
            Self::MicTest => 256,
        }
    }

    /// Exponential smoothing time constant applied per bin.
    pub fn smoothing(&self) -> f32 {
        match self {
            Self::Mirror => 0.5,
            Self::MicTest => 0.8,
        }
    }

    /// Reduces a frequency bin buffer to a single level scalar.
    pub fn reduce(&self, bins: &[u8]) -> u8 {
        if bins.is_empty() {
            return 0;
        }
        match self {
            Self::Mirror => bins.iter().copied().max().unwrap_or(0),
            Self::MicTest => {
                let sum: u32 = bins.iter().map(|b| u32::from(*b)).sum();
                (sum as f32 / bins.len() as f32).round() as u8
            }
        }
    }
}

impl std::fmt::Display for MeterVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mirror => write!(f, "mirror"),
            Self::MicTest => write!(f, "mictest"),
        }
    }
}

/// Per-session frequency analysis state.
///
/// Holds the FFT planner and the smoothed magnitude buffer that carries
/// across frames. The byte bin output itself has no identity across frames.
pub struct AnalysisContext {
    planner: FftPlanner<f32>,
    window_size: usize,
    smoothing: f32,
    magnitudes: Vec<f32>,
    closed: bool,
}

impl AnalysisContext {
    /// Creates an analysis context configured for the given meter variant.
    pub fn new(variant: MeterVariant) -> Self {
        let window_size = variant.window_size();
        Self {
            planner: FftPlanner::new(),
            window_size,
            smoothing: variant.smoothing(),
            magnitudes: vec![0.0; window_size / 2],
            closed: false,
        }
    }

    /// Number of frequency bins produced per frame (half the window size).
    pub fn bin_count(&self) -> usize {
        self.window_size / 2
    }

    /// Computes the current byte frequency data from the most recent samples.
    ///
    /// Takes the trailing `window_size` samples (zero-padded at the front if
    /// fewer are available), applies a Hann window, transforms, smooths the
    /// magnitudes against the previous frame, and maps each bin to 0-255 over
    /// a fixed decibel range. Returns all zeros once the context is closed.
    pub fn byte_frequency_data(&mut self, samples: &[i16]) -> Vec<u8> {
        if self.closed {
            return vec![0; self.bin_count()];
        }

        let n = self.window_size;
        let start = samples.len().saturating_sub(n);
        let recent = &samples[start..];
        let pad = n - recent.len();

        let mut buffer: Vec<Complex<f32>> = Vec::with_capacity(n);
        buffer.resize(pad, Complex::new(0.0, 0.0));
        for (i, sample) in recent.iter().enumerate() {
            let idx = pad + i;
            let window =
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * idx as f32 / n as f32).cos());
            buffer.push(Complex::new(f32::from(*sample) * window / 32768.0, 0.0));
        }

        let fft = self.planner.plan_fft_forward(n);
        fft.process(&mut buffer);

        let mut bins = Vec::with_capacity(self.bin_count());
        for (k, smoothed) in self.magnitudes.iter_mut().enumerate() {
            let magnitude = buffer[k].norm() / n as f32;
            *smoothed = self.smoothing * *smoothed + (1.0 - self.smoothing) * magnitude;
            bins.push(byte_from_magnitude(*smoothed));
        }
        bins
    }

    /// Closes the context. Idempotent; subsequent frames read as silence.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.magnitudes.fill(0.0);
            tracing::debug!("Analysis context closed");
        }
    }

    /// Whether the context has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Maps a linear magnitude to a byte over the fixed decibel display range.
fn byte_from_magnitude(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS) * 255.0;
    scaled.clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_bins_reduce_to_zero() {
        let bins = vec![0u8; 64];
        assert_eq!(MeterVariant::Mirror.reduce(&bins), 0);
        assert_eq!(MeterVariant::MicTest.reduce(&bins), 0);
    }

    #[test]
    fn max_reduction_returns_single_nonzero_bin() {
        let mut bins = vec![0u8; 64];
        bins[17] = 183;
        assert_eq!(MeterVariant::Mirror.reduce(&bins), 183);
    }

    #[test]
    fn mean_reduction_averages_all_bins() {
        let bins = vec![10u8; 128];
        assert_eq!(MeterVariant::MicTest.reduce(&bins), 10);

        let mut bins = vec![0u8; 4];
        bins[0] = 100;
        assert_eq!(MeterVariant::MicTest.reduce(&bins), 25);
    }

    #[test]
    fn silence_produces_silent_bins() {
        let mut ctx = AnalysisContext::new(MeterVariant::Mirror);
        let bins = ctx.byte_frequency_data(&[0i16; 1024]);
        assert_eq!(bins.len(), 64);
        assert!(bins.iter().all(|b| *b == 0));
    }

    #[test]
    fn loud_tone_registers_above_silence() {
        let mut ctx = AnalysisContext::new(MeterVariant::Mirror);
        // Full-scale square-ish tone at 1/8 of the window period.
        let samples: Vec<i16> = (0..1024)
            .map(|i| if (i / 8) % 2 == 0 { 20000 } else { -20000 })
            .collect();
        // Run several frames so smoothing converges upward.
        let mut bins = Vec::new();
        for _ in 0..8 {
            bins = ctx.byte_frequency_data(&samples);
        }
        assert!(MeterVariant::Mirror.reduce(&bins) > 0);
    }

    #[test]
    fn short_input_is_zero_padded() {
        let mut ctx = AnalysisContext::new(MeterVariant::MicTest);
        let bins = ctx.byte_frequency_data(&[1000i16; 10]);
        assert_eq!(bins.len(), 128);
    }

    #[test]
    fn closed_context_reads_as_silence() {
        let mut ctx = AnalysisContext::new(MeterVariant::Mirror);
        ctx.close();
        ctx.close(); // idempotent
        assert!(ctx.is_closed());
        let samples: Vec<i16> = (0..256).map(|i| (i * 100) as i16).collect();
        assert!(ctx.byte_frequency_data(&samples).iter().all(|b| *b == 0));
    }
}
