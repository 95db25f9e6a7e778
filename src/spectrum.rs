//! Spectrum
//!
//! Hamming-windowed FFT magnitude spectrum of one frame.

use std::{f32::consts::PI, sync::Arc};

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::{AnalysisError, Result};

/// Planned forward FFT plus its analysis window.
///
/// Planning happens once in [`SpectrumEngine::new`]; [`SpectrumEngine::magnitudes`]
/// only takes `&self`, so one engine can serve many frames and threads.
#[derive(Clone)]
pub struct SpectrumEngine {
    fft_size: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for SpectrumEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumEngine")
            .field("fft_size", &self.fft_size)
            .finish_non_exhaustive()
    }
}

impl SpectrumEngine {
    /// Plan an FFT of `fft_size` points.
    pub fn new(fft_size: usize) -> Result<Self> {
        if fft_size < 2 {
            return Err(AnalysisError::Configuration(format!(
                "fft_size must be at least 2, got {fft_size}"
            )));
        }
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        Ok(SpectrumEngine {
            fft_size,
            window: hamming_window(fft_size),
            fft,
        })
    }

    /// FFT length in samples.
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of magnitude bins produced (`fft_size / 2 + 1`).
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Width of one bin in Hz at `sample_rate`.
    pub fn bin_width(&self, sample_rate: u32) -> f32 {
        sample_rate as f32 / self.fft_size as f32
    }

    /// Linear magnitudes of bins `0..=fft_size/2`.
    ///
    /// Shorter frames are zero-padded, longer ones truncated.
    pub fn magnitudes(&self, frame: &[f32]) -> Vec<f32> {
        let mut buffer = vec![Complex { re: 0.0, im: 0.0 }; self.fft_size];
        for ((slot, &sample), &w) in buffer.iter_mut().zip(frame).zip(&self.window) {
            slot.re = sample * w;
        }

        self.fft.process(&mut buffer);

        buffer[..self.num_bins()]
            .iter()
            .map(|c| (c.re * c.re + c.im * c.im).sqrt())
            .collect()
    }
}

/// Magnitude spectrum of `samples` with a freshly planned FFT.
///
/// Convenience for one-off use; detectors keep a [`SpectrumEngine`] instead.
pub fn compute_spectrum(samples: &[f32], fft_size: usize) -> Result<Vec<f32>> {
    Ok(SpectrumEngine::new(fft_size)?.magnitudes(samples))
}

/// Hamming window of `size` points.
fn hamming_window(size: usize) -> Vec<f32> {
    let denom = (size - 1) as f32;
    (0..size)
        .map(|n| 0.54 - 0.46 * (2.0 * PI * n as f32 / denom).cos())
        .collect()
}
