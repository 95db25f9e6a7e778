//! Chromagram
//!
//! Folds a magnitude spectrum into a 12-bin pitch-class energy vector.
//!
//! Each contributing spectral component is credited to the pitch classes of
//! its first few harmonics. The fractional MIDI pitch of every harmonic is
//! split between the nearest class and its neighbours with a `cos²` kernel,
//! so slightly mistuned content still lands proportionally. The raw vector is
//! then smoothed circularly across the octave and normalized by its maximum.

use std::{f32::consts::PI, ops::Index};

use crate::error::{AnalysisError, Result};
use crate::pitch::{frequency_to_midi, NoteName, SEMITONES};

/// Peaks weaker than this fraction of the strongest in-range bin are ignored.
const PEAK_FLOOR: f32 = 1e-2;

/// Total raw energy at or below this is treated as silence.
const EPSILON: f32 = 1e-10;

/// Normalized 12-bin pitch-class energy, index 0 = C.
///
/// Every value lies in `[0, 1]` and the strongest class is exactly 1.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Chromagram {
    bins: [f32; SEMITONES],
}

impl Chromagram {
    /// Wrap values that are already normalized.
    ///
    /// Values are clamped to `[0, 1]`; use [`ChromagramEngine::finish`] to
    /// normalize raw energies.
    pub fn from_normalized(bins: [f32; SEMITONES]) -> Self {
        Chromagram {
            bins: bins.map(|v| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }),
        }
    }

    /// Pitch-class energies.
    pub fn bins(&self) -> &[f32; SEMITONES] {
        &self.bins
    }

    /// Energy of one pitch class.
    pub fn energy(&self, note: NoteName) -> f32 {
        self.bins[note.index()]
    }

    /// Strongest pitch class.
    pub fn dominant(&self) -> NoteName {
        let idx = self
            .bins
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map_or(0, |(i, _)| i);
        NoteName::from_index(idx)
    }
}

impl Index<usize> for Chromagram {
    type Output = f32;

    fn index(&self, idx: usize) -> &f32 {
        &self.bins[idx]
    }
}

/// Tunable parameters of the chroma mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct ChromaConfig {
    /// Lowest frequency considered, in Hz.
    pub min_frequency: f32,
    /// Highest frequency considered, in Hz; clamped to Nyquist.
    pub max_frequency: f32,
    /// Harmonics credited per spectral component (1 = fundamental only).
    pub num_harmonics: usize,
    /// Weight ratio between consecutive harmonics.
    pub harmonic_decay: f32,
    /// Standard deviation in semitones of the circular smoothing kernel;
    /// 0 disables smoothing.
    pub smoothing_sigma: f32,
    /// Only feed local spectral maxima (with interpolated frequency) into the
    /// mapping instead of every bin.
    pub peak_picking: bool,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        ChromaConfig {
            min_frequency: 20.0,
            max_frequency: 8_000.0,
            num_harmonics: 5,
            harmonic_decay: 0.5,
            smoothing_sigma: 0.5,
            peak_picking: true,
        }
    }
}

impl ChromaConfig {
    /// Check ranges; called by every builder that embeds a chroma config.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_frequency > 0.0 && self.max_frequency.is_finite()) {
            return Err(AnalysisError::Configuration(
                "frequency range must be positive and finite".into(),
            ));
        }
        if self.max_frequency <= self.min_frequency {
            return Err(AnalysisError::Configuration(format!(
                "max_frequency ({}) must exceed min_frequency ({})",
                self.max_frequency, self.min_frequency
            )));
        }
        if self.num_harmonics == 0 {
            return Err(AnalysisError::Configuration("num_harmonics cannot be zero".into()));
        }
        if !(self.harmonic_decay > 0.0 && self.harmonic_decay <= 1.0) {
            return Err(AnalysisError::Configuration(
                "harmonic_decay must be in (0, 1]".into(),
            ));
        }
        if !(self.smoothing_sigma >= 0.0 && self.smoothing_sigma.is_finite()) {
            return Err(AnalysisError::Configuration(
                "smoothing_sigma must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for a [`ChromagramEngine`].
pub struct ChromagramBuilder {
    config: ChromaConfig,
    sampling_rate: u32,
    fft_size: usize,
}

impl ChromagramBuilder {
    /// Start with default parameters:
    /// sampling_rate = 44_100, fft_size = 4096, 20 Hz – 8 kHz,
    /// num_harmonics = 5, harmonic_decay = 0.5, smoothing_sigma = 0.5,
    /// peak_picking = true.
    pub fn new() -> Self {
        ChromagramBuilder {
            config: ChromaConfig::default(),
            sampling_rate: 44_100,
            fft_size: 4096,
        }
    }

    /// Replace every mapping parameter at once.
    pub fn config(mut self, config: ChromaConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the sampling rate of the analysed audio.
    pub fn sampling_rate(mut self, rate: u32) -> Self {
        self.sampling_rate = rate;
        self
    }

    /// Set the FFT size the spectra were computed with.
    pub fn fft_size(mut self, size: usize) -> Self {
        self.fft_size = size;
        self
    }

    /// Set the analysed frequency range in Hz.
    pub fn frequency_range(mut self, min: f32, max: f32) -> Self {
        self.config.min_frequency = min;
        self.config.max_frequency = max;
        self
    }

    /// Set the number of harmonics credited per component.
    pub fn num_harmonics(mut self, n: usize) -> Self {
        self.config.num_harmonics = n;
        self
    }

    /// Set the per-harmonic weight ratio.
    pub fn harmonic_decay(mut self, decay: f32) -> Self {
        self.config.harmonic_decay = decay;
        self
    }

    /// Set the smoothing kernel width in semitones.
    pub fn smoothing_sigma(mut self, sigma: f32) -> Self {
        self.config.smoothing_sigma = sigma;
        self
    }

    /// Toggle spectral peak picking.
    pub fn peak_picking(mut self, on: bool) -> Self {
        self.config.peak_picking = on;
        self
    }

    /// Finalize and create the engine.
    pub fn build(self) -> Result<ChromagramEngine> {
        self.config.validate()?;
        if self.sampling_rate == 0 {
            return Err(AnalysisError::Configuration("sampling_rate cannot be zero".into()));
        }
        if self.fft_size < 2 {
            return Err(AnalysisError::Configuration("fft_size must be at least 2".into()));
        }

        let nyquist = self.sampling_rate as f32 / 2.0;
        let max_frequency = if self.config.max_frequency > nyquist {
            log::warn!(
                "max_frequency {:.1} Hz above Nyquist {:.1} Hz, clamping",
                self.config.max_frequency,
                nyquist
            );
            nyquist
        } else {
            self.config.max_frequency
        };

        let bin_width = self.sampling_rate as f32 / self.fft_size as f32;
        let last_bin = self.fft_size / 2;
        let first_bin = ((self.config.min_frequency / bin_width).ceil() as usize).max(1);
        let end_bin = ((max_frequency / bin_width).floor() as usize).min(last_bin);
        if first_bin > end_bin {
            return Err(AnalysisError::Configuration(format!(
                "no FFT bin between {:.1} Hz and {:.1} Hz at {} Hz / {} points",
                self.config.min_frequency, max_frequency, self.sampling_rate, self.fft_size
            )));
        }

        let harmonic_weights = (0..self.config.num_harmonics)
            .map(|h| self.config.harmonic_decay.powi(h as i32))
            .collect();

        Ok(ChromagramEngine {
            smoothing_kernel: gaussian_kernel(self.config.smoothing_sigma),
            config: self.config,
            bin_width,
            first_bin,
            end_bin,
            harmonic_weights,
        })
    }
}

impl Default for ChromagramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Spectrum → chroma mapping for one sampling rate and FFT size.
#[derive(Debug, Clone)]
pub struct ChromagramEngine {
    config: ChromaConfig,
    bin_width: f32,
    first_bin: usize,
    end_bin: usize,
    harmonic_weights: Vec<f32>,
    smoothing_kernel: Vec<f32>,
}

impl ChromagramEngine {
    /// Start customizing with a builder.
    pub fn builder() -> ChromagramBuilder {
        ChromagramBuilder::new()
    }

    /// Parameters in effect.
    pub fn config(&self) -> &ChromaConfig {
        &self.config
    }

    /// Add the pitch-class energy of one magnitude spectrum to `raw`.
    ///
    /// `raw` is left unnormalized so several frames can be summed before a
    /// single [`finish`](Self::finish).
    pub fn accumulate(&self, magnitudes: &[f32], raw: &mut [f32; SEMITONES]) {
        if magnitudes.len() < 2 {
            return;
        }
        let end = self.end_bin.min(magnitudes.len() - 1);
        if self.first_bin > end {
            return;
        }

        if !self.config.peak_picking {
            for (k, &mag) in magnitudes.iter().enumerate().take(end + 1).skip(self.first_bin) {
                if mag > 0.0 {
                    self.spread(k as f32 * self.bin_width, mag, raw);
                }
            }
            return;
        }

        let strongest = magnitudes[self.first_bin..=end]
            .iter()
            .cloned()
            .fold(0.0f32, f32::max);
        if strongest <= 0.0 {
            return;
        }
        let floor = strongest * PEAK_FLOOR;

        for k in self.first_bin..=end {
            let mag = magnitudes[k];
            let left = magnitudes[k - 1];
            let right = magnitudes.get(k + 1).copied().unwrap_or(0.0);
            if mag <= floor || mag <= left || mag < right {
                continue;
            }
            let (offset, peak) = interpolate_peak(left, mag, right);
            self.spread((k as f32 + offset) * self.bin_width, peak, raw);
        }
    }

    /// Smooth and normalize accumulated energy.
    ///
    /// Fails with [`AnalysisError::NoDetection`] for zero energy (silent or
    /// flat input) and [`AnalysisError::InternalComputation`] if a value is
    /// not finite.
    pub fn finish(&self, raw: [f32; SEMITONES]) -> Result<Chromagram> {
        if raw.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::non_finite("chromagram", "pitch-class energy"));
        }
        let total: f32 = raw.iter().sum();
        if total <= EPSILON {
            return Err(AnalysisError::NoDetection(
                "chromagram has no energy".into(),
            ));
        }

        let smoothed = self.smooth(&raw);
        let max = smoothed.iter().cloned().fold(0.0f32, f32::max);
        if max <= 0.0 {
            return Err(AnalysisError::division_by_zero("chromagram", "maximum energy"));
        }
        Ok(Chromagram::from_normalized(smoothed.map(|v| v / max)))
    }

    /// Chromagram of a single magnitude spectrum.
    pub fn compute(&self, magnitudes: &[f32]) -> Result<Chromagram> {
        let mut raw = [0.0; SEMITONES];
        self.accumulate(magnitudes, &mut raw);
        self.finish(raw)
    }

    /// Credit `energy` at `freq` to the pitch classes of its harmonics.
    fn spread(&self, freq: f32, energy: f32, raw: &mut [f32; SEMITONES]) {
        for (h, &weight) in self.harmonic_weights.iter().enumerate() {
            let midi = frequency_to_midi(freq * (h + 1) as f32);
            let nearest = midi.round();
            let deviation = midi - nearest;
            let pitch_class = (nearest as i64).rem_euclid(SEMITONES as i64) as usize;

            for offset in -1i64..=1 {
                let distance = (deviation - offset as f32).abs();
                if distance >= 1.0 {
                    continue;
                }
                let share = (0.5 * PI * distance).cos().powi(2);
                let target = (pitch_class as i64 + offset).rem_euclid(SEMITONES as i64) as usize;
                raw[target] += energy * weight * share;
            }
        }
    }

    fn smooth(&self, raw: &[f32; SEMITONES]) -> [f32; SEMITONES] {
        let radius = self.smoothing_kernel.len() / 2;
        let mut out = [0.0; SEMITONES];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self
                .smoothing_kernel
                .iter()
                .enumerate()
                .map(|(k, &w)| w * raw[(i + SEMITONES * 2 + k - radius) % SEMITONES])
                .sum();
        }
        out
    }
}

/// Fractional bin offset and height of a parabola through three points.
fn interpolate_peak(left: f32, centre: f32, right: f32) -> (f32, f32) {
    let denom = left - 2.0 * centre + right;
    if denom.abs() <= f32::EPSILON {
        return (0.0, centre);
    }
    let offset = (0.5 * (left - right) / denom).clamp(-0.5, 0.5);
    (offset, centre - 0.25 * (left - right) * offset)
}

/// Unit-sum circular Gaussian kernel; `[1.0]` when `sigma` is zero.
fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    if sigma <= 0.0 {
        return vec![1.0];
    }
    let radius = ((2.0 * sigma).ceil() as usize).clamp(1, SEMITONES / 2 - 1);
    let weights: Vec<f32> = (0..=2 * radius)
        .map(|k| {
            let d = k as f32 - radius as f32;
            (-d * d / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}
