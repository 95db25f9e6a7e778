//! Tempo detection
//!
//! Onsets are frames whose RMS energy clears an absolute floor and jumps by a
//! fixed ratio over the previous frame. Inter-onset intervals become BPM
//! candidates; the median of the plausible ones is the estimate and their
//! spread sets the confidence.

use crate::error::{AnalysisError, Result};
use crate::frames::FrameExtractor;
use crate::signal::SignalView;

/// Estimated tempo.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TempoEstimate {
    /// Beats per minute, unrounded.
    pub bpm: f32,
    /// Confidence in `[0, 1]`; tighter interval clustering scores higher.
    pub confidence: f32,
}

/// Tempo detection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoConfig {
    /// RMS frame length in samples.
    pub frame_size: usize,
    /// Distance between frame starts in samples.
    pub hop_size: usize,
    /// Lowest plausible tempo.
    pub min_bpm: f32,
    /// Highest plausible tempo.
    pub max_bpm: f32,
    /// Energy ratio over the previous frame that marks an onset.
    pub onset_relative_threshold: f32,
    /// Minimum RMS for a frame to count as an onset.
    pub onset_absolute_threshold: f32,
}

impl Default for TempoConfig {
    fn default() -> Self {
        TempoConfig {
            frame_size: 1024,
            hop_size: 512,
            min_bpm: 60.0,
            max_bpm: 200.0,
            onset_relative_threshold: 1.5,
            onset_absolute_threshold: 0.01,
        }
    }
}

impl TempoConfig {
    /// Check ranges.
    pub fn validate(&self) -> Result<()> {
        if self.frame_size == 0 || self.hop_size == 0 {
            return Err(AnalysisError::Configuration(
                "frame_size and hop_size must be positive".into(),
            ));
        }
        if !(self.min_bpm > 0.0 && self.max_bpm.is_finite() && self.max_bpm > self.min_bpm) {
            return Err(AnalysisError::Configuration(format!(
                "invalid BPM range {}..{}",
                self.min_bpm, self.max_bpm
            )));
        }
        if !(self.onset_relative_threshold >= 1.0 && self.onset_relative_threshold.is_finite()) {
            return Err(AnalysisError::Configuration(
                "onset_relative_threshold must be at least 1".into(),
            ));
        }
        if !(self.onset_absolute_threshold >= 0.0 && self.onset_absolute_threshold.is_finite()) {
            return Err(AnalysisError::Configuration(
                "onset_absolute_threshold must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`TempoDetector`].
pub struct TempoDetectorBuilder {
    config: TempoConfig,
}

impl TempoDetectorBuilder {
    /// Default parameters: 1024-sample frames, hop 512, 60–200 BPM,
    /// relative threshold 1.5, absolute threshold 0.01.
    pub fn new() -> Self {
        TempoDetectorBuilder {
            config: TempoConfig::default(),
        }
    }

    /// Set the RMS frame length.
    pub fn frame_size(mut self, size: usize) -> Self {
        self.config.frame_size = size;
        self
    }

    /// Set the hop between frames.
    pub fn hop_size(mut self, hop: usize) -> Self {
        self.config.hop_size = hop;
        self
    }

    /// Set the plausible BPM range.
    pub fn bpm_range(mut self, min: f32, max: f32) -> Self {
        self.config.min_bpm = min;
        self.config.max_bpm = max;
        self
    }

    /// Set the onset energy-rise ratio.
    pub fn onset_relative_threshold(mut self, ratio: f32) -> Self {
        self.config.onset_relative_threshold = ratio;
        self
    }

    /// Set the onset RMS floor.
    pub fn onset_absolute_threshold(mut self, rms: f32) -> Self {
        self.config.onset_absolute_threshold = rms;
        self
    }

    /// Build the detector.
    pub fn build(self) -> Result<TempoDetector> {
        TempoDetector::new(self.config)
    }
}

impl Default for TempoDetectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Energy-onset tempo detector.
#[derive(Debug, Clone, Default)]
pub struct TempoDetector {
    config: TempoConfig,
}

impl TempoDetector {
    /// Start customizing with a builder.
    pub fn builder() -> TempoDetectorBuilder {
        TempoDetectorBuilder::new()
    }

    /// Create a detector from a validated configuration.
    pub fn new(config: TempoConfig) -> Result<Self> {
        config.validate()?;
        Ok(TempoDetector { config })
    }

    /// Parameters in effect.
    pub fn config(&self) -> &TempoConfig {
        &self.config
    }

    /// Onset times in seconds, in increasing order.
    pub fn detect_onsets(&self, signal: &SignalView<'_>) -> Result<Vec<f32>> {
        signal.validate()?;
        log::debug!(
            "Detecting onsets: {} samples at {} Hz, frame={}, hop={}",
            signal.len(),
            signal.sample_rate(),
            self.config.frame_size,
            self.config.hop_size
        );

        let mono = signal.mixdown();
        let extractor = FrameExtractor::new(&mono, self.config.frame_size, self.config.hop_size)?;

        let energies = extractor
            .frames()
            .map(|frame| {
                let rms = (frame.iter().map(|&x| x * x).sum::<f32>() / frame.len() as f32).sqrt();
                if rms.is_finite() {
                    Ok(rms)
                } else {
                    Err(AnalysisError::non_finite("onset detection", "frame energy"))
                }
            })
            .collect::<Result<Vec<f32>>>()?;

        let onsets: Vec<f32> = energies
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| {
                pair[1] > self.config.onset_absolute_threshold
                    && pair[1] > self.config.onset_relative_threshold * pair[0]
            })
            .map(|(i, _)| extractor.frame_time(i + 1, signal.sample_rate()))
            .collect();

        log::debug!("Found {} onsets in {} frames", onsets.len(), energies.len());
        Ok(onsets)
    }

    /// Estimate the tempo of a whole signal.
    pub fn detect_tempo(&self, signal: &SignalView<'_>) -> Result<TempoEstimate> {
        let onsets = self.detect_onsets(signal)?;
        if onsets.len() < 2 {
            return Err(AnalysisError::NoDetection(format!(
                "need at least 2 onsets, found {}",
                onsets.len()
            )));
        }

        let mut candidates: Vec<f32> = onsets
            .windows(2)
            .map(|w| w[1] - w[0])
            .filter(|&interval| interval > 0.0)
            .map(|interval| 60.0 / interval)
            .filter(|bpm| (self.config.min_bpm..=self.config.max_bpm).contains(bpm))
            .collect();
        if candidates.is_empty() {
            return Err(AnalysisError::NoDetection(format!(
                "no inter-onset interval within {}..{} BPM",
                self.config.min_bpm, self.config.max_bpm
            )));
        }
        candidates.sort_by(f32::total_cmp);

        let bpm = median(&candidates);
        let confidence = clustering_confidence(&candidates);

        log::debug!(
            "Tempo {:.2} BPM from {} candidates (confidence {:.2})",
            bpm,
            candidates.len(),
            confidence
        );
        Ok(TempoEstimate { bpm, confidence })
    }
}

/// Median of an already sorted, non-empty slice.
fn median(sorted: &[f32]) -> f32 {
    let mid = sorted.len() / 2;
    if mid * 2 == sorted.len() {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// `1 - std / mean` of non-empty, positive BPM candidates, clamped to `[0, 1]`.
fn clustering_confidence(candidates: &[f32]) -> f32 {
    let n = candidates.len() as f32;
    let mean = candidates.iter().sum::<f32>() / n;
    let variance = candidates.iter().map(|b| (b - mean).powi(2)).sum::<f32>() / n;
    (1.0 - variance.sqrt() / mean).clamp(0.0, 1.0)
}
