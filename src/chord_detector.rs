//! Chord Detector
//!
//! Frame-by-frame chord classification by correlating chromagrams against
//! rotated chord templates, followed by a run-length debounce that turns the
//! per-frame labels into a chord progression.

use std::fmt::Display;

use crate::chromagram::{ChromaConfig, Chromagram, ChromagramEngine};
use crate::correlation::pearson;
use crate::error::{AnalysisError, Result};
use crate::frames::FrameExtractor;
use crate::pitch::{NoteName, SEMITONES};
use crate::signal::SignalView;
use crate::spectrum::SpectrumEngine;
use crate::templates::{rotate, ChordTemplates};

/// Represents a musical chord detected in one analysis frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Chord {
    /// The root note of the detected chord.
    pub root: NoteName,
    /// The quality (e.g., Major, Minor) of the detected chord.
    pub quality: ChordKind,
    /// Template correlation in `[-1, 1]`; higher is a better match.
    pub confidence: f32,
}

impl Chord {
    /// Display label such as `C`, `F#m`, `Bdim` or `Caug`.
    pub fn label(&self) -> String {
        chord_label(self.root, self.quality)
    }
}

/// Root name followed by the quality suffix.
fn chord_label(root: NoteName, quality: ChordKind) -> String {
    format!("{root}{}", quality.suffix())
}

/// Supported chord qualities
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChordKind {
    /// Major chord (e.g., C-E-G)
    Major,
    /// Minor chord (e.g., C-Eb-G)
    Minor,
    /// Diminished chord (e.g., C-Eb-Gb)
    Diminished,
    /// Augmented chord (e.g., C-E-G#)
    Augmented,
}

impl ChordKind {
    /// Every quality in default evaluation order.
    pub const ALL: [ChordKind; 4] = [
        ChordKind::Major,
        ChordKind::Minor,
        ChordKind::Diminished,
        ChordKind::Augmented,
    ];

    /// Semitone intervals above the root.
    pub const fn intervals(self) -> &'static [usize] {
        match self {
            ChordKind::Major => &[0, 4, 7],
            ChordKind::Minor => &[0, 3, 7],
            ChordKind::Diminished => &[0, 3, 6],
            ChordKind::Augmented => &[0, 4, 8],
        }
    }

    /// Label suffix appended to the root name.
    pub const fn suffix(self) -> &'static str {
        match self {
            ChordKind::Major => "",
            ChordKind::Minor => "m",
            ChordKind::Diminished => "dim",
            ChordKind::Augmented => "aug",
        }
    }
}

impl Display for ChordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// One segment of the debounced chord progression.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordEvent {
    /// Root of the chord.
    pub root: NoteName,
    /// Quality of the chord.
    pub quality: ChordKind,
    /// Display label, e.g. `Am`.
    pub label: String,
    /// Segment start in seconds.
    pub start_time: f32,
    /// Segment length in seconds.
    pub duration: f32,
}

/// Chord detection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordConfig {
    /// Analysis frame length in samples, also the FFT size.
    pub frame_size: usize,
    /// Distance between frame starts in samples.
    pub hop_size: usize,
    /// Frames whose best correlation falls below this carry no chord.
    pub correlation_threshold: f32,
    /// Runs shorter than this many frames are discarded as transients.
    pub min_run_length: usize,
    /// Chroma mapping parameters.
    pub chroma: ChromaConfig,
    /// Chord quality templates.
    pub templates: ChordTemplates,
}

impl Default for ChordConfig {
    fn default() -> Self {
        ChordConfig {
            frame_size: 4096,
            hop_size: 2048,
            correlation_threshold: 0.5,
            min_run_length: 4,
            chroma: ChromaConfig::default(),
            templates: ChordTemplates::default(),
        }
    }
}

impl ChordConfig {
    /// Check ranges.
    pub fn validate(&self) -> Result<()> {
        if self.frame_size < 2 {
            return Err(AnalysisError::Configuration("frame_size must be at least 2".into()));
        }
        if self.hop_size == 0 {
            return Err(AnalysisError::Configuration("hop_size cannot be zero".into()));
        }
        if !(-1.0..=1.0).contains(&self.correlation_threshold) {
            return Err(AnalysisError::Configuration(
                "correlation_threshold must be in [-1, 1]".into(),
            ));
        }
        if self.templates.is_empty() {
            return Err(AnalysisError::Configuration("no chord templates configured".into()));
        }
        self.chroma.validate()
    }
}

/// Builder for `ChordDetector`
pub struct ChordDetectorBuilder {
    config: ChordConfig,
}

impl ChordDetectorBuilder {
    /// Create a new builder with default parameters:
    /// frame_size = 4096, hop_size = 2048, correlation_threshold = 0.5,
    /// min_run_length = 4, triad templates.
    pub fn new() -> Self {
        ChordDetectorBuilder {
            config: ChordConfig::default(),
        }
    }

    /// Set the analysis frame length (and FFT size).
    pub fn frame_size(mut self, size: usize) -> Self {
        self.config.frame_size = size;
        self
    }

    /// Set the hop between frames.
    pub fn hop_size(mut self, hop: usize) -> Self {
        self.config.hop_size = hop;
        self
    }

    /// Set the minimum correlation for a frame to carry a chord.
    pub fn correlation_threshold(mut self, value: f32) -> Self {
        self.config.correlation_threshold = value;
        self
    }

    /// Set the debounce length in frames.
    pub fn min_run_length(mut self, frames: usize) -> Self {
        self.config.min_run_length = frames;
        self
    }

    /// Set the chroma mapping parameters.
    pub fn chroma(mut self, chroma: ChromaConfig) -> Self {
        self.config.chroma = chroma;
        self
    }

    /// Replace the chord templates.
    pub fn templates(mut self, templates: ChordTemplates) -> Self {
        self.config.templates = templates;
        self
    }

    /// Build the `ChordDetector`
    pub fn build(self) -> Result<ChordDetector> {
        ChordDetector::new(self.config)
    }
}

impl Default for ChordDetectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Template-correlation chord detector.
///
/// Holds only immutable configuration and precomputed rotations; every method
/// takes `&self`, so one detector can be shared between threads.
#[derive(Debug, Clone)]
pub struct ChordDetector {
    config: ChordConfig,
    profiles: Vec<(NoteName, ChordKind, [f32; SEMITONES])>,
}

impl ChordDetector {
    /// Return a builder to customize detection
    pub fn builder() -> ChordDetectorBuilder {
        ChordDetectorBuilder::new()
    }

    /// Create a detector from a validated configuration.
    pub fn new(config: ChordConfig) -> Result<Self> {
        config.validate()?;
        let profiles = rotated_profiles(&config.templates);
        Ok(ChordDetector { config, profiles })
    }

    /// Parameters in effect.
    pub fn config(&self) -> &ChordConfig {
        &self.config
    }

    /// Best chord for one chromagram, or `None` when no template reaches the
    /// correlation threshold.
    pub fn detect_chord(&self, chroma: &Chromagram) -> Option<Chord> {
        self.rank_chords(chroma, 1)
            .into_iter()
            .next()
            .filter(|c| c.confidence >= self.config.correlation_threshold)
    }

    /// Up to `k` chords ordered by decreasing correlation, threshold ignored.
    pub fn rank_chords(&self, chroma: &Chromagram, k: usize) -> Vec<Chord> {
        let mut scored: Vec<Chord> = self
            .profiles
            .iter()
            .filter_map(|(root, quality, profile)| {
                pearson(chroma.bins(), profile).map(|confidence| Chord {
                    root: *root,
                    quality: *quality,
                    confidence,
                })
            })
            .collect();
        // stable sort keeps the lowest root first among equal scores
        scored.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        scored.truncate(k);
        scored
    }

    /// Debounced chord progression as labels, e.g. `["C", "F", "G", "C"]`.
    pub fn detect_chords(&self, signal: &SignalView<'_>) -> Result<Vec<String>> {
        Ok(self
            .detect_chord_events(signal)?
            .into_iter()
            .map(|e| e.label)
            .collect())
    }

    /// Debounced chord progression with timing.
    pub fn detect_chord_events(&self, signal: &SignalView<'_>) -> Result<Vec<ChordEvent>> {
        signal.validate()?;
        let sample_rate = signal.sample_rate();
        log::debug!(
            "Detecting chords: {} samples at {} Hz, frame={}, hop={}",
            signal.len(),
            sample_rate,
            self.config.frame_size,
            self.config.hop_size
        );

        let mono = signal.mixdown();
        let extractor = FrameExtractor::new(&mono, self.config.frame_size, self.config.hop_size)?;
        let spectrum = SpectrumEngine::new(self.config.frame_size)?;
        let engine = ChromagramEngine::builder()
            .config(self.config.chroma.clone())
            .sampling_rate(sample_rate)
            .fft_size(self.config.frame_size)
            .build()?;

        let labels = self.label_frames(&extractor, &spectrum, &engine)?;
        let runs = debounce(&labels, self.config.min_run_length);
        log::debug!(
            "Classified {} frames into {} chord runs",
            labels.len(),
            runs.len()
        );

        let seconds_per_frame = self.config.hop_size as f32 / sample_rate as f32;
        let events: Vec<ChordEvent> = runs
            .iter()
            .map(|run| run.event(seconds_per_frame))
            .collect();

        if events.is_empty() {
            return Err(AnalysisError::NoDetection(
                "no chord survived debouncing".into(),
            ));
        }
        Ok(events)
    }

    #[cfg(not(feature = "parallel"))]
    fn label_frames(
        &self,
        extractor: &FrameExtractor<'_>,
        spectrum: &SpectrumEngine,
        engine: &ChromagramEngine,
    ) -> Result<Vec<Option<ChordLabel>>> {
        extractor
            .frames()
            .map(|frame| self.label_frame(&frame, spectrum, engine))
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn label_frames(
        &self,
        extractor: &FrameExtractor<'_>,
        spectrum: &SpectrumEngine,
        engine: &ChromagramEngine,
    ) -> Result<Vec<Option<ChordLabel>>> {
        use rayon::prelude::*;

        let frames: Vec<_> = extractor.frames().collect();
        frames
            .par_iter()
            .map(|frame| self.label_frame(frame, spectrum, engine))
            .collect()
    }

    fn label_frame(
        &self,
        frame: &[f32],
        spectrum: &SpectrumEngine,
        engine: &ChromagramEngine,
    ) -> Result<Option<ChordLabel>> {
        match engine.compute(&spectrum.magnitudes(frame)) {
            Ok(chroma) => Ok(self.detect_chord(&chroma).map(|c| (c.root, c.quality))),
            Err(AnalysisError::NoDetection(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Default for ChordDetector {
    fn default() -> Self {
        let config = ChordConfig::default();
        let profiles = rotated_profiles(&config.templates);
        ChordDetector { config, profiles }
    }
}

/// Every template at every root, grouped by quality in template order.
fn rotated_profiles(templates: &ChordTemplates) -> Vec<(NoteName, ChordKind, [f32; SEMITONES])> {
    templates
        .iter()
        .flat_map(|&(kind, template)| {
            NoteName::ALL
                .iter()
                .map(move |&root| (root, kind, rotate(&template, root.index())))
        })
        .collect()
}

type ChordLabel = (NoteName, ChordKind);

/// A surviving run of identical chord frames.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Run {
    chord: ChordLabel,
    start: usize,
    len: usize,
}

impl Run {
    fn event(&self, seconds_per_frame: f32) -> ChordEvent {
        let (root, quality) = self.chord;
        ChordEvent {
            root,
            quality,
            label: chord_label(root, quality),
            start_time: self.start as f32 * seconds_per_frame,
            duration: self.len as f32 * seconds_per_frame,
        }
    }
}

/// Collapse per-frame labels into runs, drop runs shorter than `min_len`
/// (no-chord runs included), merge equal neighbours that become adjacent and
/// discard the remaining no-chord runs.
fn debounce(labels: &[Option<ChordLabel>], min_len: usize) -> Vec<Run> {
    let mut raw: Vec<(Option<ChordLabel>, usize, usize)> = Vec::new();
    for (i, &label) in labels.iter().enumerate() {
        match raw.last_mut() {
            Some((prev, _, len)) if *prev == label => *len += 1,
            _ => raw.push((label, i, 1)),
        }
    }

    let mut merged: Vec<(Option<ChordLabel>, usize, usize)> = Vec::new();
    for (label, start, len) in raw.into_iter().filter(|r| r.2 >= min_len) {
        match merged.last_mut() {
            Some((prev, prev_start, prev_len)) if *prev == label => {
                *prev_len = start + len - *prev_start;
            }
            _ => merged.push((label, start, len)),
        }
    }

    merged
        .into_iter()
        .filter_map(|(label, start, len)| label.map(|chord| Run { chord, start, len }))
        .collect()
}
