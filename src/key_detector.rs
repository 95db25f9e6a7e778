//! Key detection
//!
//! Matches a whole-signal chromagram against rotated major and minor key
//! profiles. Each of the 24 candidates is scored with a weighted cosine
//! similarity that stresses the tonic, thirds and fifth; major candidates get
//! a small bias and either mode gets a bonus when its own third outweighs the
//! opposite one.

use std::fmt::Display;

use crate::chromagram::{ChromaConfig, Chromagram, ChromagramEngine};
use crate::correlation::weighted_cosine;
use crate::error::{AnalysisError, Result};
use crate::frames::FrameExtractor;
use crate::pitch::{NoteName, SEMITONES};
use crate::signal::SignalView;
use crate::spectrum::SpectrumEngine;
use crate::templates::{rotate, KeyProfiles, Profile};

const MAJOR_THIRD: usize = 4;
const MINOR_THIRD: usize = 3;
const FIFTH: usize = 7;

/// Major or minor mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Major (ionian).
    Major,
    /// Minor (aeolian).
    Minor,
}

impl Mode {
    /// Interval of this mode's third above the tonic.
    pub const fn third(self) -> usize {
        match self {
            Mode::Major => MAJOR_THIRD,
            Mode::Minor => MINOR_THIRD,
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
        })
    }
}

/// Estimated key of a signal.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct KeyEstimate {
    /// Tonic pitch class.
    pub tonic: NoteName,
    /// Major or minor.
    pub mode: Mode,
    /// Confidence in `[0.5, 0.95]`.
    pub confidence: f32,
}

impl KeyEstimate {
    /// Long form, e.g. `A minor`.
    pub fn label(&self) -> String {
        format!("{} {}", self.tonic, self.mode)
    }

    /// Chord-style short form, e.g. `Am`.
    pub fn short_label(&self) -> String {
        match self.mode {
            Mode::Major => self.tonic.to_string(),
            Mode::Minor => format!("{}m", self.tonic),
        }
    }
}

/// One scored (tonic, mode) hypothesis.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct KeyCandidate {
    /// Tonic pitch class.
    pub tonic: NoteName,
    /// Major or minor.
    pub mode: Mode,
    /// Biased correlation score; only comparable within one ranking.
    pub score: f32,
}

/// Key detection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyConfig {
    /// Frame length in samples, also the FFT size.
    pub frame_size: usize,
    /// Distance between frame starts in samples.
    pub hop_size: usize,
    /// Multiplier on major candidates' scores; 1.0 disables the bias.
    pub major_bias: f32,
    /// Relative bonus when a mode's own third outweighs the opposite third;
    /// 0.0 disables the ratio test.
    pub third_ratio_bonus: f32,
    /// Correlation weight of the tonic position.
    pub tonic_weight: f32,
    /// Correlation weight of both third positions.
    pub third_weight: f32,
    /// Correlation weight of the fifth position.
    pub fifth_weight: f32,
    /// Confidence weight of the relative best/second-best gap.
    pub gap_weight: f32,
    /// Confidence weight of the mode strength (own-third share).
    pub mode_weight: f32,
    /// Key profiles.
    pub profiles: KeyProfiles,
    /// Chroma mapping parameters.
    pub chroma: ChromaConfig,
}

impl Default for KeyConfig {
    fn default() -> Self {
        KeyConfig {
            frame_size: 8192,
            hop_size: 4096,
            major_bias: 1.1,
            third_ratio_bonus: 0.1,
            tonic_weight: 2.0,
            third_weight: 1.5,
            fifth_weight: 2.0,
            gap_weight: 2.0,
            mode_weight: 0.7,
            profiles: KeyProfiles::default(),
            chroma: ChromaConfig::default(),
        }
    }
}

impl KeyConfig {
    /// Check ranges.
    pub fn validate(&self) -> Result<()> {
        if self.frame_size < 2 {
            return Err(AnalysisError::Configuration("frame_size must be at least 2".into()));
        }
        if self.hop_size == 0 {
            return Err(AnalysisError::Configuration("hop_size cannot be zero".into()));
        }
        let positive = [
            ("major_bias", self.major_bias),
            ("tonic_weight", self.tonic_weight),
            ("third_weight", self.third_weight),
            ("fifth_weight", self.fifth_weight),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| !(*v > 0.0 && v.is_finite())) {
            return Err(AnalysisError::Configuration(format!(
                "{name} must be positive and finite"
            )));
        }
        let non_negative = [
            ("third_ratio_bonus", self.third_ratio_bonus),
            ("gap_weight", self.gap_weight),
            ("mode_weight", self.mode_weight),
        ];
        if let Some((name, _)) = non_negative
            .iter()
            .find(|(_, v)| !(*v >= 0.0 && v.is_finite()))
        {
            return Err(AnalysisError::Configuration(format!(
                "{name} must be non-negative and finite"
            )));
        }
        let profiles_ok = self
            .profiles
            .major
            .iter()
            .chain(&self.profiles.minor)
            .all(|v| *v >= 0.0 && v.is_finite());
        if !profiles_ok {
            return Err(AnalysisError::Configuration(
                "key profiles must be non-negative and finite".into(),
            ));
        }
        self.chroma.validate()
    }
}

/// Builder for [`KeyDetector`].
pub struct KeyDetectorBuilder {
    config: KeyConfig,
}

impl KeyDetectorBuilder {
    /// Default parameters: 8192-sample frames, hop 4096, major bias 1.1,
    /// third ratio bonus 0.1.
    pub fn new() -> Self {
        KeyDetectorBuilder {
            config: KeyConfig::default(),
        }
    }

    /// Set the frame length (and FFT size).
    pub fn frame_size(mut self, size: usize) -> Self {
        self.config.frame_size = size;
        self
    }

    /// Set the hop between frames.
    pub fn hop_size(mut self, hop: usize) -> Self {
        self.config.hop_size = hop;
        self
    }

    /// Set the major-over-minor score multiplier.
    pub fn major_bias(mut self, bias: f32) -> Self {
        self.config.major_bias = bias;
        self
    }

    /// Set the third ratio bonus.
    pub fn third_ratio_bonus(mut self, bonus: f32) -> Self {
        self.config.third_ratio_bonus = bonus;
        self
    }

    /// Set correlation weights for tonic, thirds and fifth.
    pub fn position_weights(mut self, tonic: f32, third: f32, fifth: f32) -> Self {
        self.config.tonic_weight = tonic;
        self.config.third_weight = third;
        self.config.fifth_weight = fifth;
        self
    }

    /// Set confidence weights for the score gap and the mode strength.
    pub fn confidence_weights(mut self, gap: f32, mode: f32) -> Self {
        self.config.gap_weight = gap;
        self.config.mode_weight = mode;
        self
    }

    /// Replace the key profiles.
    pub fn profiles(mut self, profiles: KeyProfiles) -> Self {
        self.config.profiles = profiles;
        self
    }

    /// Set the chroma mapping parameters.
    pub fn chroma(mut self, chroma: ChromaConfig) -> Self {
        self.config.chroma = chroma;
        self
    }

    /// Build the detector.
    pub fn build(self) -> Result<KeyDetector> {
        KeyDetector::new(self.config)
    }
}

impl Default for KeyDetectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Template-correlation key detector.
#[derive(Debug, Clone, Default)]
pub struct KeyDetector {
    config: KeyConfig,
}

impl KeyDetector {
    /// Start customizing with a builder.
    pub fn builder() -> KeyDetectorBuilder {
        KeyDetectorBuilder::new()
    }

    /// Create a detector from a validated configuration.
    pub fn new(config: KeyConfig) -> Result<Self> {
        config.validate()?;
        Ok(KeyDetector { config })
    }

    /// Parameters in effect.
    pub fn config(&self) -> &KeyConfig {
        &self.config
    }

    /// Estimate the key of a whole signal.
    pub fn detect_key(&self, signal: &SignalView<'_>) -> Result<KeyEstimate> {
        let chroma = self.signal_chromagram(signal)?;
        self.key_from_chromagram(&chroma)
    }

    /// Chromagram aggregated over every frame of the signal.
    pub fn signal_chromagram(&self, signal: &SignalView<'_>) -> Result<Chromagram> {
        signal.validate()?;
        log::debug!(
            "Detecting key: {} samples at {} Hz, frame={}, hop={}",
            signal.len(),
            signal.sample_rate(),
            self.config.frame_size,
            self.config.hop_size
        );

        let mono = signal.mixdown();
        let extractor = FrameExtractor::new(&mono, self.config.frame_size, self.config.hop_size)?;
        let spectrum = SpectrumEngine::new(self.config.frame_size)?;
        let engine = ChromagramEngine::builder()
            .config(self.config.chroma.clone())
            .sampling_rate(signal.sample_rate())
            .fft_size(self.config.frame_size)
            .build()?;

        let mut raw = [0.0; SEMITONES];
        for frame in extractor.frames() {
            engine.accumulate(&spectrum.magnitudes(&frame), &mut raw);
        }
        log::debug!("Aggregated chroma over {} frames", extractor.len());
        engine.finish(raw)
    }

    /// Decide the key for an already computed chromagram.
    pub fn key_from_chromagram(&self, chroma: &Chromagram) -> Result<KeyEstimate> {
        let ranked = self.rank_keys(chroma);
        let (best, second) = match ranked.as_slice() {
            [best, second, ..] => (*best, *second),
            _ => {
                return Err(AnalysisError::NoDetection(
                    "chromagram matches no key profile".into(),
                ))
            }
        };
        if !best.score.is_finite() {
            return Err(AnalysisError::non_finite("key detection", "candidate score"));
        }
        if best.score <= 0.0 {
            return Err(AnalysisError::division_by_zero("key detection", "best score"));
        }

        let gap = ((best.score - second.score) / best.score).clamp(0.0, 1.0);
        let mode_strength = third_share(chroma, best.tonic, best.mode);
        let confidence = (self.config.gap_weight * gap + self.config.mode_weight * mode_strength)
            .clamp(0.5, 0.95);

        log::debug!(
            "Key {} {} (score {:.3}, runner-up {} {} {:.3}, confidence {:.2})",
            best.tonic,
            best.mode,
            best.score,
            second.tonic,
            second.mode,
            second.score,
            confidence
        );

        Ok(KeyEstimate {
            tonic: best.tonic,
            mode: best.mode,
            confidence,
        })
    }

    /// All 24 candidates, best first.
    pub fn rank_keys(&self, chroma: &Chromagram) -> Vec<KeyCandidate> {
        let weights = self.position_weights();
        let mut candidates = Vec::with_capacity(2 * SEMITONES);

        for tonic in NoteName::ALL {
            let shift = tonic.index();
            let rotated_weights = rotate(&weights, shift);
            for (mode, profile) in [
                (Mode::Major, &self.config.profiles.major),
                (Mode::Minor, &self.config.profiles.minor),
            ] {
                let template = rotate(profile, shift);
                let Some(mut score) = weighted_cosine(chroma.bins(), &template, &rotated_weights)
                else {
                    continue;
                };
                if mode == Mode::Major {
                    score *= self.config.major_bias;
                }
                if own_third_dominates(chroma, tonic, mode) {
                    score *= 1.0 + self.config.third_ratio_bonus;
                }
                log::trace!("{tonic} {mode}: {score:.4}");
                candidates.push(KeyCandidate { tonic, mode, score });
            }
        }

        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates
    }

    /// Per-position correlation weights relative to the tonic.
    fn position_weights(&self) -> Profile {
        let mut weights = [1.0; SEMITONES];
        weights[0] = self.config.tonic_weight;
        weights[MINOR_THIRD] = self.config.third_weight;
        weights[MAJOR_THIRD] = self.config.third_weight;
        weights[FIFTH] = self.config.fifth_weight;
        weights
    }
}

/// Energies of the major and minor third above `tonic`.
fn thirds(chroma: &Chromagram, tonic: NoteName) -> (f32, f32) {
    (
        chroma.energy(tonic.transpose(MAJOR_THIRD)),
        chroma.energy(tonic.transpose(MINOR_THIRD)),
    )
}

fn own_third_dominates(chroma: &Chromagram, tonic: NoteName, mode: Mode) -> bool {
    let (major, minor) = thirds(chroma, tonic);
    match mode {
        Mode::Major => major > minor,
        Mode::Minor => minor > major,
    }
}

/// Share of third energy held by the mode's own third; 0.5 when both are silent.
fn third_share(chroma: &Chromagram, tonic: NoteName, mode: Mode) -> f32 {
    let (major, minor) = thirds(chroma, tonic);
    let total = major + minor;
    if total <= f32::EPSILON {
        return 0.5;
    }
    match mode {
        Mode::Major => major / total,
        Mode::Minor => minor / total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Chroma with the given pitch classes at full energy over a low floor.
    fn chroma_with(levels: &[(usize, f32)]) -> Chromagram {
        let mut bins = [0.05; SEMITONES];
        for &(pc, level) in levels {
            bins[pc] = level;
        }
        Chromagram::from_normalized(bins)
    }

    #[test]
    fn c_major_scale_is_c_major() {
        let chroma = chroma_with(&[
            (0, 1.0),
            (2, 0.5),
            (4, 0.8),
            (5, 0.5),
            (7, 0.9),
            (9, 0.5),
            (11, 0.4),
        ]);
        let key = KeyDetector::default().key_from_chromagram(&chroma).unwrap();
        assert_eq!((key.tonic, key.mode), (NoteName::C, Mode::Major));
        assert_eq!(key.label(), "C major");
        assert!((0.5..=0.95).contains(&key.confidence));
    }

    #[test]
    fn a_minor_triad_is_a_minor() {
        let chroma = chroma_with(&[(9, 1.0), (0, 0.85), (4, 0.95)]);
        let key = KeyDetector::default().key_from_chromagram(&chroma).unwrap();
        assert_eq!((key.tonic, key.mode), (NoteName::A, Mode::Minor));
        assert_eq!(key.short_label(), "Am");
    }

    #[test]
    fn ranking_has_all_candidates_sorted() {
        let chroma = chroma_with(&[(7, 1.0), (11, 0.8), (2, 0.9)]);
        let ranked = KeyDetector::default().rank_keys(&chroma);
        assert_eq!(ranked.len(), 24);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(ranked[0].tonic, NoteName::G);
    }

    #[test]
    fn major_bias_tips_relative_keys() {
        // equal evidence for C major and A minor
        let chroma = chroma_with(&[(0, 1.0), (4, 1.0), (9, 1.0), (7, 0.5)]);
        let biased = KeyDetector::builder()
            .major_bias(1.5)
            .build()
            .unwrap()
            .key_from_chromagram(&chroma)
            .unwrap();
        assert_eq!(biased.mode, Mode::Major);

        let unbiased = KeyDetector::builder()
            .major_bias(0.5)
            .build()
            .unwrap()
            .key_from_chromagram(&chroma)
            .unwrap();
        assert_eq!(unbiased.mode, Mode::Minor);
    }

    #[test]
    fn substituted_profiles_change_the_result() {
        // profiles that only reward the tonic: the loudest class wins as major
        let mut tonic_only = [0.0; SEMITONES];
        tonic_only[0] = 1.0;
        let detector = KeyDetector::builder()
            .profiles(KeyProfiles {
                major: tonic_only,
                minor: tonic_only,
            })
            .third_ratio_bonus(0.0)
            .build()
            .unwrap();
        let chroma = chroma_with(&[(2, 1.0), (9, 0.3)]);
        let key = detector.key_from_chromagram(&chroma).unwrap();
        assert_eq!((key.tonic, key.mode), (NoteName::D, Mode::Major));
    }

    #[test]
    fn third_ratio_bonus_scales_only_the_dominant_third() {
        // E outweighs D#: C major gets the bonus, C minor does not
        let chroma = chroma_with(&[(0, 1.0), (4, 0.9), (7, 0.8)]);
        let score = |bonus: f32, tonic: NoteName, mode: Mode| {
            KeyDetector::builder()
                .major_bias(1.0)
                .third_ratio_bonus(bonus)
                .build()
                .unwrap()
                .rank_keys(&chroma)
                .into_iter()
                .find(|c| c.tonic == tonic && c.mode == mode)
                .map(|c| c.score)
                .unwrap()
        };

        let major_ratio = score(0.5, NoteName::C, Mode::Major) / score(0.0, NoteName::C, Mode::Major);
        let minor_ratio = score(0.5, NoteName::C, Mode::Minor) / score(0.0, NoteName::C, Mode::Minor);
        assert!((major_ratio - 1.5).abs() < 1e-5, "{major_ratio}");
        assert!((minor_ratio - 1.0).abs() < 1e-6, "{minor_ratio}");

        // D# outweighs E: the bonus moves to the minor candidate
        let minor_chroma = chroma_with(&[(0, 1.0), (3, 0.9), (7, 0.8)]);
        let ranked = |bonus: f32| {
            KeyDetector::builder()
                .major_bias(1.0)
                .third_ratio_bonus(bonus)
                .build()
                .unwrap()
                .rank_keys(&minor_chroma)
        };
        let find = |list: &[KeyCandidate], mode: Mode| {
            list.iter()
                .find(|c| c.tonic == NoteName::C && c.mode == mode)
                .map(|c| c.score)
                .unwrap()
        };
        let (plain, boosted) = (ranked(0.0), ranked(0.5));
        assert!((find(&boosted, Mode::Minor) / find(&plain, Mode::Minor) - 1.5).abs() < 1e-5);
        assert!((find(&boosted, Mode::Major) / find(&plain, Mode::Major) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn sample_rate_below_chroma_range_is_a_configuration_error() {
        let samples: Vec<f32> = (0..9_000).map(|n| (n as f32 * 0.7).sin()).collect();
        let err = KeyDetector::default()
            .detect_key(&SignalView::mono(&samples, 30))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Configuration(_)), "{err}");
    }

    #[test]
    fn third_share_defaults_to_even() {
        let chroma = Chromagram::from_normalized([0.0; SEMITONES]);
        assert_eq!(third_share(&chroma, NoteName::C, Mode::Major), 0.5);
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(KeyDetector::builder().major_bias(0.0).build().is_err());
        assert!(KeyDetector::builder().third_ratio_bonus(-1.0).build().is_err());
        assert!(KeyDetector::builder().hop_size(0).build().is_err());
    }
}
