//! # harmony_probe
//!
//! Offline music analysis over decoded audio: estimate tempo, musical key and
//! the chord progression of a complete in-memory signal.
//!
//! ## Example
//! ```rust
//! use harmony_probe::{ChordDetector, KeyDetector, SignalView, TempoDetector};
//!
//! fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     // 1) Borrow decoded samples
//!     let sample_rate = 44_100;
//!     let samples: Vec<f32> = (0..sample_rate * 2)
//!         .map(|n| {
//!             let t = n as f32 / sample_rate as f32;
//!             [261.63f32, 329.63, 392.0]
//!                 .iter()
//!                 .map(|f| (2.0 * std::f32::consts::PI * f * t).sin() / 3.0)
//!                 .sum::<f32>()
//!         })
//!         .collect();
//!     let signal = SignalView::mono(&samples, sample_rate as u32);
//!
//!     // 2) Build detectors
//!     let keys = KeyDetector::builder().major_bias(1.1).build()?;
//!     let chords = ChordDetector::builder().min_run_length(4).build()?;
//!
//!     // 3) Analyse
//!     let key = keys.detect_key(&signal)?;
//!     println!("{} ({:.2})", key.label(), key.confidence);
//!     println!("{:?}", chords.detect_chords(&signal)?);
//!
//!     // a sustained chord has no onsets to count
//!     assert!(TempoDetector::default().detect_tempo(&signal).is_err());
//!     Ok(())
//! }
//! # run().unwrap();
//! ```
//!
//! ## Features
//! - `parallel`: classify chord frames with `rayon`; results keep frame order.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rust_2018_idioms)]
#![deny(clippy::all)]

/// High‐level detector APIs.
pub use chord_detector::{
    Chord, ChordConfig, ChordDetector, ChordDetectorBuilder, ChordEvent, ChordKind,
};
pub use key_detector::{
    KeyCandidate, KeyConfig, KeyDetector, KeyDetectorBuilder, KeyEstimate, Mode,
};
pub use tempo::{TempoConfig, TempoDetector, TempoDetectorBuilder, TempoEstimate};

/// Building blocks shared by the detectors.
pub use chromagram::{ChromaConfig, Chromagram, ChromagramBuilder, ChromagramEngine};
pub use config::AnalysisConfig;
pub use error::{AnalysisError, NumericFault, Result};
pub use frames::{FrameExtractor, Frames};
pub use pitch::{NoteName, SEMITONES};
pub use signal::SignalView;
pub use spectrum::{compute_spectrum, SpectrumEngine};
pub use templates::{rotate, ChordTemplates, KeyProfiles, Profile};

/// Chord detection module.
pub mod chord_detector;
/// Chromagram computation module.
pub mod chromagram;
/// Combined configuration.
pub mod config;
/// Template similarity measures.
pub mod correlation;
/// Error types.
pub mod error;
/// Frame slicing.
pub mod frames;
/// Key detection module.
pub mod key_detector;
/// Pitch classes.
pub mod pitch;
/// Signal view and validation.
pub mod signal;
/// FFT magnitude spectrum.
pub mod spectrum;
/// Key profiles and chord templates.
pub mod templates;
/// Tempo detection module.
pub mod tempo;

/// Tempo of `signal` with default parameters.
pub fn detect_tempo(signal: &SignalView<'_>) -> Result<TempoEstimate> {
    TempoDetector::default().detect_tempo(signal)
}

/// Key of `signal` with default parameters.
pub fn detect_key(signal: &SignalView<'_>) -> Result<KeyEstimate> {
    KeyDetector::default().detect_key(signal)
}

/// Debounced chord labels of `signal` with default parameters.
pub fn detect_chords(signal: &SignalView<'_>) -> Result<Vec<String>> {
    ChordDetector::default().detect_chords(signal)
}
