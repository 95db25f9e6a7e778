//! Configuration parameters for the whole analysis core

use crate::chord_detector::{ChordConfig, ChordDetector};
use crate::error::Result;
use crate::key_detector::{KeyConfig, KeyDetector};
use crate::tempo::{TempoConfig, TempoDetector};

/// Every detector's parameters in one value.
///
/// All fields default to the values documented on each sub-config; override
/// what you need and build the detectors from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisConfig {
    /// Tempo detection (frame/hop size, BPM range, onset thresholds).
    pub tempo: TempoConfig,
    /// Key detection (frame/hop size, major bias, third ratio bonus, profiles).
    pub key: KeyConfig,
    /// Chord detection (frame/hop size, correlation threshold, debounce length).
    pub chords: ChordConfig,
}

impl AnalysisConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.tempo.validate()?;
        self.key.validate()?;
        self.chords.validate()
    }

    /// Build a tempo detector from this configuration.
    pub fn tempo_detector(&self) -> Result<TempoDetector> {
        TempoDetector::new(self.tempo.clone())
    }

    /// Build a key detector from this configuration.
    pub fn key_detector(&self) -> Result<KeyDetector> {
        KeyDetector::new(self.key.clone())
    }

    /// Build a chord detector from this configuration.
    pub fn chord_detector(&self) -> Result<ChordDetector> {
        ChordDetector::new(self.chords.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;

    #[test]
    fn defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tempo.min_bpm, 60.0);
        assert_eq!(config.tempo.max_bpm, 200.0);
        assert_eq!(config.key.major_bias, 1.1);
        assert_eq!(config.chords.correlation_threshold, 0.5);
        assert_eq!(config.chords.min_run_length, 4);
    }

    #[test]
    fn overrides_flow_into_detectors() {
        let mut config = AnalysisConfig::default();
        config.tempo.max_bpm = 180.0;
        config.chords.min_run_length = 2;
        assert_eq!(config.tempo_detector().unwrap().config().max_bpm, 180.0);
        assert_eq!(config.chord_detector().unwrap().config().min_run_length, 2);
        assert!(config.key_detector().is_ok());
    }

    #[test]
    fn invalid_section_fails_to_build() {
        let mut config = AnalysisConfig::default();
        config.key.hop_size = 0;
        assert!(matches!(
            config.key_detector(),
            Err(AnalysisError::Configuration(_))
        ));
        assert!(config.validate().is_err());
    }
}
