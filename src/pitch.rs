//! Pitch classes
//!
//! Note names and the frequency → MIDI pitch mapping used by the
//! chromagram.

use std::fmt::Display;

/// Number of pitch classes in an octave.
pub const SEMITONES: usize = 12;

/// Twelve chromatic pitch classes
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NoteName {
    /// C
    C,
    /// C sharp / D flat
    Cs,
    /// D
    D,
    /// D sharp / E flat
    Ds,
    /// E
    E,
    /// F
    F,
    /// F sharp / G flat
    Fs,
    /// G
    G,
    /// G sharp / A flat
    Gs,
    /// A
    A,
    /// A sharp / B flat
    As,
    /// B
    B,
}

impl NoteName {
    /// All pitch classes in chromatic order starting from C.
    pub const ALL: [NoteName; SEMITONES] = [
        NoteName::C,
        NoteName::Cs,
        NoteName::D,
        NoteName::Ds,
        NoteName::E,
        NoteName::F,
        NoteName::Fs,
        NoteName::G,
        NoteName::Gs,
        NoteName::A,
        NoteName::As,
        NoteName::B,
    ];

    /// Pitch class for an index; wraps modulo 12.
    pub const fn from_index(idx: usize) -> NoteName {
        Self::ALL[idx % SEMITONES]
    }

    /// Index 0..11 with C = 0.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Sharp spelling used in chord and key labels.
    pub const fn symbol(self) -> &'static str {
        match self {
            NoteName::C => "C",
            NoteName::Cs => "C#",
            NoteName::D => "D",
            NoteName::Ds => "D#",
            NoteName::E => "E",
            NoteName::F => "F",
            NoteName::Fs => "F#",
            NoteName::G => "G",
            NoteName::Gs => "G#",
            NoteName::A => "A",
            NoteName::As => "A#",
            NoteName::B => "B",
        }
    }

    /// Pitch class `semitones` above this one.
    pub const fn transpose(self, semitones: usize) -> NoteName {
        Self::from_index(self.index() + semitones)
    }
}

impl Display for NoteName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Fractional MIDI note number for a frequency, with A4 = 440 Hz = 69.
#[inline]
pub fn frequency_to_midi(freq: f32) -> f32 {
    12.0 * (freq / 440.0).log2() + 69.0
}
