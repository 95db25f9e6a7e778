//! Templates
//!
//! Key profiles and chord templates used as read-only correlation targets.
//! All templates are stored relative to C (index 0 = tonic or root) and are
//! moved to other roots with [`rotate`], which always returns a new array.

use crate::chord_detector::ChordKind;
use crate::pitch::SEMITONES;

/// A 12-bin profile indexed by pitch class.
pub type Profile = [f32; SEMITONES];

/// Shift `template` up by `steps` semitones: what sat at index 0 ends up at
/// index `steps % 12`.
pub fn rotate(template: &Profile, steps: usize) -> Profile {
    let steps = steps % SEMITONES;
    let mut out = [0.0; SEMITONES];
    for (i, &v) in template.iter().enumerate() {
        out[(i + steps) % SEMITONES] = v;
    }
    out
}

/// Major and minor key profiles, tonic at index 0.
///
/// Tonic weighs most, then the fifth, then the mode's third, then the rest
/// of the diatonic scale; chromatic degrees stay low.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyProfiles {
    /// Major key profile.
    pub major: Profile,
    /// Minor key profile.
    pub minor: Profile,
}

impl Default for KeyProfiles {
    fn default() -> Self {
        KeyProfiles {
            //       C     C#    D     D#    E     F     F#    G     G#    A     A#    B
            major: [1.00, 0.10, 0.45, 0.10, 0.70, 0.50, 0.10, 0.85, 0.10, 0.45, 0.10, 0.40],
            minor: [1.00, 0.10, 0.45, 0.70, 0.10, 0.50, 0.10, 0.85, 0.40, 0.10, 0.45, 0.25],
        }
    }
}

/// Chord quality templates, root at index 0.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordTemplates {
    entries: Vec<(ChordKind, Profile)>,
}

impl ChordTemplates {
    /// Use exactly the given templates, in the given order.
    pub fn new(entries: Vec<(ChordKind, Profile)>) -> Self {
        ChordTemplates { entries }
    }

    /// Binary template with ones at the given semitone intervals.
    pub fn binary(intervals: &[usize]) -> Profile {
        let mut profile = [0.0; SEMITONES];
        for &off in intervals {
            profile[off % SEMITONES] = 1.0;
        }
        profile
    }

    /// Templates in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &(ChordKind, Profile)> + '_ {
        self.entries.iter()
    }

    /// Number of chord qualities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no templates are configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ChordTemplates {
    fn default() -> Self {
        let entries = ChordKind::ALL
            .iter()
            .map(|&kind| (kind, Self::binary(kind.intervals())))
            .collect();
        ChordTemplates { entries }
    }
}
