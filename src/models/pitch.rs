//! Pitch-related enumerations used by note events
//!
//! Pitch itself is stored on events as a MIDI-style semitone number; this
//! module only carries the accidental spelling that accompanies it.

use serde::{Deserialize, Serialize};

/// Accidental spelling attached to a note's pitch.
///
/// The default is `NoAccidental`: a note without an explicit accidental
/// property is rendered with whatever the key signature implies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Accidental {
    #[default]
    NoAccidental,
    Sharp,
    Flat,
    Natural,
    DoubleSharp,
    DoubleFlat,
}

impl Accidental {
    /// Semitone offset this accidental applies to a natural pitch.
    pub fn offset(self) -> i32 {
        match self {
            Accidental::NoAccidental | Accidental::Natural => 0,
            Accidental::Sharp => 1,
            Accidental::Flat => -1,
            Accidental::DoubleSharp => 2,
            Accidental::DoubleFlat => -2,
        }
    }

    /// Stable integer encoding for the event property bag.
    pub fn to_code(self) -> i64 {
        match self {
            Accidental::NoAccidental => 0,
            Accidental::Sharp => 1,
            Accidental::Flat => 2,
            Accidental::Natural => 3,
            Accidental::DoubleSharp => 4,
            Accidental::DoubleFlat => 5,
        }
    }

    /// Decode from the event property bag; unknown codes read as
    /// `NoAccidental` rather than failing.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Accidental::Sharp,
            2 => Accidental::Flat,
            3 => Accidental::Natural,
            4 => Accidental::DoubleSharp,
            5 => Accidental::DoubleFlat,
            _ => Accidental::NoAccidental,
        }
    }
}
