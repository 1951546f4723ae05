//! Musical time and notated duration math
//!
//! Everything in the editor core measures time in integer ticks, with 480
//! ticks per crotchet (quarter note). This module defines the note-value
//! enumeration, augmentation-dot arithmetic, and the "viability" test: a
//! duration is viable when it can be written as exactly one notated note
//! value with a bounded number of dots.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Absolute time / duration in ticks.
pub type TimeT = i64;

/// Ticks per crotchet (quarter note).
pub const TICKS_PER_CROTCHET: TimeT = 480;

/// Largest dot count the viability table is built for.
const TABLE_MAX_DOTS: u8 = 4;

/// A single notated note value, breve down to hemidemisemiquaver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NoteValue {
    Breve,
    Semibreve,
    Minim,
    Crotchet,
    Quaver,
    Semiquaver,
    Demisemiquaver,
    Hemidemisemiquaver,
}

impl NoteValue {
    /// All note values, longest first.
    pub const ALL: [NoteValue; 8] = [
        NoteValue::Breve,
        NoteValue::Semibreve,
        NoteValue::Minim,
        NoteValue::Crotchet,
        NoteValue::Quaver,
        NoteValue::Semiquaver,
        NoteValue::Demisemiquaver,
        NoteValue::Hemidemisemiquaver,
    ];

    /// Undotted duration in ticks.
    pub fn duration(self) -> TimeT {
        match self {
            NoteValue::Breve => TICKS_PER_CROTCHET * 8,
            NoteValue::Semibreve => TICKS_PER_CROTCHET * 4,
            NoteValue::Minim => TICKS_PER_CROTCHET * 2,
            NoteValue::Crotchet => TICKS_PER_CROTCHET,
            NoteValue::Quaver => TICKS_PER_CROTCHET / 2,
            NoteValue::Semiquaver => TICKS_PER_CROTCHET / 4,
            NoteValue::Demisemiquaver => TICKS_PER_CROTCHET / 8,
            NoteValue::Hemidemisemiquaver => TICKS_PER_CROTCHET / 16,
        }
    }
}

/// A note value plus augmentation dots: one written notehead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DottedNote {
    pub value: NoteValue,
    pub dots: u8,
}

impl DottedNote {
    /// Performed duration of this written note, in ticks.
    pub fn duration(self) -> TimeT {
        // dotted_duration is always integral for entries the table admits
        dotted_duration(self.value.duration(), self.dots).unwrap_or(self.value.duration())
    }
}

/// Duration of `base` ticks extended by `dots` augmentation dots.
///
/// Each dot adds half of the previous addition, so n dots multiply by
/// (2^(n+1) - 1) / 2^n. Returns `None` when the result is not a whole
/// number of ticks (e.g. a double-dotted hemidemisemiquaver).
pub fn dotted_duration(base: TimeT, dots: u8) -> Option<TimeT> {
    let num = base * ((1 << (dots as u32 + 1)) - 1);
    let den = 1 << (dots as u32);
    if num % den == 0 {
        Some(num / den)
    } else {
        None
    }
}

/// Map from viable duration to the written note that expresses it, using
/// the fewest dots possible.
static VIABLE_DURATIONS: Lazy<BTreeMap<TimeT, DottedNote>> = Lazy::new(|| {
    let mut table = BTreeMap::new();
    for value in NoteValue::ALL {
        for dots in 0..=TABLE_MAX_DOTS {
            if let Some(d) = dotted_duration(value.duration(), dots) {
                table
                    .entry(d)
                    .and_modify(|n: &mut DottedNote| {
                        if dots < n.dots {
                            *n = DottedNote { value, dots };
                        }
                    })
                    .or_insert(DottedNote { value, dots });
            }
        }
    }
    table
});

/// True if `duration` can be written as a single note value with at most
/// `max_dots` augmentation dots.
pub fn is_viable(duration: TimeT, max_dots: u8) -> bool {
    VIABLE_DURATIONS
        .get(&duration)
        .map(|n| n.dots <= max_dots)
        .unwrap_or(false)
}

/// The longest viable duration no greater than `duration`, or `None` if
/// `duration` is shorter than every viable value.
pub fn nearest_viable(duration: TimeT, max_dots: u8) -> Option<TimeT> {
    nearest_note(duration, max_dots).map(|n| n.duration())
}

/// The written note for the longest viable duration no greater than
/// `duration`.
pub fn nearest_note(duration: TimeT, max_dots: u8) -> Option<DottedNote> {
    VIABLE_DURATIONS
        .range(..=duration)
        .rev()
        .find(|(_, n)| n.dots <= max_dots)
        .map(|(_, n)| *n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_value_durations() {
        assert_eq!(NoteValue::Crotchet.duration(), 480);
        assert_eq!(NoteValue::Quaver.duration(), 240);
        assert_eq!(NoteValue::Breve.duration(), 3840);
        assert_eq!(NoteValue::Hemidemisemiquaver.duration(), 30);
    }

    #[test]
    fn test_dotted_duration() {
        assert_eq!(dotted_duration(480, 0), Some(480));
        assert_eq!(dotted_duration(480, 1), Some(720));
        assert_eq!(dotted_duration(480, 2), Some(840));
        // Double-dotted hemidemisemiquaver is not a whole tick count
        assert_eq!(dotted_duration(30, 2), None);
    }

    #[test]
    fn test_is_viable() {
        assert!(is_viable(480, 0)); // crotchet
        assert!(is_viable(720, 1)); // dotted crotchet
        assert!(!is_viable(720, 0));
        assert!(is_viable(1440, 1)); // dotted minim
        assert!(is_viable(840, 2)); // double-dotted crotchet
        assert!(!is_viable(840, 1));
        assert!(!is_viable(500, 2));
        assert!(!is_viable(0, 2));
    }

    #[test]
    fn test_nearest_viable() {
        assert_eq!(nearest_viable(480, 2), Some(480));
        assert_eq!(nearest_viable(500, 2), Some(480));
        assert_eq!(nearest_viable(479, 0), Some(240));
        assert_eq!(nearest_viable(479, 1), Some(360)); // dotted quaver
        assert_eq!(nearest_viable(29, 2), None);
    }

    #[test]
    fn test_nearest_note_prefers_fewest_dots() {
        let n = nearest_note(480, 2).unwrap();
        assert_eq!(n.value, NoteValue::Crotchet);
        assert_eq!(n.dots, 0);

        // Largest viable value not above 700 is the plain crotchet:
        // dotted crotchet (720) overshoots, double-dotted quaver is 420.
        let n = nearest_note(700, 2).unwrap();
        assert_eq!(n.value, NoteValue::Crotchet);
        assert_eq!(n.dots, 0);
        assert_eq!(n.duration(), 480);
    }
}
