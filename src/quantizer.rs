//! Quantization configuration
//!
//! The quantizer supplies the snapping grid used when comparing note
//! boundaries for adjacency, and the augmentation-dot limit used when
//! deciding whether a duration is viable as one written note.

use serde::{Deserialize, Serialize};

use crate::models::duration::{NoteValue, TimeT};

/// Grid + dot-limit configuration consulted by the editing algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantizer {
    /// Snapping unit in ticks; boundary comparisons round to multiples
    /// of this.
    pub unit: TimeT,
    /// Maximum augmentation dots a viable duration may use.
    pub max_dots: u8,
}

impl Default for Quantizer {
    fn default() -> Self {
        Quantizer {
            unit: NoteValue::Demisemiquaver.duration(),
            max_dots: 2,
        }
    }
}

impl Quantizer {
    pub fn new(unit: TimeT, max_dots: u8) -> Self {
        assert!(unit > 0, "quantizer unit must be positive");
        Quantizer { unit, max_dots }
    }

    /// Round `time` to the nearest multiple of the unit (half-way cases
    /// round up).
    pub fn quantize_time(&self, time: TimeT) -> TimeT {
        let unit = self.unit;
        let rem = time.rem_euclid(unit);
        if rem * 2 >= unit {
            time - rem + unit
        } else {
            time - rem
        }
    }

    /// Quantize a duration; never rounds a positive duration to zero.
    pub fn quantize_duration(&self, duration: TimeT) -> TimeT {
        let q = self.quantize_time(duration);
        if q == 0 && duration > 0 {
            self.unit
        } else {
            q
        }
    }
}
