//! Time signatures and the bar oracle
//!
//! `TimeSignatureMap` answers the bar/beat questions the editing layer
//! needs (bar start/end for a time, bar numbering, prevailing signature).
//! It is read-only from the segment's point of view: editing operations
//! consult it, they never change it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::duration::{TimeT, TICKS_PER_CROTCHET};

const WHOLE_NOTE: TimeT = TICKS_PER_CROTCHET * 4;

/// A time signature. The denominator should be a power of two dividing a
/// whole note (1..=64).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u32,
    pub denominator: u32,
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature {
            numerator: 4,
            denominator: 4,
        }
    }
}

impl TimeSignature {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        assert!(numerator > 0 && denominator > 0, "degenerate time signature");
        TimeSignature {
            numerator,
            denominator,
        }
    }

    /// Duration of one subdivision unit (the "denominator note").
    pub fn unit_duration(&self) -> TimeT {
        WHOLE_NOTE / self.denominator as TimeT
    }

    /// Duration of one full bar.
    pub fn bar_duration(&self) -> TimeT {
        self.numerator as TimeT * self.unit_duration()
    }

    /// Duration of one beat. Compound meters (numerator divisible by 3
    /// and greater than 3, e.g. 6/8) beat in threes of the unit.
    pub fn beat_duration(&self) -> TimeT {
        if self.numerator > 3 && self.numerator % 3 == 0 {
            self.unit_duration() * 3
        } else {
            self.unit_duration()
        }
    }
}

/// Ordered map of time-signature changes, starting from an origin time
/// with a default 4/4. Changes are expected to fall on barlines of the
/// preceding signature.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimeSignatureMap {
    origin: TimeT,
    changes: BTreeMap<TimeT, TimeSignature>,
}

fn div_floor(a: TimeT, b: TimeT) -> TimeT {
    let q = a / b;
    if (a % b != 0) && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

impl TimeSignatureMap {
    /// 4/4 everywhere, bars counted from time 0.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_origin(origin: TimeT) -> Self {
        TimeSignatureMap {
            origin,
            changes: BTreeMap::new(),
        }
    }

    pub fn origin(&self) -> TimeT {
        self.origin
    }

    /// Record a signature change taking effect at `time`.
    pub fn add_signature(&mut self, time: TimeT, signature: TimeSignature) {
        self.changes.insert(time, signature);
    }

    /// The signature prevailing at `time`, with the time it took effect.
    pub fn time_signature_at(&self, time: TimeT) -> (TimeT, TimeSignature) {
        self.changes
            .range(..=time)
            .next_back()
            .map(|(t, sig)| (*t, *sig))
            .unwrap_or((self.origin, TimeSignature::default()))
    }

    /// Start of the bar containing `time`. A time exactly on a barline is
    /// the start of its own bar.
    pub fn bar_start_for_time(&self, time: TimeT) -> TimeT {
        let (sig_time, sig) = self.time_signature_at(time);
        let bar = sig.bar_duration();
        sig_time + div_floor(time - sig_time, bar) * bar
    }

    /// End of the bar containing `time` (the next barline after its
    /// start).
    pub fn bar_end_for_time(&self, time: TimeT) -> TimeT {
        let (_, sig) = self.time_signature_at(time);
        self.bar_start_for_time(time) + sig.bar_duration()
    }

    /// Bar number of the bar containing `time`, counting from 0 at the
    /// origin and accumulating across signature changes.
    pub fn bar_number(&self, time: TimeT) -> i64 {
        let mut bars: i64 = 0;
        let mut prev_time = self.origin;
        let mut prev_sig = TimeSignature::default();

        for (&change_time, &sig) in &self.changes {
            if change_time > time {
                break;
            }
            if change_time > prev_time {
                bars += div_floor(change_time - prev_time, prev_sig.bar_duration());
            }
            prev_time = change_time;
            prev_sig = sig;
        }

        bars + div_floor(time - prev_time, prev_sig.bar_duration())
    }
}
