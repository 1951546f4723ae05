//! The Event type: a typed, timestamped property bag
//!
//! An `Event` is one timed musical fact (note, rest, clef, key, text,
//! indication). It carries performance timing (`absolute_time`/`duration`),
//! display timing (`notation_time`/`notation_duration`, which may diverge
//! for grace notes and cautionary respelling), a `sub_ordering` that
//! tie-breaks simultaneous events, and a map of typed properties.
//!
//! Timing fields are immutable once the event is constructed: edits are
//! made by building a modified copy (`copy_at`, `copy_with_times`) and
//! replacing the original in its segment. Properties, which do not affect
//! ordering, may be mutated in place.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::duration::TimeT;
use super::pitch::Accidental;

/// What kind of musical fact an event records.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Note,
    Rest,
    Clef,
    Key,
    Text,
    Indication,
    /// Escape hatch for event types the core does not interpret.
    Other(String),
}

/// Closed universe of property names, with a `Custom` fallback for
/// genuinely open-ended properties (marks, styles).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PropertyKey {
    Pitch,
    Velocity,
    Accidental,
    TiedForward,
    TiedBackward,
    BeamedGroupId,
    BeamedGroupType,
    BeamedGroupTupledCount,
    BeamedGroupUntupledCount,
    BeamedGroupTupletBase,
    GraceNote,
    ClefType,
    KeyName,
    TextContent,
    IndicationType,
    Custom(String),
}

/// A typed property value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Int(i64),
    Bool(bool),
    Text(String),
}

impl PropertyValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// Group type tag for beamed groups.
pub const GROUP_TYPE_BEAMED: &str = "beamed";
/// Group type tag for tuplet groups.
pub const GROUP_TYPE_TUPLED: &str = "tupled";

/// One timed musical fact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    kind: EventKind,
    absolute_time: TimeT,
    duration: TimeT,
    sub_ordering: i32,
    notation_time: TimeT,
    notation_duration: TimeT,
    properties: BTreeMap<PropertyKey, PropertyValue>,
}

impl Event {
    /// Create an event whose notation timing mirrors its performance
    /// timing. `duration` must be non-negative.
    pub fn new(kind: EventKind, absolute_time: TimeT, duration: TimeT) -> Self {
        assert!(duration >= 0, "event duration must be non-negative");
        Self {
            kind,
            absolute_time,
            duration,
            sub_ordering: 0,
            notation_time: absolute_time,
            notation_duration: duration,
            properties: BTreeMap::new(),
        }
    }

    /// Create an event with an explicit sub-ordering. Negative values sort
    /// before ordinary notes at the same instant (grace notes, clefs).
    pub fn with_sub_ordering(
        kind: EventKind,
        absolute_time: TimeT,
        duration: TimeT,
        sub_ordering: i32,
    ) -> Self {
        let mut e = Self::new(kind, absolute_time, duration);
        e.sub_ordering = sub_ordering;
        e
    }

    /// Consume and replace the notation timing; used where display timing
    /// diverges from performance timing.
    pub fn with_notation(mut self, notation_time: TimeT, notation_duration: TimeT) -> Self {
        assert!(notation_duration >= 0, "notation duration must be non-negative");
        self.notation_time = notation_time;
        self.notation_duration = notation_duration;
        self
    }

    /// Copy this event to a new absolute time, preserving duration,
    /// sub-ordering, properties, and the performance/notation time offset.
    pub fn copy_at(&self, absolute_time: TimeT) -> Self {
        let delta = absolute_time - self.absolute_time;
        let mut e = self.clone();
        e.absolute_time = absolute_time;
        e.notation_time += delta;
        e
    }

    /// Copy this event with new performance timing. Notation timing keeps
    /// its offset from performance time and takes the new duration.
    pub fn copy_with_times(&self, absolute_time: TimeT, duration: TimeT) -> Self {
        assert!(duration >= 0, "event duration must be non-negative");
        let delta = absolute_time - self.absolute_time;
        let mut e = self.clone();
        e.absolute_time = absolute_time;
        e.duration = duration;
        e.notation_time += delta;
        e.notation_duration = duration;
        e
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn absolute_time(&self) -> TimeT {
        self.absolute_time
    }

    pub fn duration(&self) -> TimeT {
        self.duration
    }

    /// Performance end time, `absolute_time + duration`.
    pub fn end_time(&self) -> TimeT {
        self.absolute_time + self.duration
    }

    pub fn sub_ordering(&self) -> i32 {
        self.sub_ordering
    }

    pub fn notation_time(&self) -> TimeT {
        self.notation_time
    }

    pub fn notation_duration(&self) -> TimeT {
        self.notation_duration
    }

    pub fn notation_end_time(&self) -> TimeT {
        self.notation_time + self.notation_duration
    }

    /// Container ordering key: (absolute time, sub-ordering).
    pub fn ordering_key(&self) -> (TimeT, i32) {
        (self.absolute_time, self.sub_ordering)
    }

    pub fn is_note(&self) -> bool {
        self.kind == EventKind::Note
    }

    pub fn is_rest(&self) -> bool {
        self.kind == EventKind::Rest
    }

    /// Notes and rests are the events that contribute to time coverage.
    pub fn is_note_or_rest(&self) -> bool {
        self.is_note() || self.is_rest()
    }

    // --- property bag ---

    pub fn get(&self, key: &PropertyKey) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn has(&self, key: &PropertyKey) -> bool {
        self.properties.contains_key(key)
    }

    pub fn set(&mut self, key: PropertyKey, value: PropertyValue) {
        self.properties.insert(key, value);
    }

    pub fn unset(&mut self, key: &PropertyKey) -> Option<PropertyValue> {
        self.properties.remove(key)
    }

    pub fn get_int(&self, key: &PropertyKey) -> Option<i64> {
        self.get(key).and_then(PropertyValue::as_int)
    }

    pub fn get_bool(&self, key: &PropertyKey) -> Option<bool> {
        self.get(key).and_then(PropertyValue::as_bool)
    }

    pub fn get_text(&self, key: &PropertyKey) -> Option<&str> {
        self.get(key).and_then(PropertyValue::as_text)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&PropertyKey, &PropertyValue)> {
        self.properties.iter()
    }

    // --- typed conveniences with documented defaults ---

    /// MIDI-style semitone pitch, if this event has one.
    pub fn pitch(&self) -> Option<i64> {
        self.get_int(&PropertyKey::Pitch)
    }

    pub fn set_pitch(&mut self, pitch: i64) {
        self.set(PropertyKey::Pitch, PropertyValue::Int(pitch));
    }

    /// Velocity, defaulting to 127 when the property is absent.
    pub fn velocity(&self) -> i64 {
        self.get_int(&PropertyKey::Velocity).unwrap_or(127)
    }

    /// Accidental, defaulting to `NoAccidental` when absent.
    pub fn accidental(&self) -> Accidental {
        self.get_int(&PropertyKey::Accidental)
            .map(Accidental::from_code)
            .unwrap_or_default()
    }

    pub fn set_accidental(&mut self, accidental: Accidental) {
        if accidental == Accidental::NoAccidental {
            self.unset(&PropertyKey::Accidental);
        } else {
            self.set(PropertyKey::Accidental, PropertyValue::Int(accidental.to_code()));
        }
    }

    /// Whether this note is tied to the following one. Defaults to false.
    pub fn tied_forward(&self) -> bool {
        self.get_bool(&PropertyKey::TiedForward).unwrap_or(false)
    }

    /// Whether this note is tied to the preceding one. Defaults to false.
    pub fn tied_backward(&self) -> bool {
        self.get_bool(&PropertyKey::TiedBackward).unwrap_or(false)
    }

    pub fn set_tied_forward(&mut self, tied: bool) {
        if tied {
            self.set(PropertyKey::TiedForward, PropertyValue::Bool(true));
        } else {
            self.unset(&PropertyKey::TiedForward);
        }
    }

    pub fn set_tied_backward(&mut self, tied: bool) {
        if tied {
            self.set(PropertyKey::TiedBackward, PropertyValue::Bool(true));
        } else {
            self.unset(&PropertyKey::TiedBackward);
        }
    }

    /// Rendering group id shared by beamed/tupled events, if any.
    pub fn beamed_group_id(&self) -> Option<i64> {
        self.get_int(&PropertyKey::BeamedGroupId)
    }

    pub fn beamed_group_type(&self) -> Option<&str> {
        self.get_text(&PropertyKey::BeamedGroupType)
    }
}

/// Convenience constructor for a note event.
pub fn note(absolute_time: TimeT, duration: TimeT, pitch: i64) -> Event {
    let mut e = Event::new(EventKind::Note, absolute_time, duration);
    e.set_pitch(pitch);
    e
}

/// Convenience constructor for a rest event.
pub fn rest(absolute_time: TimeT, duration: TimeT) -> Event {
    Event::new(EventKind::Rest, absolute_time, duration)
}
