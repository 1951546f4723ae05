//! Core editing model for a music notation editor: a time-ordered event
//! container (`Segment`), notation-aware editing algorithms
//! (`SegmentEditor`), and tie-aware selections kept in sync through a
//! segment observer protocol (`EventSelection`).
//!
//! Times and durations are integer ticks, 480 per crotchet. Events carry a
//! typed property bag; notes and rests are events with the corresponding
//! kind and a positive duration.

pub mod error;
pub mod models;
pub mod quantizer;
pub mod segment;
pub mod selection;

pub use error::{EditError, Result};
pub use models::{
    Accidental, DottedNote, Event, EventKind, NoteValue, PropertyKey, PropertyValue, TimeSignature,
    TimeSignatureMap, TimeT, TICKS_PER_CROTCHET,
};
pub use quantizer::Quantizer;
pub use segment::editor::{CollapseDirection, SegmentEditor};
pub use segment::{EventId, Segment, SegmentObserver};
pub use selection::EventSelection;
