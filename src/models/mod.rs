//! Data model for the notation editor core
//!
//! Events, durations, pitch spellings, and the time-signature oracle the
//! editing algorithms consult for bar-aware operations.

pub mod duration;
pub mod event;
pub mod pitch;
pub mod time_signature;

// Re-export commonly used types
pub use duration::{DottedNote, NoteValue, TimeT, TICKS_PER_CROTCHET};
pub use event::{Event, EventKind, PropertyKey, PropertyValue};
pub use pitch::Accidental;
pub use time_signature::{TimeSignature, TimeSignatureMap};
