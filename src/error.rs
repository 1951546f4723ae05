//! Error types for the editing operations
//!
//! Expected infeasibility (a delete with no absorbing rest, a rest removal
//! hitting a note) is reported with sentinel returns, not errors. These
//! variants cover precondition violations: the caller handed the editor
//! something it must not operate on.

use thiserror::Error;

use crate::models::duration::TimeT;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// Insertion requires an existing note-or-rest at the target time.
    #[error("no note or rest occupies time {0}")]
    NoEventAtTime(TimeT),

    /// Operation requires a note event.
    #[error("event is not a note")]
    NotANote,

    /// Operation requires a rest event.
    #[error("event is not a rest")]
    NotARest,

    /// Operation requires a note or rest event.
    #[error("event is neither a note nor a rest")]
    NotNoteOrRest,

    /// The handle does not refer to a live event in this segment.
    #[error("event not found in segment")]
    NoSuchEvent,

    /// Split point does not fall strictly inside the event.
    #[error("invalid split duration {base} for event of duration {duration}")]
    InvalidSplit { base: TimeT, duration: TimeT },

    /// A range operation was given an empty or inverted range.
    #[error("empty range")]
    EmptyRange,

    /// An insertion or split was asked for with a non-positive duration.
    #[error("non-positive duration {0}")]
    NonPositiveDuration(TimeT),
}

pub type Result<T> = std::result::Result<T, EditError>;
