//! Error types for the allocation engine.

use thiserror::Error;

/// Errors that abort an allocation run.
///
/// Expected outcomes such as RID conflicts or overlapping proposals are
/// not errors; see [`crate::RidConflict`] and [`crate::ProposalFailure`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A range was declared with zero size.
    #[error("range '{name}' has size 0")]
    EmptyRange { name: String },

    /// `first_id + size` does not fit in an identifier.
    #[error("range '{name}' starting at {first_id} with size {size} runs past the identifier space")]
    RangeOutOfBounds {
        name: String,
        first_id: u64,
        size: u64,
    },

    /// No ranges were supplied.
    #[error("no ID ranges found")]
    NoRanges,

    /// Two ranges share at least one identifier.
    #[error("ranges '{first}' and '{second}' overlap")]
    RangesOverlap { first: String, second: String },

    /// A range with the same name is already registered.
    #[error("range name '{0}' is already taken")]
    DuplicateName(String),

    /// An invocation option is out of bounds.
    #[error("invalid {option}: {message}")]
    InvalidOption {
        option: &'static str,
        message: String,
    },
}

impl EngineError {
    /// Returns true if this error is a non-overlap invariant violation.
    pub fn is_overlap(&self) -> bool {
        matches!(self, EngineError::RangesOverlap { .. })
    }
}
