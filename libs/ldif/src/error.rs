use idrange_engine::EngineError;
use thiserror::Error;

/// Malformed input. Line numbers are 1-based.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Line could not be read as `attribute: value`.
    #[error("parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// A record lacks an attribute it cannot do without.
    #[error("entry '{dn}' at line {line} has no {attribute}")]
    MissingAttribute {
        line: usize,
        dn: String,
        attribute: &'static str,
    },

    /// A numeric attribute holds something else.
    #[error("invalid {attribute} '{value}' at line {line}")]
    InvalidNumber {
        line: usize,
        attribute: &'static str,
        value: String,
    },

    /// The values parse but do not describe a valid range.
    #[error("invalid range at line {line}: {source}")]
    InvalidRange {
        line: usize,
        #[source]
        source: EngineError,
    },
}

impl FormatError {
    /// Line the error refers to.
    pub fn line(&self) -> usize {
        match self {
            Self::Parse { line, .. }
            | Self::MissingAttribute { line, .. }
            | Self::InvalidNumber { line, .. }
            | Self::InvalidRange { line, .. } => *line,
        }
    }
}
