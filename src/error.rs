//! Error types for temporal operations.

use tempo_types::time::Timestamp;
use thiserror::Error;

/// Errors surfaced by constructors and operators.
///
/// All variants are recoverable at the call boundary; the library never
/// aborts and never retries internally.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemporalError {
    /// Timestamps not strictly increasing, or sequences not disjointly ordered.
    #[error("timestamps must be strictly increasing and sequences disjointly ordered: {0}")]
    InvalidOrder(String),

    /// Inputs declare incompatible interpolations.
    #[error("input values must have the same interpolation")]
    InterpolationMismatch,

    /// Mixing temporal types in a constructor or operator.
    #[error("operands must have the same temporal type")]
    TypeMismatch,

    /// Adjoining inputs carry different values at a shared inclusive instant.
    #[error("temporal values have different values at their common instant {0}")]
    ValueMismatchAtJoin(Timestamp),

    /// An operation whose contract demands a value produced none.
    #[error("operation produced an empty temporal value")]
    EmptyResult,

    /// A cast would silently lose continuous variation.
    #[error("cannot cast {0} with linear interpolation")]
    CastLossy(&'static str),

    /// Textual input rejected.
    #[error("parse error at byte {pos}: {reason}")]
    ParseError { pos: usize, reason: String },

    /// An `n`-th accessor index outside the valid range.
    #[error("index {index} out of range [1, {count}]")]
    OutOfRange { index: usize, count: usize },
}

pub type Result<T> = std::result::Result<T, TemporalError>;

impl TemporalError {
    pub(crate) fn parse(pos: usize, reason: impl Into<String>) -> Self {
        TemporalError::ParseError {
            pos,
            reason: reason.into(),
        }
    }
}
