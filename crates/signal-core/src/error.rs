//! Signal Error Types

use thiserror::Error;

/// Errors raised while validating per-tick sample sequences
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    /// Sequence has no samples
    #[error("{0} has no samples")]
    Empty(&'static str),

    /// Sequence length differs from what the consumer expects
    #[error("{field} has {actual} samples, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// NaN or infinity inside a sequence
    #[error("{field} is not finite at index {index}")]
    NonFinite { field: &'static str, index: usize },

    /// Abscissa decreases
    #[error("{field} is not monotonic at index {index}")]
    NonMonotonic { field: &'static str, index: usize },
}
