//! Error types for votebox.

use thiserror::Error;

/// Result alias for votebox operations.
pub type VoteBoxResult<T> = std::result::Result<T, VoteBoxError>;

/// Errors that can occur when building or running the detection core.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoteBoxError {
    /// A feature buffer does not match the configured feature dimension.
    #[error("feature dimension mismatch: expected {expected}, got {got}")]
    FeatureDimMismatch { expected: usize, got: usize },
    /// A flat buffer is shorter than its declared element count requires.
    #[error("buffer for {context} too small: needed {needed}, got {got}")]
    BufferSizeMismatch {
        needed: usize,
        got: usize,
        context: &'static str,
    },
    /// Two chained layers (or stages) disagree on a dimension.
    #[error("shape mismatch at {context}: expected {expected}, got {got}")]
    LayerShapeMismatch {
        expected: usize,
        got: usize,
        context: &'static str,
    },
    /// Configuration rejected at construction time.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: &'static str },
}
