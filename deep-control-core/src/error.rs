//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
///
/// Functions return [`anyhow::Result`]; callers that need to branch on the
/// kind of failure can use `err.downcast_ref::<ControlError>()`.
#[derive(Error, Debug, PartialEq)]
pub enum ControlError {
    /// The shape of given data does not match the expected one.
    #[error("Shape error in {what}: expected {expected:?}, got {got:?}")]
    ShapeError {
        /// What was checked.
        what: String,
        /// Expected shape.
        expected: Vec<usize>,
        /// Given shape.
        got: Vec<usize>,
    },

    /// A batch was requested from a buffer holding too few transitions.
    #[error("Insufficient data: requested {requested} samples, {available} available")]
    InsufficientData {
        /// Requested batch size.
        requested: usize,
        /// Number of transitions in the buffer.
        available: usize,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),
}

impl ControlError {
    /// Shorthand for [`ControlError::ShapeError`].
    pub fn shape(what: impl Into<String>, expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeError {
            what: what.into(),
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }
}
