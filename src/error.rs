use thiserror::Error;

use crate::models::Component;

/// Failures raised by the grade engine itself. Storage and CLI errors are
/// carried as `anyhow::Error` one layer up.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GradeError {
    /// A component score fell outside the closed interval [0, 10].
    #[error("{component} must be between 0 and 10, got {value}")]
    OutOfRange { component: Component, value: f64 },

    #[error("unknown grade component `{0}` (expected np1, np2, ava or pim)")]
    UnknownComponent(String),

    /// Score text that is neither empty nor a number.
    #[error("`{0}` is not a numeric score")]
    InvalidScore(String),
}
