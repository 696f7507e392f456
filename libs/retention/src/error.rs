//! Error types for retention configuration.

use thiserror::Error;

/// Errors raised while building a policy or validating its inputs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// `num_recent` was negative or does not fit the platform.
    #[error("num_recent must be a non-negative integer, got {0}")]
    InvalidNumRecent(i64),

    /// `min_age_days` was negative or too large to represent as a duration.
    #[error("min_age_days must be a non-negative number of days, got {0}")]
    InvalidMinAgeDays(i64),

    /// Repository name cannot be used as a cleanup target.
    #[error("invalid repository {name:?}: {reason}")]
    InvalidRepository { name: String, reason: &'static str },
}
