//! Convenience result type alias for CivicPulse.

use crate::error::AppError;

/// A specialized `Result` type for CivicPulse operations.
pub type AppResult<T> = Result<T, AppError>;
