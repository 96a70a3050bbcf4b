//! User service error types.

use thiserror::Error;
use tokio::time::error::Elapsed;

use crate::db::StorageError;
use crate::services::NotifyError;

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum UserError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] staple_core::EmailError),

    /// Quota outside the allowed range.
    #[error("{0}")]
    InvalidQuota(#[from] staple_core::QuotaError),

    /// Required input is empty or malformed.
    #[error("{0}")]
    Validation(String),

    /// User not found.
    #[error("user not found")]
    NotFound,

    /// User already exists.
    #[error("user already registered")]
    AlreadyRegistered,

    /// Password did not match.
    #[error("password mismatch")]
    AuthMismatch,

    /// Confirm code did not match, or no recovery is pending.
    #[error("confirm code mismatch")]
    CodeMismatch,

    /// Notification could not be delivered.
    #[error("delivery failed: {0}")]
    Delivery(#[from] NotifyError),

    /// Store operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// The operation deadline passed.
    #[error("operation timed out")]
    Timeout(#[from] Elapsed),
}

impl UserError {
    /// Whether the caller can fix this by changing their input.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidEmail(_) | Self::InvalidQuota(_) | Self::Validation(_)
        )
    }
}
