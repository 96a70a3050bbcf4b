//! Unified error handling for the HTTP API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::{StapleError, UserError};

/// JSON error body: `{"message": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Staple operation failed.
    #[error(transparent)]
    Staple(#[from] StapleError),

    /// Account operation failed.
    #[error(transparent)]
    User(#[from] UserError),

    /// Session could not be read or written.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// User is not authenticated.
    #[error("{0}")]
    Unauthorized(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Staple(e) => match e {
                StapleError::Validation(_) => StatusCode::BAD_REQUEST,
                StapleError::NotFound => StatusCode::NOT_FOUND,
                StapleError::QuotaExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                StapleError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                StapleError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::User(e) => match e {
                UserError::InvalidEmail(_)
                | UserError::InvalidQuota(_)
                | UserError::Validation(_)
                | UserError::CodeMismatch => StatusCode::BAD_REQUEST,
                UserError::NotFound => StatusCode::NOT_FOUND,
                UserError::AlreadyRegistered => StatusCode::CONFLICT,
                UserError::AuthMismatch => StatusCode::UNAUTHORIZED,
                UserError::Delivery(_) => StatusCode::BAD_GATEWAY,
                UserError::Storage(_) | UserError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                UserError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            StatusCode::BAD_GATEWAY => "Notification delivery failed".to_string(),
            _ => self.to_string(),
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}

/// Set the Sentry user context for the current request.
pub fn set_sentry_user(email: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            email: Some(email.to_owned()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
mod tests {
    use crate::db::StorageError;

    use super::*;

    fn get_status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(StapleError::QuotaExceeded { limit: 1, count: 1 }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(get_status(StapleError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(UserError::AlreadyRegistered),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(UserError::CodeMismatch),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(UserError::AuthMismatch),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(UserError::Storage(StorageError::NotFound)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_quota_message_passes_through() {
        let err = AppError::from(StapleError::QuotaExceeded { limit: 0, count: 0 });
        assert_eq!(
            err.to_string(),
            "cannot create more staples than 0; current count is: 0"
        );
    }
}
