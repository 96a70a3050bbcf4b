//! Authentication route handlers.
//!
//! Registration, login/logout, and the confirm-code password recovery.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::post,
};
use serde::Deserialize;
use tower_sessions::Session;

use staple_core::Email;

use crate::error::AppError;
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::services::UserError;
use crate::state::AppState;

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/reset", post(send_reset_code))
        .route("/auth/reset/verify", post(verify_reset_code))
}

// =============================================================================
// Request Types
// =============================================================================

/// Email and password, used by register and login.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// Start of a password recovery.
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

/// Confirm code submitted to finish a recovery.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    pub code: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Create an account.
///
/// POST /auth/register
///
/// # Errors
///
/// Returns 400 for an invalid email or empty password, 409 if the email is
/// already registered.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<StatusCode, AppError> {
    let email = Email::parse(&req.email).map_err(UserError::from)?;
    if state.users().is_registered(&email).await? {
        return Err(UserError::AlreadyRegistered.into());
    }

    state.users().register(email.as_str(), &req.password).await?;
    Ok(StatusCode::CREATED)
}

/// Log in and start a session.
///
/// POST /auth/login
///
/// # Errors
///
/// Returns 401 for an unknown email or wrong password.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<CredentialsRequest>,
) -> Result<StatusCode, AppError> {
    let invalid = || AppError::Unauthorized("invalid email or password".to_owned());

    let email = Email::parse(&req.email).map_err(|_| invalid())?;
    let matched = match state.users().password_match(&email, &req.password).await {
        Ok(matched) => matched,
        Err(UserError::NotFound) => false,
        Err(e) => return Err(e.into()),
    };
    if !matched {
        tracing::warn!(email = %email, "Login failed");
        return Err(invalid());
    }

    set_current_user(&session, &CurrentUser { email: email.clone() }).await?;
    tracing::info!(email = %email, "User logged in");
    Ok(StatusCode::NO_CONTENT)
}

/// End the session.
///
/// POST /auth/logout
///
/// # Errors
///
/// Returns 500 if the session store fails.
pub async fn logout(session: Session) -> Result<StatusCode, AppError> {
    clear_current_user(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Send a confirm code to the account's email.
///
/// POST /auth/reset
///
/// Unknown emails get the same response as known ones.
///
/// # Errors
///
/// Returns 400 for a malformed email, 502 if the code could not be sent.
pub async fn send_reset_code(
    State(state): State<AppState>,
    Json(req): Json<ResetRequest>,
) -> Result<StatusCode, AppError> {
    let email = Email::parse(&req.email).map_err(UserError::from)?;

    match state.users().send_confirm_code(&email).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(UserError::NotFound) => {
            tracing::info!(email = %email, "Reset requested for unknown account");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => Err(e.into()),
    }
}

/// Check a confirm code; on success a new password is mailed out.
///
/// POST /auth/reset/verify
///
/// # Errors
///
/// Returns 400 if the code does not match, 404 for an unknown account.
pub async fn verify_reset_code(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<StatusCode, AppError> {
    let email = Email::parse(&req.email).map_err(UserError::from)?;
    state.users().verify_confirm_code(&email, &req.code).await?;
    Ok(StatusCode::NO_CONTENT)
}
