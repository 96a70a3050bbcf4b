//! Account settings route handlers.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use staple_core::MaxStaples;

use crate::error::AppError;
use crate::middleware::{RequireAuth, clear_current_user};
use crate::state::AppState;

/// Build the account router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/account/quota", get(get_quota).put(set_quota))
        .route("/account/password", post(change_password))
        .route("/account", delete(delete_account))
}

/// `{"max_staples": n}`
#[derive(Debug, Serialize, Deserialize)]
pub struct QuotaBody {
    pub max_staples: i64,
}

/// `{"password": "..."}`
#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    pub password: String,
}

/// GET /account/quota
///
/// # Errors
///
/// Returns 404 if the account is gone.
pub async fn get_quota(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<QuotaBody>, AppError> {
    let max: MaxStaples = state.users().get_maximum_staples(&user.email).await?;
    Ok(Json(QuotaBody {
        max_staples: i64::from(max.get()),
    }))
}

/// PUT /account/quota
///
/// # Errors
///
/// Returns 400 unless `1 <= max_staples <= 100`.
pub async fn set_quota(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(req): Json<QuotaBody>,
) -> Result<StatusCode, AppError> {
    state
        .users()
        .set_maximum_staples(&user.email, req.max_staples)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /account/password
///
/// The session is the only proof of identity required.
///
/// # Errors
///
/// Returns 400 for an empty password.
pub async fn change_password(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(req): Json<PasswordRequest>,
) -> Result<StatusCode, AppError> {
    state
        .users()
        .change_password(&user.email, &req.password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /account
///
/// # Errors
///
/// Returns 401 if the password is wrong.
pub async fn delete_account(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<PasswordRequest>,
) -> Result<StatusCode, AppError> {
    state.users().delete(&user.email, &req.password).await?;
    clear_current_user(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}
