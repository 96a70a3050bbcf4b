//! Staple queue route handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;

use staple_core::{NewStaple, Owner, Staple, StapleId};

use crate::error::{AppError, set_sentry_user};
use crate::middleware::RequireAuth;
use crate::models::CurrentUser;
use crate::services::{StapleError, UserError};
use crate::state::AppState;

/// Build the staples router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/staples", get(list).post(create))
        .route("/staples/next", get(next))
        .route("/staples/archive", get(show_archive))
        .route("/staples/{id}", get(show).delete(delete))
        .route("/staples/{id}/archive", post(archive))
}

/// `{"staple": ...}`
#[derive(Debug, Serialize)]
pub struct StapleResponse {
    pub staple: Option<Staple>,
}

/// `{"staples": [...]}`
#[derive(Debug, Serialize)]
pub struct StaplesResponse {
    pub staples: Vec<Staple>,
}

/// Look up the caller's current quota. A session that outlived its account
/// is treated as logged out.
async fn resolve_owner(state: &AppState, user: &CurrentUser) -> Result<Owner, AppError> {
    set_sentry_user(user.email.as_str());

    state.users().owner(&user.email).await.map_err(|e| match e {
        UserError::NotFound => AppError::Unauthorized("account no longer exists".to_owned()),
        other => other.into(),
    })
}

/// GET /staples
///
/// # Errors
///
/// Returns 500 if the store fails.
pub async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<StaplesResponse>, AppError> {
    let staples = state.staples().list(&user.email).await?;
    Ok(Json(StaplesResponse { staples }))
}

/// POST /staples
///
/// # Errors
///
/// Returns 400 for empty content, 422 when the quota is reached.
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(req): Json<NewStaple>,
) -> Result<(StatusCode, Json<StapleResponse>), AppError> {
    let owner = resolve_owner(&state, &user).await?;
    let staple = state.staples().create(&owner, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(StapleResponse {
            staple: Some(staple),
        }),
    ))
}

/// GET /staples/next
///
/// Responds with `{"staple": null}` when the queue is empty.
///
/// # Errors
///
/// Returns 500 if the store fails.
pub async fn next(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<StapleResponse>, AppError> {
    let staple = state.staples().oldest(&user.email).await?;
    Ok(Json(StapleResponse { staple }))
}

/// GET /staples/archive
///
/// # Errors
///
/// Returns 500 if the store fails.
pub async fn show_archive(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<StaplesResponse>, AppError> {
    let staples = state.staples().show_archive(&user.email).await?;
    Ok(Json(StaplesResponse { staples }))
}

/// GET /staples/{id}
///
/// # Errors
///
/// Returns 404 if the staple is missing or archived.
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<StapleResponse>, AppError> {
    let staple = state
        .staples()
        .get(&user.email, StapleId::new(id))
        .await?
        .ok_or(StapleError::NotFound)?;
    Ok(Json(StapleResponse {
        staple: Some(staple),
    }))
}

/// POST /staples/{id}/archive
///
/// # Errors
///
/// Returns 404 for an unknown ID only when configured to.
pub async fn archive(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    state.staples().archive(&user.email, StapleId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /staples/{id}
///
/// # Errors
///
/// Returns 404 if the staple does not exist.
pub async fn delete(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    state.staples().delete(&user.email, StapleId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
