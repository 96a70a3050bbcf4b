//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness
//! GET  /health/ready           - Readiness (checks the database when configured)
//!
//! # Auth
//! POST /auth/register          - Create an account
//! POST /auth/login             - Start a session
//! POST /auth/logout            - End the session
//! POST /auth/reset             - Send a confirm code
//! POST /auth/reset/verify      - Check the code and mail a new password
//!
//! # Staples (login required)
//! GET  /staples                - Active staples
//! POST /staples                - Add a staple
//! GET  /staples/next           - Oldest active staple
//! GET  /staples/archive        - Archived staples
//! GET  /staples/{id}           - One active staple
//! POST /staples/{id}/archive   - Archive a staple
//! DELETE /staples/{id}         - Delete a staple
//!
//! # Account (login required)
//! GET  /account/quota          - Current quota
//! PUT  /account/quota          - Change quota
//! POST /account/password       - Change password
//! DELETE /account              - Delete the account
//! ```

pub mod account;
pub mod auth;
pub mod staples;

use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::state::AppState;

/// Build the complete router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(auth::router())
        .merge(staples::router())
        .merge(account::router())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    let Some(pool) = state.pool() else {
        return StatusCode::OK;
    };

    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
