//! Staple server library.
//!
//! A read-it-later queue: users save text snippets ("staples"), read them
//! oldest-first, and archive what they have read. The crate is a library so
//! the router and services can be exercised from tests without a network.
//!
//! # Layers
//!
//! - [`db`] - storage traits with in-memory and `PostgreSQL` backends
//! - [`services`] - staple lifecycle, accounts, notifications
//! - [`routes`], [`middleware`], [`error`] - the JSON HTTP API

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tower_sessions::{SessionManagerLayer, SessionStore};
use tracing::Span;

use config::EmailConfig;
use services::{EmailNotifier, LogNotifier, Notifier, NotifyError};
use state::AppState;

/// Build the application router with sessions and request tracing.
pub fn app<S>(state: AppState, session_layer: SessionManagerLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    Router::new()
        .merge(routes::routes())
        .layer(session_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// Pick the notification transport: SMTP when configured, the log otherwise.
///
/// # Errors
///
/// Returns `NotifyError::Smtp` if the SMTP relay cannot be configured.
pub fn notifier_from_config(email: Option<&EmailConfig>) -> Result<Arc<dyn Notifier>, NotifyError> {
    match email {
        Some(config) => Ok(Arc::new(EmailNotifier::new(config)?)),
        None => {
            tracing::warn!("SMTP not configured; notifications will be logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}
