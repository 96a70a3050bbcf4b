//! Integration tests for Staple.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p staple-integration-tests
//! ```
//!
//! Everything runs against the in-memory stores and the capture notifier, so
//! no database or mail server is needed.
//!
//! # Test Categories
//!
//! - `staple_lifecycle` - queue, quota, and archive behaviour through the services
//! - `password_recovery` - registration, passwords, and confirm codes
//! - `http_api` - the same flows through the axum router

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::Value;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use staple_core::{Email, NotificationEvent, Owner};
use staple_server::config::{HashingConfig, ServerConfig, ServiceConfig};
use staple_server::db::{InMemoryCredentialStore, InMemoryStapleStore, Stores};
use staple_server::middleware::create_session_layer;
use staple_server::services::{CaptureNotifier, StapleService, UserService};
use staple_server::state::AppState;

/// Services wired to in-memory stores, with handles on the test doubles.
pub struct TestContext {
    pub users: UserService,
    pub staples: StapleService,
    pub notifier: Arc<CaptureNotifier>,
    pub staple_store: Arc<InMemoryStapleStore>,
    pub credential_store: Arc<InMemoryCredentialStore>,
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ServiceConfig::default())
    }

    #[must_use]
    pub fn with_config(config: ServiceConfig) -> Self {
        let notifier = Arc::new(CaptureNotifier::new());
        let staple_store = Arc::new(InMemoryStapleStore::new());
        let credential_store = Arc::new(InMemoryCredentialStore::new());

        Self {
            users: UserService::new(
                credential_store.clone(),
                notifier.clone(),
                HashingConfig::minimal(),
                config.clone(),
            ),
            staples: StapleService::new(staple_store.clone(), config),
            notifier,
            staple_store,
            credential_store,
        }
    }

    /// Register an account and resolve its identity.
    pub async fn register(&self, email: &str, password: &str) -> Owner {
        let email = self.users.register(email, password).await.unwrap();
        self.users.owner(&email).await.unwrap()
    }

    /// Payload of the latest `event` notification sent to `email`.
    #[must_use]
    pub fn last_payload(&self, email: &Email, event: NotificationEvent) -> String {
        self.notifier
            .last_payload(email, event)
            .unwrap_or_else(|| panic!("no {event} notification for {email}"))
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the HTTP tests.
#[must_use]
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::from_lookup(|key| {
        (key == "STAPLE_BASE_URL").then(|| "http://localhost:9998".to_owned())
    })
    .expect("valid test configuration");
    config.hashing = HashingConfig::minimal();
    config
}

/// The full router over in-memory stores, driven without a socket.
pub struct TestApp {
    router: Router,
    pub notifier: Arc<CaptureNotifier>,
}

/// What came back from one request.
pub struct TestResponse {
    pub status: StatusCode,
    pub cookie: Option<String>,
    pub body: Value,
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        let config = test_config();
        let notifier = Arc::new(CaptureNotifier::new());
        let session_layer = create_session_layer(MemoryStore::default(), &config);
        let state = AppState::new(config, Stores::in_memory(), notifier.clone(), None);

        Self {
            router: staple_server::app(state, session_layer),
            notifier,
        }
    }

    /// Send one request. `cookie` is forwarded as the `Cookie` header.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookie: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_owned);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            cookie,
            body,
        }
    }

    /// Register and log in; returns the session cookie.
    pub async fn sign_up(&self, email: &str, password: &str) -> String {
        let credentials = serde_json::json!({ "email": email, "password": password });

        let registered = self
            .request(Method::POST, "/auth/register", Some(credentials.clone()), None)
            .await;
        assert_eq!(registered.status, StatusCode::CREATED);

        let login = self
            .request(Method::POST, "/auth/login", Some(credentials), None)
            .await;
        assert_eq!(login.status, StatusCode::NO_CONTENT);
        login.cookie.expect("login sets a session cookie")
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}
