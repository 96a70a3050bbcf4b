//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::db::Stores;
use crate::services::{Notifier, StapleService, UserService};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    users: UserService,
    staples: StapleService,
    pool: Option<PgPool>,
}

impl AppState {
    /// Wire the services to the chosen stores.
    ///
    /// `pool` is only used by the readiness check; pass `None` for the
    /// in-memory backend.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        stores: Stores,
        notifier: Arc<dyn Notifier>,
        pool: Option<PgPool>,
    ) -> Self {
        let users = UserService::new(
            stores.credentials,
            notifier,
            config.hashing,
            config.service.clone(),
        );
        let staples = StapleService::new(stores.staples, config.service.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                users,
                staples,
                pool,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn users(&self) -> &UserService {
        &self.inner.users
    }

    #[must_use]
    pub fn staples(&self) -> &StapleService {
        &self.inner.staples
    }

    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }
}
