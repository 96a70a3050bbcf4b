//! Storage for credential records and staples.
//!
//! Services depend only on the [`StapleStore`] and [`CredentialStore`] traits.
//! Two backends implement them, chosen once at startup:
//!
//! - [`memory`] - process-local maps, used when no database URL is configured
//!   and by the test suites
//! - [`staples`] / [`users`] - `PostgreSQL` via sqlx
//!
//! # Database: `staples`
//!
//! ## Tables
//!
//! - `users` - Credential records keyed by email
//! - `staples` - Staple records keyed by `(user_email, id)`
//! - `staple_counters` - Next staple ID per owner, never decremented
//! - `tower_sessions.session` - Session storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p staple-cli -- migrate
//! ```

pub mod memory;
pub mod staples;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use staple_core::{Email, MaxStaples, NewStaple, Staple, StapleId, UserRecord};

pub use memory::{InMemoryCredentialStore, InMemoryStapleStore};
pub use staples::PgStapleStore;
pub use users::PgCredentialStore;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The backend refused the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Persistence for staple collections.
///
/// Every method is scoped to one owner. Implementations assign IDs inside
/// [`StapleStore::create`] atomically, so two concurrent creates for the same
/// owner can never receive the same ID, and a deleted ID is never reissued.
#[async_trait]
pub trait StapleStore: Send + Sync {
    /// Persist a new staple and return it with its assigned ID.
    async fn create(
        &self,
        owner: &Email,
        staple: NewStaple,
        created_at: DateTime<Utc>,
    ) -> Result<Staple, StorageError>;

    /// Remove a staple regardless of its archive state.
    ///
    /// Returns [`StorageError::NotFound`] if the owner has no such staple.
    async fn delete(&self, owner: &Email, id: StapleId) -> Result<(), StorageError>;

    /// Fetch a staple if it exists and is not archived.
    async fn get(&self, owner: &Email, id: StapleId) -> Result<Option<Staple>, StorageError>;

    /// Every non-archived staple, ascending by ID.
    async fn list(&self, owner: &Email) -> Result<Vec<Staple>, StorageError>;

    /// Mark a staple archived. Returns whether the ID existed.
    async fn archive(&self, owner: &Email, id: StapleId) -> Result<bool, StorageError>;

    /// The non-archived staple with the earliest `created_at`.
    async fn oldest(&self, owner: &Email) -> Result<Option<Staple>, StorageError>;

    /// Every archived staple, ascending by ID.
    async fn show_archive(&self, owner: &Email) -> Result<Vec<Staple>, StorageError>;
}

/// Persistence for credential records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a fresh record with an empty confirm code.
    ///
    /// Returns [`StorageError::Conflict`] if the email is already present.
    async fn create(
        &self,
        email: &Email,
        password_hash: &str,
        max_staples: MaxStaples,
    ) -> Result<(), StorageError>;

    /// Remove a record. Removing an absent record is not an error.
    async fn delete(&self, email: &Email) -> Result<(), StorageError>;

    /// Fetch a record.
    async fn get(&self, email: &Email) -> Result<Option<UserRecord>, StorageError>;

    /// Replace the stored record for `email` with `record`.
    ///
    /// Returns [`StorageError::NotFound`] if there is nothing to replace.
    async fn update(&self, email: &Email, record: &UserRecord) -> Result<(), StorageError>;
}

/// The pair of stores the services run against.
#[derive(Clone)]
pub struct Stores {
    /// Staple collections.
    pub staples: Arc<dyn StapleStore>,
    /// Credential records.
    pub credentials: Arc<dyn CredentialStore>,
}

impl Stores {
    /// Fresh in-memory stores.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            staples: Arc::new(InMemoryStapleStore::new()),
            credentials: Arc::new(InMemoryCredentialStore::new()),
        }
    }

    /// `PostgreSQL` stores sharing one pool.
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            staples: Arc::new(PgStapleStore::new(pool.clone())),
            credentials: Arc::new(PgCredentialStore::new(pool.clone())),
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique-violation into [`StorageError::Conflict`].
fn conflict_or_database(e: sqlx::Error, what: &str) -> StorageError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return StorageError::Conflict(format!("{what} already exists"));
    }
    StorageError::Database(e)
}
