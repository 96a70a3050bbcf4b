//! `PostgreSQL` credential store.

use async_trait::async_trait;
use sqlx::PgPool;

use staple_core::{Email, MaxStaples, UserRecord};

use super::{CredentialStore, StorageError, conflict_or_database};

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    email: String,
    password_hash: String,
    confirm_code: String,
    max_staples: i32,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = StorageError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            StorageError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            email,
            password_hash: row.password_hash,
            confirm_code: row.confirm_code,
            max_staples: MaxStaples::from_stored(row.max_staples),
        })
    }
}

fn quota_column(max_staples: MaxStaples) -> i32 {
    i32::try_from(max_staples.get()).unwrap_or(i32::MAX)
}

/// Credential store backed by the `users` table.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    /// Create a new credential store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create(
        &self,
        email: &Email,
        password_hash: &str,
        max_staples: MaxStaples,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO users (email, password_hash, confirm_code, max_staples)
            VALUES ($1, $2, '', $3)
            ",
        )
        .bind(email)
        .bind(password_hash)
        .bind(quota_column(max_staples))
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "email"))?;

        Ok(())
    }

    async fn delete(&self, email: &Email) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM users WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get(&self, email: &Email) -> Result<Option<UserRecord>, StorageError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT email, password_hash, confirm_code, max_staples
            FROM users
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn update(&self, email: &Email, record: &UserRecord) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET email = $1, password_hash = $2, confirm_code = $3, max_staples = $4
            WHERE email = $5
            ",
        )
        .bind(&record.email)
        .bind(&record.password_hash)
        .bind(&record.confirm_code)
        .bind(quota_column(record.max_staples))
        .bind(email)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "email"))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        Ok(())
    }
}
