//! `PostgreSQL` staple store.
//!
//! IDs come from the `staple_counters` table: the upsert that reserves an ID
//! and the insert that uses it run in one transaction, and the row lock taken
//! by the upsert serializes concurrent creates for the same owner.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use staple_core::{Email, NewStaple, Staple, StapleId};

use super::{StapleStore, StorageError, conflict_or_database};

/// Row shape shared by every staple query.
#[derive(Debug, sqlx::FromRow)]
struct StapleRow {
    id: i32,
    user_email: String,
    name: String,
    content: String,
    archived: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<StapleRow> for Staple {
    type Error = StorageError;

    fn try_from(row: StapleRow) -> Result<Self, Self::Error> {
        let owner = Email::parse(&row.user_email).map_err(|e| {
            StorageError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: StapleId::new(row.id),
            owner,
            name: row.name,
            content: row.content,
            created_at: row.created_at,
            archived: row.archived,
        })
    }
}

fn into_staples(rows: Vec<StapleRow>) -> Result<Vec<Staple>, StorageError> {
    rows.into_iter().map(Staple::try_from).collect()
}

/// Staple store backed by the `staples` table.
#[derive(Debug, Clone)]
pub struct PgStapleStore {
    pool: PgPool,
}

impl PgStapleStore {
    /// Create a new staple store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StapleStore for PgStapleStore {
    async fn create(
        &self,
        owner: &Email,
        staple: NewStaple,
        created_at: DateTime<Utc>,
    ) -> Result<Staple, StorageError> {
        let mut tx = self.pool.begin().await?;

        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO staple_counters (user_email, next_id)
            VALUES ($1, 1)
            ON CONFLICT (user_email)
            DO UPDATE SET next_id = staple_counters.next_id + 1
            RETURNING next_id - 1
            ",
        )
        .bind(owner)
        .fetch_one(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, StapleRow>(
            r"
            INSERT INTO staples (user_email, id, name, content, archived, created_at)
            VALUES ($1, $2, $3, $4, FALSE, $5)
            RETURNING id, user_email, name, content, archived, created_at
            ",
        )
        .bind(owner)
        .bind(id)
        .bind(&staple.name)
        .bind(&staple.content)
        .bind(created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_or_database(e, "staple"))?;

        tx.commit().await?;

        Staple::try_from(row)
    }

    async fn delete(&self, owner: &Email, id: StapleId) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM staples WHERE user_email = $1 AND id = $2")
            .bind(owner)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        Ok(())
    }

    async fn get(&self, owner: &Email, id: StapleId) -> Result<Option<Staple>, StorageError> {
        let row = sqlx::query_as::<_, StapleRow>(
            r"
            SELECT id, user_email, name, content, archived, created_at
            FROM staples
            WHERE user_email = $1 AND id = $2 AND NOT archived
            ",
        )
        .bind(owner)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Staple::try_from).transpose()
    }

    async fn list(&self, owner: &Email) -> Result<Vec<Staple>, StorageError> {
        let rows = sqlx::query_as::<_, StapleRow>(
            r"
            SELECT id, user_email, name, content, archived, created_at
            FROM staples
            WHERE user_email = $1 AND NOT archived
            ORDER BY id ASC
            ",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        into_staples(rows)
    }

    async fn archive(&self, owner: &Email, id: StapleId) -> Result<bool, StorageError> {
        let result =
            sqlx::query("UPDATE staples SET archived = TRUE WHERE user_email = $1 AND id = $2")
                .bind(owner)
                .bind(id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn oldest(&self, owner: &Email) -> Result<Option<Staple>, StorageError> {
        let row = sqlx::query_as::<_, StapleRow>(
            r"
            SELECT id, user_email, name, content, archived, created_at
            FROM staples
            WHERE user_email = $1 AND NOT archived
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            ",
        )
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Staple::try_from).transpose()
    }

    async fn show_archive(&self, owner: &Email) -> Result<Vec<Staple>, StorageError> {
        let rows = sqlx::query_as::<_, StapleRow>(
            r"
            SELECT id, user_email, name, content, archived, created_at
            FROM staples
            WHERE user_email = $1 AND archived
            ORDER BY id ASC
            ",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        into_staples(rows)
    }
}
