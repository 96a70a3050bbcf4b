//! Staple queue service.
//!
//! Staples are consumed oldest-first and archived once read. Creation is
//! bounded by the owner's quota, counted over non-archived staples only.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::time::error::Elapsed;

use staple_core::{Email, NewStaple, Owner, Staple, StapleId};

use super::{OwnerLocks, within};
use crate::config::{ArchiveMissing, ServiceConfig};
use crate::db::{StapleStore, StorageError};

/// Errors that can occur during staple operations.
#[derive(Debug, Error)]
pub enum StapleError {
    /// Required input is empty or malformed.
    #[error("{0}")]
    Validation(String),

    /// The staple does not exist.
    #[error("staple not found")]
    NotFound,

    /// The owner already has as many active staples as the quota allows.
    #[error("cannot create more staples than {limit}; current count is: {count}")]
    QuotaExceeded { limit: u32, count: usize },

    /// Store operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The operation deadline passed.
    #[error("operation timed out")]
    Timeout(#[from] Elapsed),
}

/// Staple lifecycle operations for authenticated owners.
#[derive(Clone)]
pub struct StapleService {
    store: Arc<dyn StapleStore>,
    locks: Arc<OwnerLocks>,
    config: ServiceConfig,
}

impl StapleService {
    /// Create a new staple service.
    #[must_use]
    pub fn new(store: Arc<dyn StapleStore>, config: ServiceConfig) -> Self {
        Self {
            store,
            locks: Arc::new(OwnerLocks::new()),
            config,
        }
    }

    /// Add a staple to the owner's queue, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns `StapleError::Validation` if the content is empty.
    /// Returns `StapleError::QuotaExceeded` if the owner is at their quota.
    pub async fn create(&self, owner: &Owner, staple: NewStaple) -> Result<Staple, StapleError> {
        self.create_at(owner, staple, Utc::now()).await
    }

    /// Add a staple with an explicit creation time.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create`].
    pub async fn create_at(
        &self,
        owner: &Owner,
        staple: NewStaple,
        created_at: DateTime<Utc>,
    ) -> Result<Staple, StapleError> {
        if staple.content.trim().is_empty() {
            return Err(StapleError::Validation(
                "staple content cannot be empty".to_owned(),
            ));
        }

        within(self.config.operation_timeout, async {
            let _guard = self.locks.lock(&owner.email).await;

            let count = self.store.list(&owner.email).await?.len();
            if !owner.max_staples.admits(count) {
                tracing::warn!(
                    owner = %owner.email,
                    limit = owner.max_staples.get(),
                    count,
                    "Staple quota exceeded"
                );
                return Err(StapleError::QuotaExceeded {
                    limit: owner.max_staples.get(),
                    count,
                });
            }

            let created = self.store.create(&owner.email, staple, created_at).await?;
            tracing::info!(owner = %owner.email, id = %created.id, "Staple created");
            Ok(created)
        })
        .await
    }

    /// Fetch an active staple. Archived staples are reported as absent.
    ///
    /// # Errors
    ///
    /// Returns `StapleError::Storage` if the store fails.
    pub async fn get(&self, owner: &Email, id: StapleId) -> Result<Option<Staple>, StapleError> {
        within(self.config.operation_timeout, async {
            Ok(self.store.get(owner, id).await?)
        })
        .await
    }

    /// The active staple created first, if any.
    ///
    /// # Errors
    ///
    /// Returns `StapleError::Storage` if the store fails.
    pub async fn oldest(&self, owner: &Email) -> Result<Option<Staple>, StapleError> {
        within(self.config.operation_timeout, async {
            Ok(self.store.oldest(owner).await?)
        })
        .await
    }

    /// All active staples in ID order.
    ///
    /// # Errors
    ///
    /// Returns `StapleError::Storage` if the store fails.
    pub async fn list(&self, owner: &Email) -> Result<Vec<Staple>, StapleError> {
        within(self.config.operation_timeout, async {
            Ok(self.store.list(owner).await?)
        })
        .await
    }

    /// Move a staple to the archive.
    ///
    /// Archiving twice is a no-op. What happens for an unknown ID depends on
    /// [`ServiceConfig::archive_missing`].
    ///
    /// # Errors
    ///
    /// Returns `StapleError::NotFound` for an unknown ID when the policy is
    /// [`ArchiveMissing::NotFound`].
    pub async fn archive(&self, owner: &Email, id: StapleId) -> Result<(), StapleError> {
        within(self.config.operation_timeout, async {
            let _guard = self.locks.lock(owner).await;

            if self.store.archive(owner, id).await? {
                tracing::info!(owner = %owner, id = %id, "Staple archived");
                return Ok(());
            }

            match self.config.archive_missing {
                ArchiveMissing::Ignore => {
                    tracing::debug!(owner = %owner, id = %id, "Archive of unknown staple ignored");
                    Ok(())
                }
                ArchiveMissing::NotFound => Err(StapleError::NotFound),
            }
        })
        .await
    }

    /// All archived staples in ID order.
    ///
    /// # Errors
    ///
    /// Returns `StapleError::Storage` if the store fails.
    pub async fn show_archive(&self, owner: &Email) -> Result<Vec<Staple>, StapleError> {
        within(self.config.operation_timeout, async {
            Ok(self.store.show_archive(owner).await?)
        })
        .await
    }

    /// Permanently remove a staple, archived or not.
    ///
    /// # Errors
    ///
    /// Returns `StapleError::NotFound` if the owner has no such staple.
    pub async fn delete(&self, owner: &Email, id: StapleId) -> Result<(), StapleError> {
        within(self.config.operation_timeout, async {
            let _guard = self.locks.lock(owner).await;

            self.store.delete(owner, id).await.map_err(|e| match e {
                StorageError::NotFound => StapleError::NotFound,
                other => StapleError::Storage(other),
            })?;

            tracing::info!(owner = %owner, id = %id, "Staple deleted");
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;
    use staple_core::MaxStaples;

    use super::*;
    use crate::db::InMemoryStapleStore;

    fn owner(max: i64) -> Owner {
        Owner {
            email: Email::parse("reader@example.com").unwrap(),
            max_staples: MaxStaples::new(max).unwrap(),
        }
    }

    fn service() -> (StapleService, Arc<InMemoryStapleStore>) {
        let store = Arc::new(InMemoryStapleStore::new());
        (
            StapleService::new(store.clone(), ServiceConfig::default()),
            store,
        )
    }

    fn year_1980(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1980, 1, day, 1, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn test_quota_boundary_is_exact() {
        let (service, _) = service();
        let owner = owner(2);

        service
            .create(&owner, NewStaple::new("a", "a"))
            .await
            .unwrap();
        service
            .create(&owner, NewStaple::new("b", "b"))
            .await
            .unwrap();
        let err = service
            .create(&owner, NewStaple::new("c", "c"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot create more staples than 2; current count is: 2"
        );
    }

    #[tokio::test]
    async fn test_archived_staples_free_quota() {
        let (service, _) = service();
        let owner = owner(1);

        let first = service
            .create(&owner, NewStaple::new("a", "a"))
            .await
            .unwrap();
        service.archive(&owner.email, first.id).await.unwrap();
        let second = service
            .create(&owner, NewStaple::new("b", "b"))
            .await
            .unwrap();
        assert_eq!(second.id, StapleId::new(1));
    }

    #[tokio::test]
    async fn test_zero_quota_rejects_first_staple() {
        let (service, _) = service();
        let owner = Owner {
            email: Email::parse("reader@example.com").unwrap(),
            max_staples: MaxStaples::from_stored(0),
        };

        let err = service
            .create(&owner, NewStaple::new("a", "a"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StapleError::QuotaExceeded { limit: 0, count: 0 }
        ));
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let (service, _) = service();
        let err = service
            .create(&owner(5), NewStaple::new("name", "  "))
            .await
            .unwrap_err();
        assert!(matches!(err, StapleError::Validation(_)));
    }

    #[tokio::test]
    async fn test_oldest_then_next_oldest() {
        let (service, _) = service();
        let owner = owner(5);

        let first = service
            .create_at(&owner, NewStaple::new("1", "first"), year_1980(1))
            .await
            .unwrap();
        let second = service
            .create_at(&owner, NewStaple::new("2", "second"), year_1980(2))
            .await
            .unwrap();
        service
            .create_at(&owner, NewStaple::new("3", "third"), year_1980(3))
            .await
            .unwrap();

        let oldest = service.oldest(&owner.email).await.unwrap().unwrap();
        assert_eq!(oldest.id, first.id);

        service.archive(&owner.email, first.id).await.unwrap();
        let oldest = service.oldest(&owner.email).await.unwrap().unwrap();
        assert_eq!(oldest.id, second.id);
    }

    #[tokio::test]
    async fn test_archive_missing_policy() {
        let (service, _) = service();
        let email = owner(5).email;
        service.archive(&email, StapleId::new(42)).await.unwrap();

        let strict = StapleService::new(
            Arc::new(InMemoryStapleStore::new()),
            ServiceConfig {
                archive_missing: ArchiveMissing::NotFound,
                ..ServiceConfig::default()
            },
        );
        let err = strict.archive(&email, StapleId::new(42)).await.unwrap_err();
        assert!(matches!(err, StapleError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_then_get() {
        let (service, _) = service();
        let owner = owner(5);
        let staple = service
            .create(&owner, NewStaple::new("a", "a"))
            .await
            .unwrap();

        service.delete(&owner.email, staple.id).await.unwrap();
        assert!(service.get(&owner.email, staple.id).await.unwrap().is_none());

        let err = service.delete(&owner.email, staple.id).await.unwrap_err();
        assert!(matches!(err, StapleError::NotFound));
    }

    #[tokio::test]
    async fn test_storage_failure_is_wrapped() {
        let (service, store) = service();
        store.fail_with(Some("unable to store staple"));

        let err = service
            .create(&owner(5), NewStaple::new("a", "a"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StapleError::Storage(StorageError::Unavailable(ref m)) if m == "unable to store staple"
        ));
    }

    #[tokio::test]
    async fn test_concurrent_creates_respect_quota() {
        let (service, _) = service();
        let owner = owner(3);

        let attempts = (0..10).map(|i| {
            let service = service.clone();
            let owner = owner.clone();
            tokio::spawn(async move {
                service
                    .create(&owner, NewStaple::new(format!("{i}"), "content"))
                    .await
            })
        });

        let mut created = 0;
        for attempt in attempts.collect::<Vec<_>>() {
            if attempt.await.unwrap().is_ok() {
                created += 1;
            }
        }
        assert_eq!(created, 3);
        assert_eq!(service.list(&owner.email).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_timeout() {
        let (_, store) = service();
        let service = StapleService::new(
            store,
            ServiceConfig {
                operation_timeout: Duration::from_nanos(1),
                ..ServiceConfig::default()
            },
        );
        // A deadline this short may still let an uncontended call finish;
        // hold the owner lock so the call has to wait.
        let owner = owner(5);
        let _held = service.locks.lock(&owner.email).await;
        let err = service
            .create(&owner, NewStaple::new("a", "a"))
            .await
            .unwrap_err();
        assert!(matches!(err, StapleError::Timeout(_)));
    }
}
