//! In-memory store backends.
//!
//! Each store keeps its data behind a single `RwLock`; every read-modify-write
//! happens under one write guard, so the ID and update invariants hold even
//! without the service-level owner locks. Both stores can be told to fail
//! every call, which the test suites use to check error propagation.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use staple_core::{Email, MaxStaples, NewStaple, Staple, StapleId, UserRecord};

use super::{CredentialStore, StapleStore, StorageError};

/// Injected failure shared by both stores.
#[derive(Debug, Default)]
struct FailureSwitch(Mutex<Option<String>>);

impl FailureSwitch {
    fn set(&self, message: Option<String>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = message;
    }

    fn check(&self) -> Result<(), StorageError> {
        match self.0.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(message) => Err(StorageError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }
}

fn poisoned<T>(_: PoisonError<T>) -> StorageError {
    StorageError::Unavailable("store lock poisoned".to_owned())
}

// =============================================================================
// Staples
// =============================================================================

/// One owner's staples plus the ID the next create will receive.
#[derive(Debug)]
struct Collection {
    next_id: StapleId,
    /// Ascending by ID; new staples are always appended.
    staples: Vec<Staple>,
}

impl Default for Collection {
    fn default() -> Self {
        Self {
            next_id: StapleId::FIRST,
            staples: Vec::new(),
        }
    }
}

/// Map-backed [`StapleStore`].
#[derive(Debug, Default)]
pub struct InMemoryStapleStore {
    owners: RwLock<HashMap<Email, Collection>>,
    failure: FailureSwitch,
}

impl InMemoryStapleStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `message`, or clear the failure.
    pub fn fail_with(&self, message: Option<&str>) {
        self.failure.set(message.map(str::to_owned));
    }

    /// Read-only access to one owner's staples.
    fn read<T>(
        &self,
        owner: &Email,
        f: impl FnOnce(&[Staple]) -> T,
    ) -> Result<T, StorageError> {
        self.failure.check()?;
        let owners = self.owners.read().map_err(poisoned)?;
        Ok(f(owners.get(owner).map_or(&[][..], |c| c.staples.as_slice())))
    }
}

#[async_trait]
impl StapleStore for InMemoryStapleStore {
    async fn create(
        &self,
        owner: &Email,
        staple: NewStaple,
        created_at: DateTime<Utc>,
    ) -> Result<Staple, StorageError> {
        self.failure.check()?;
        let mut owners = self.owners.write().map_err(poisoned)?;
        let collection = owners.entry(owner.clone()).or_default();

        let id = collection.next_id;
        collection.next_id = id
            .next()
            .ok_or_else(|| StorageError::Conflict("staple id space exhausted".to_owned()))?;

        let stored = Staple {
            id,
            owner: owner.clone(),
            name: staple.name,
            content: staple.content,
            created_at,
            archived: false,
        };
        collection.staples.push(stored.clone());
        Ok(stored)
    }

    async fn delete(&self, owner: &Email, id: StapleId) -> Result<(), StorageError> {
        self.failure.check()?;
        let mut owners = self.owners.write().map_err(poisoned)?;
        let collection = owners.get_mut(owner).ok_or(StorageError::NotFound)?;
        let position = collection
            .staples
            .iter()
            .position(|s| s.id == id)
            .ok_or(StorageError::NotFound)?;
        collection.staples.remove(position);
        Ok(())
    }

    async fn get(&self, owner: &Email, id: StapleId) -> Result<Option<Staple>, StorageError> {
        self.read(owner, |staples| {
            staples
                .iter()
                .find(|s| s.id == id && s.is_active())
                .cloned()
        })
    }

    async fn list(&self, owner: &Email) -> Result<Vec<Staple>, StorageError> {
        self.read(owner, |staples| {
            staples.iter().filter(|s| s.is_active()).cloned().collect()
        })
    }

    async fn archive(&self, owner: &Email, id: StapleId) -> Result<bool, StorageError> {
        self.failure.check()?;
        let mut owners = self.owners.write().map_err(poisoned)?;
        let found = owners
            .get_mut(owner)
            .and_then(|c| c.staples.iter_mut().find(|s| s.id == id));
        match found {
            Some(staple) => {
                staple.archived = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn oldest(&self, owner: &Email) -> Result<Option<Staple>, StorageError> {
        self.read(owner, |staples| {
            staples
                .iter()
                .filter(|s| s.is_active())
                .min_by_key(|s| s.created_at)
                .cloned()
        })
    }

    async fn show_archive(&self, owner: &Email) -> Result<Vec<Staple>, StorageError> {
        self.read(owner, |staples| {
            staples.iter().filter(|s| s.archived).cloned().collect()
        })
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// Map-backed [`CredentialStore`].
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    users: RwLock<HashMap<Email, UserRecord>>,
    failure: FailureSwitch,
}

impl InMemoryCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `message`, or clear the failure.
    pub fn fail_with(&self, message: Option<&str>) {
        self.failure.set(message.map(str::to_owned));
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create(
        &self,
        email: &Email,
        password_hash: &str,
        max_staples: MaxStaples,
    ) -> Result<(), StorageError> {
        self.failure.check()?;
        let mut users = self.users.write().map_err(poisoned)?;
        if users.contains_key(email) {
            return Err(StorageError::Conflict("email already exists".to_owned()));
        }
        users.insert(
            email.clone(),
            UserRecord::new(email.clone(), password_hash.to_owned(), max_staples),
        );
        Ok(())
    }

    async fn delete(&self, email: &Email) -> Result<(), StorageError> {
        self.failure.check()?;
        self.users.write().map_err(poisoned)?.remove(email);
        Ok(())
    }

    async fn get(&self, email: &Email) -> Result<Option<UserRecord>, StorageError> {
        self.failure.check()?;
        Ok(self.users.read().map_err(poisoned)?.get(email).cloned())
    }

    async fn update(&self, email: &Email, record: &UserRecord) -> Result<(), StorageError> {
        self.failure.check()?;
        let mut users = self.users.write().map_err(poisoned)?;
        if users.remove(email).is_none() {
            return Err(StorageError::NotFound);
        }
        users.insert(record.email.clone(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn owner() -> Email {
        Email::parse("reader@example.com").unwrap()
    }

    fn at(month: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1980, month, 1, 1, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn test_ids_are_sequential_per_owner() {
        let store = InMemoryStapleStore::new();
        let other = Email::parse("other@example.com").unwrap();

        for expected in 0..3 {
            let s = store
                .create(&owner(), NewStaple::new("n", "c"), at(1))
                .await
                .unwrap();
            assert_eq!(s.id, StapleId::new(expected));
        }
        let s = store
            .create(&other, NewStaple::new("n", "c"), at(1))
            .await
            .unwrap();
        assert_eq!(s.id, StapleId::FIRST);
    }

    #[tokio::test]
    async fn test_deleted_id_is_not_reused() {
        let store = InMemoryStapleStore::new();
        store
            .create(&owner(), NewStaple::new("a", "a"), at(1))
            .await
            .unwrap();
        let last = store
            .create(&owner(), NewStaple::new("b", "b"), at(2))
            .await
            .unwrap();
        store.delete(&owner(), last.id).await.unwrap();

        let next = store
            .create(&owner(), NewStaple::new("c", "c"), at(3))
            .await
            .unwrap();
        assert_eq!(next.id, StapleId::new(2));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = InMemoryStapleStore::new();
        let err = store.delete(&owner(), StapleId::FIRST).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn test_archive_reports_existence() {
        let store = InMemoryStapleStore::new();
        let s = store
            .create(&owner(), NewStaple::new("a", "a"), at(1))
            .await
            .unwrap();

        assert!(store.archive(&owner(), s.id).await.unwrap());
        assert!(store.archive(&owner(), s.id).await.unwrap());
        assert!(!store.archive(&owner(), StapleId::new(9)).await.unwrap());

        assert!(store.get(&owner(), s.id).await.unwrap().is_none());
        assert_eq!(store.show_archive(&owner()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_oldest_ignores_archived() {
        let store = InMemoryStapleStore::new();
        let newer = store
            .create(&owner(), NewStaple::new("newer", ""), at(5))
            .await
            .unwrap();
        let older = store
            .create(&owner(), NewStaple::new("older", ""), at(2))
            .await
            .unwrap();

        assert_eq!(store.oldest(&owner()).await.unwrap().unwrap().id, older.id);
        store.archive(&owner(), older.id).await.unwrap();
        assert_eq!(store.oldest(&owner()).await.unwrap().unwrap().id, newer.id);
    }

    #[tokio::test]
    async fn test_oldest_of_empty_is_none() {
        let store = InMemoryStapleStore::new();
        assert!(store.oldest(&owner()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = InMemoryStapleStore::new();
        store.fail_with(Some("unable to store staple"));
        let err = store.list(&owner()).await.unwrap_err();
        assert_eq!(err.to_string(), "storage unavailable: unable to store staple");

        store.fail_with(None);
        assert!(store.list(&owner()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_credentials_reject_duplicates() {
        let store = InMemoryCredentialStore::new();
        store
            .create(&owner(), "hash", MaxStaples::DEFAULT)
            .await
            .unwrap();
        let err = store
            .create(&owner(), "hash", MaxStaples::DEFAULT)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_credentials_update_requires_existing() {
        let store = InMemoryCredentialStore::new();
        let record = UserRecord::new(owner(), "hash".to_owned(), MaxStaples::DEFAULT);
        let err = store.update(&owner(), &record).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));

        store
            .create(&owner(), "old", MaxStaples::DEFAULT)
            .await
            .unwrap();
        store.update(&owner(), &record).await.unwrap();
        assert_eq!(
            store.get(&owner()).await.unwrap().unwrap().password_hash,
            "hash"
        );
    }
}
