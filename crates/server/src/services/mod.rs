//! Business logic services.
//!
//! # Services
//!
//! - `staples` - Quota-bounded queue of staples per owner
//! - `users` - Registration, passwords, confirm-code recovery, quotas
//! - `notify` - Notification port and its transports
//!
//! Services hold no persistent state. Every read-modify-write runs under the
//! owner's entry in an [`OwnerLocks`] registry and inside the configured
//! operation deadline. Account changes that must be announced to the user
//! give the write and the delivery separate deadlines, so a late delivery
//! can still be rolled back.

pub mod notify;
pub mod staples;
pub mod users;

pub use notify::{
    CaptureNotifier, CapturedNotification, EmailNotifier, LogNotifier, Notifier, NotifyError,
    RenderedNotification,
};
pub use staples::{StapleError, StapleService};
pub use users::{UserError, UserService};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;
use tokio::time::error::Elapsed;

use staple_core::Email;

/// Async mutexes keyed by owner email.
///
/// Operations on different owners never contend. Entries nobody holds are
/// dropped the next time a lock is handed out.
#[derive(Debug, Default)]
pub struct OwnerLocks {
    locks: Mutex<HashMap<Email, Arc<tokio::sync::Mutex<()>>>>,
}

impl OwnerLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `owner`.
    pub async fn lock(&self, owner: &Email) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(owner.clone()).or_default())
        };
        lock.lock_owned().await
    }
}

/// Run `operation`, failing with `E::from(Elapsed)` once `limit` passes.
async fn within<T, E, F>(limit: Duration, operation: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<Elapsed>,
{
    tokio::time::timeout(limit, operation).await?
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_owner_is_serialized() {
        let locks = OwnerLocks::new();
        let owner = Email::parse("reader@example.com").unwrap();

        let guard = locks.lock(&owner).await;
        let blocked =
            tokio::time::timeout(Duration::from_millis(20), locks.lock(&owner)).await;
        assert!(blocked.is_err());

        drop(guard);
        let _again = locks.lock(&owner).await;
    }

    #[tokio::test]
    async fn test_other_owners_do_not_contend() {
        let locks = OwnerLocks::new();
        let a = Email::parse("a@example.com").unwrap();
        let b = Email::parse("b@example.com").unwrap();

        let _a = locks.lock(&a).await;
        let free = tokio::time::timeout(Duration::from_millis(20), locks.lock(&b)).await;
        assert!(free.is_ok());
    }

    #[tokio::test]
    async fn test_within_times_out() {
        #[derive(Debug)]
        struct Late;
        impl From<Elapsed> for Late {
            fn from(_: Elapsed) -> Self {
                Self
            }
        }

        let result: Result<(), Late> = within(Duration::from_millis(5), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(result.is_err());
    }
}
