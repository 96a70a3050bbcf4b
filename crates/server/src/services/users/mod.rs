//! Account service.
//!
//! Registration, password checks, quota settings, and password recovery.
//!
//! # Recovery
//!
//! ```text
//! NoPendingReset --send_confirm_code--> CodeIssued
//! CodeIssued --verify_confirm_code(match)--> password reset, code cleared
//! CodeIssued --verify_confirm_code(mismatch)--> CodeIssued (CodeMismatch)
//! ```
//!
//! Password-affecting notifications must reach the user. When one fails, the
//! record is put back the way it was and the delivery error is returned.

mod error;
pub mod password;

pub use error::UserError;
pub use password::PasswordHashing;

use std::sync::Arc;

use subtle::ConstantTimeEq;
use tokio::sync::OwnedMutexGuard;
use tokio::time::timeout;

use staple_core::{Email, MaxStaples, NotificationEvent, Owner, UserRecord};

use super::{Notifier, NotifyError, OwnerLocks, within};
use crate::config::{HashingConfig, ServiceConfig};
use crate::db::{CredentialStore, StorageError};

/// Account operations.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn CredentialStore>,
    notifier: Arc<dyn Notifier>,
    locks: Arc<OwnerLocks>,
    hashing: PasswordHashing,
    config: ServiceConfig,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
        hashing: HashingConfig,
        config: ServiceConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            locks: Arc::new(OwnerLocks::new()),
            hashing: PasswordHashing::new(hashing),
            config,
        }
    }

    // =========================================================================
    // Registration and Lookup
    // =========================================================================

    /// Register a new account with the default quota and send a welcome.
    ///
    /// A failed welcome delivery is logged; the account stays registered.
    ///
    /// # Errors
    ///
    /// Returns `UserError::InvalidEmail` if the email format is invalid.
    /// Returns `UserError::Validation` if the password is empty.
    /// Returns `UserError::AlreadyRegistered` if the email is taken.
    pub async fn register(&self, email: &str, password: &str) -> Result<Email, UserError> {
        let email = Email::parse(email)?;
        validate_password(password)?;

        within(self.config.operation_timeout, async {
            let password_hash = self.hashing.hash(password)?;

            self.store
                .create(&email, &password_hash, self.config.default_max_staples)
                .await
                .map_err(|e| match e {
                    StorageError::Conflict(_) => UserError::AlreadyRegistered,
                    other => UserError::Storage(other),
                })?;

            tracing::info!(email = %email, "User registered");

            if let Err(e) = self
                .notifier
                .notify(&email, NotificationEvent::Welcome, "")
                .await
            {
                tracing::warn!(email = %email, error = %e, "Failed to send welcome notification");
            }

            Ok(email)
        })
        .await
    }

    /// Whether an account exists for `email`.
    ///
    /// # Errors
    ///
    /// Returns `UserError::Storage` if the store fails.
    pub async fn is_registered(&self, email: &Email) -> Result<bool, UserError> {
        within(self.config.operation_timeout, async {
            Ok(self.store.get(email).await?.is_some())
        })
        .await
    }

    /// Resolve the identity handed to the staple service.
    ///
    /// # Errors
    ///
    /// Returns `UserError::NotFound` if there is no such account.
    pub async fn owner(&self, email: &Email) -> Result<Owner, UserError> {
        within(self.config.operation_timeout, async {
            Ok(self.fetch(email).await?.owner())
        })
        .await
    }

    /// Compare `password` against the stored hash.
    ///
    /// # Errors
    ///
    /// Returns `UserError::NotFound` if there is no such account.
    pub async fn password_match(&self, email: &Email, password: &str) -> Result<bool, UserError> {
        within(self.config.operation_timeout, async {
            let record = self.fetch(email).await?;
            self.hashing.verify(password, &record.password_hash)
        })
        .await
    }

    /// Delete an account after confirming its password.
    ///
    /// # Errors
    ///
    /// Returns `UserError::NotFound` if there is no such account.
    /// Returns `UserError::AuthMismatch` if the password is wrong.
    pub async fn delete(&self, email: &Email, password: &str) -> Result<(), UserError> {
        within(self.config.operation_timeout, async {
            let _guard = self.locks.lock(email).await;

            let record = self.fetch(email).await?;
            if !self.hashing.verify(password, &record.password_hash)? {
                tracing::warn!(email = %email, "Account deletion refused: password mismatch");
                return Err(UserError::AuthMismatch);
            }

            self.store.delete(email).await?;
            tracing::info!(email = %email, "User deleted");
            Ok(())
        })
        .await
    }

    // =========================================================================
    // Passwords
    // =========================================================================

    /// Replace the password. The old password is not required.
    ///
    /// # Errors
    ///
    /// Returns `UserError::Validation` if the new password is empty.
    /// Returns `UserError::NotFound` if there is no such account.
    pub async fn change_password(&self, email: &Email, new_password: &str) -> Result<(), UserError> {
        validate_password(new_password)?;

        within(self.config.operation_timeout, async {
            let _guard = self.locks.lock(email).await;

            let mut record = self.fetch(email).await?;
            record.password_hash = self.hashing.hash(new_password)?;
            self.store.update(email, &record).await?;

            tracing::info!(email = %email, "Password changed");
            Ok(())
        })
        .await
    }

    /// Issue a confirm code and send it to the user.
    ///
    /// Any previously issued code stops working.
    ///
    /// # Errors
    ///
    /// Returns `UserError::NotFound` if there is no such account.
    /// Returns `UserError::Delivery` if the code could not be sent in time;
    /// the previous code (if any) stays in effect.
    pub async fn send_confirm_code(&self, email: &Email) -> Result<(), UserError> {
        let (_guard, previous) = self.lock_and_fetch(email).await?;

        let mut record = previous.clone();
        record.confirm_code = password::generate_confirm_code();
        self.commit_and_notify(
            &previous,
            &record,
            NotificationEvent::ConfirmCode,
            &record.confirm_code,
        )
        .await?;

        tracing::info!(email = %email, "Confirm code issued");
        Ok(())
    }

    /// Check a confirm code and, if it matches, reset the password.
    ///
    /// # Errors
    ///
    /// Returns `UserError::NotFound` if there is no such account.
    /// Returns `UserError::CodeMismatch` if no recovery is pending or the code
    /// is wrong. Nothing changes in that case.
    /// Returns `UserError::Delivery` if the new password could not be sent.
    pub async fn verify_confirm_code(&self, email: &Email, code: &str) -> Result<bool, UserError> {
        let (_guard, record) = self.lock_and_fetch(email).await?;

        if !record.has_pending_recovery() || !codes_match(&record.confirm_code, code) {
            tracing::warn!(email = %email, "Confirm code mismatch");
            return Err(UserError::CodeMismatch);
        }

        self.reset_locked(record).await?;
        Ok(true)
    }

    /// Replace the password with a generated one and send it to the user.
    ///
    /// Clears any pending confirm code.
    ///
    /// # Errors
    ///
    /// Returns `UserError::NotFound` if there is no such account.
    /// Returns `UserError::Delivery` if the new password could not be sent in
    /// time; the old password stays in effect.
    pub async fn reset_password(&self, email: &Email) -> Result<(), UserError> {
        let (_guard, record) = self.lock_and_fetch(email).await?;
        self.reset_locked(record).await
    }

    /// Reset with the owner lock already held.
    async fn reset_locked(&self, previous: UserRecord) -> Result<(), UserError> {
        let password = password::generate_password();

        let mut record = previous.clone();
        record.password_hash = self.hashing.hash(&password)?;
        record.confirm_code.clear();
        self.commit_and_notify(&previous, &record, NotificationEvent::PasswordReset, &password)
            .await?;

        tracing::info!(email = %previous.email, "Password reset");
        Ok(())
    }

    /// Take the owner lock and load the record within the deadline.
    ///
    /// The returned guard must be held across the write and delivery that
    /// follow.
    async fn lock_and_fetch(
        &self,
        email: &Email,
    ) -> Result<(OwnedMutexGuard<()>, UserRecord), UserError> {
        within(self.config.operation_timeout, async {
            let guard = self.locks.lock(email).await;
            let record = self.fetch(email).await?;
            Ok((guard, record))
        })
        .await
    }

    /// Store `updated`, then send `event`. If either step fails or runs out of
    /// time, `previous` is written back before the error is returned.
    ///
    /// The write and the delivery each get their own deadline. A delivery
    /// that runs out of time is a delivery failure.
    async fn commit_and_notify(
        &self,
        previous: &UserRecord,
        updated: &UserRecord,
        event: NotificationEvent,
        payload: &str,
    ) -> Result<(), UserError> {
        let limit = self.config.operation_timeout;
        let email = &previous.email;

        let failure = match timeout(limit, self.store.update(email, updated)).await {
            Ok(Ok(())) => match timeout(limit, self.notifier.notify(email, event, payload)).await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(e)) => UserError::Delivery(e),
                Err(elapsed) => UserError::Delivery(NotifyError::TimedOut(elapsed)),
            },
            Ok(Err(e)) => return Err(e.into()),
            // The write may have landed anyway
            Err(elapsed) => UserError::Timeout(elapsed),
        };

        tracing::error!(email = %email, event = %event, error = %failure, "Notification failed");
        match timeout(limit, self.store.update(email, previous)).await {
            Ok(Ok(())) => {}
            Ok(Err(restore)) => tracing::error!(
                email = %email,
                error = %restore,
                "Failed to restore account after notification failure"
            ),
            Err(_) => tracing::error!(
                email = %email,
                "Timed out restoring account after notification failure"
            ),
        }
        Err(failure)
    }

    // =========================================================================
    // Quota
    // =========================================================================

    /// Set how many active staples the user may hold.
    ///
    /// # Errors
    ///
    /// Returns `UserError::InvalidQuota` unless `1 <= n <= 100`.
    /// Returns `UserError::NotFound` if there is no such account.
    pub async fn set_maximum_staples(&self, email: &Email, n: i64) -> Result<(), UserError> {
        let max_staples = MaxStaples::new(n)?;

        within(self.config.operation_timeout, async {
            let _guard = self.locks.lock(email).await;

            let mut record = self.fetch(email).await?;
            record.max_staples = max_staples;
            self.store.update(email, &record).await?;

            tracing::info!(email = %email, max_staples = %max_staples, "Quota updated");
            Ok(())
        })
        .await
    }

    /// The user's current quota.
    ///
    /// # Errors
    ///
    /// Returns `UserError::NotFound` if there is no such account.
    pub async fn get_maximum_staples(&self, email: &Email) -> Result<MaxStaples, UserError> {
        within(self.config.operation_timeout, async {
            Ok(self.fetch(email).await?.max_staples)
        })
        .await
    }

    async fn fetch(&self, email: &Email) -> Result<UserRecord, UserError> {
        self.store.get(email).await?.ok_or(UserError::NotFound)
    }
}

fn codes_match(stored: &str, supplied: &str) -> bool {
    stored.as_bytes().ct_eq(supplied.as_bytes()).into()
}

fn validate_password(password: &str) -> Result<(), UserError> {
    if password.is_empty() {
        return Err(UserError::Validation("password cannot be empty".to_owned()));
    }
    Ok(())
}
