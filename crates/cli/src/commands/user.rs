//! Account management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create an account
//! staple user create -e reader@example.com -p 'correct horse'
//!
//! # Change an account's quota
//! staple user set-quota -e reader@example.com -n 50
//! ```
//!
//! Accounts created here get the welcome notification through the log, not
//! SMTP.

use std::sync::Arc;

use staple_core::Email;
use staple_server::config::{HashingConfig, ServiceConfig};
use staple_server::db::PgCredentialStore;
use staple_server::services::{LogNotifier, UserError, UserService};

use super::{CommandError, connect};

async fn service() -> Result<UserService, CommandError> {
    let pool = connect().await?;
    Ok(UserService::new(
        Arc::new(PgCredentialStore::new(pool)),
        Arc::new(LogNotifier),
        HashingConfig::default(),
        ServiceConfig::default(),
    ))
}

/// Register a new account.
///
/// # Errors
///
/// Returns `CommandError::User` if the email is invalid or already taken.
pub async fn create(email: &str, password: &str) -> Result<(), CommandError> {
    let users = service().await?;
    let email = users.register(email, password).await?;

    tracing::info!("User created: {email}");
    Ok(())
}

/// Set the maximum number of active staples for an account.
///
/// # Errors
///
/// Returns `CommandError::User` if the account does not exist or `n` is out
/// of range.
pub async fn set_quota(email: &str, n: i64) -> Result<(), CommandError> {
    let email = Email::parse(email).map_err(UserError::from)?;
    let users = service().await?;
    users.set_maximum_staples(&email, n).await?;

    tracing::info!("Quota for {email} set to {n}");
    Ok(())
}
