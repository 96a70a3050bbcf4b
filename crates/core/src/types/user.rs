//! Credential records and authenticated identities.

use serde::{Deserialize, Serialize};

use super::{Email, MaxStaples};

/// A user's credential record as persisted by the credential store.
///
/// `password_hash` is a PHC-format string; the plaintext password is never
/// stored. `confirm_code` is empty unless a password recovery is in flight.
#[derive(Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Account key.
    pub email: Email,
    /// Salted one-way hash of the password.
    pub password_hash: String,
    /// Pending single-use recovery token, or empty.
    pub confirm_code: String,
    /// Active staple quota.
    pub max_staples: MaxStaples,
}

impl UserRecord {
    /// Build a fresh record with no pending recovery.
    #[must_use]
    pub const fn new(email: Email, password_hash: String, max_staples: MaxStaples) -> Self {
        Self {
            email,
            password_hash,
            confirm_code: String::new(),
            max_staples,
        }
    }

    /// Whether a confirm code has been issued and not yet consumed.
    #[must_use]
    pub fn has_pending_recovery(&self) -> bool {
        !self.confirm_code.is_empty()
    }

    /// The identity handed to services on behalf of this user.
    #[must_use]
    pub fn owner(&self) -> Owner {
        Owner {
            email: self.email.clone(),
            max_staples: self.max_staples,
        }
    }
}

impl core::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UserRecord")
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field(
                "confirm_code",
                &if self.has_pending_recovery() {
                    "[REDACTED]"
                } else {
                    ""
                },
            )
            .field("max_staples", &self.max_staples)
            .finish()
    }
}

/// An already-authenticated user, as resolved by the HTTP adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    /// Account key.
    pub email: Email,
    /// Quota at the time the identity was resolved.
    pub max_staples: MaxStaples,
}
