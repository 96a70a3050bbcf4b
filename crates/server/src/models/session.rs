//! Session-related types for user authentication.

use serde::{Deserialize, Serialize};

use staple_core::Email;

/// Session-stored user identity.
///
/// Only the account key lives in the session; the quota is looked up on
/// each request so a changed quota applies immediately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Account email.
    pub email: Email,
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";
}
