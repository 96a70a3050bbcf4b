//! Events the notification port can deliver.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Something that happened to an account and needs the user's attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    /// A new account was registered.
    Welcome,
    /// The password was replaced; the payload is the new plaintext password.
    PasswordReset,
    /// A recovery was started; the payload is the confirm code.
    ConfirmCode,
}

impl NotificationEvent {
    /// Human-readable title, used in message subjects.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Welcome => "Welcome",
            Self::PasswordReset => "Password Reset",
            Self::ConfirmCode => "Confirm Code",
        }
    }

    /// Whether a failed delivery of this event would leave the user locked out.
    #[must_use]
    pub const fn affects_password(self) -> bool {
        matches!(self, Self::PasswordReset | Self::ConfirmCode)
    }
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}
