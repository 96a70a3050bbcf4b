//! Staple quota.

use serde::{Deserialize, Serialize};

/// Error returned when a requested quota is outside the allowed range.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("maximum staples must be between {min} and {max}, got {requested}", min = MaxStaples::MIN, max = MaxStaples::MAX)]
pub struct QuotaError {
    /// The rejected value.
    pub requested: i64,
}

/// Upper bound on how many non-archived staples a user may hold.
///
/// Values set through [`MaxStaples::new`] are always within
/// [`MaxStaples::MIN`]..=[`MaxStaples::MAX`]. Records read back from storage
/// go through [`MaxStaples::from_stored`] instead, which accepts anything
/// non-negative: a stored `0` is a legacy "unset" marker and behaves as a
/// quota that admits nothing.
///
/// Deserializing goes through [`MaxStaples::new`], so the range check applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64")]
pub struct MaxStaples(u32);

impl MaxStaples {
    /// Smallest quota a user may choose.
    pub const MIN: u32 = 1;
    /// Largest quota a user may choose.
    pub const MAX: u32 = 100;
    /// Quota given to newly registered users.
    pub const DEFAULT: Self = Self(25);

    /// Create a validated quota.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError`] unless `MIN <= n <= MAX`.
    pub fn new(n: i64) -> Result<Self, QuotaError> {
        match u32::try_from(n) {
            Ok(v) if (Self::MIN..=Self::MAX).contains(&v) => Ok(Self(v)),
            _ => Err(QuotaError { requested: n }),
        }
    }

    /// Wrap a value read back from storage without range validation.
    ///
    /// Negative values are clamped to zero.
    #[must_use]
    pub fn from_stored(n: i32) -> Self {
        Self(u32::try_from(n).unwrap_or(0))
    }

    /// Get the underlying value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Whether one more staple fits when `active` are already held.
    #[must_use]
    pub fn admits(self, active: usize) -> bool {
        usize::try_from(self.0).is_ok_and(|limit| active < limit)
    }
}

impl TryFrom<i64> for MaxStaples {
    type Error = QuotaError;

    fn try_from(n: i64) -> Result<Self, Self::Error> {
        Self::new(n)
    }
}

impl Default for MaxStaples {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl core::fmt::Display for MaxStaples {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
