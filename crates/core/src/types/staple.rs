//! Staple records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Email, StapleId};

/// A stored text snippet waiting in its owner's queue.
///
/// `created_at` is stamped once by the service and never changes. `archived`
/// only ever goes from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staple {
    /// Per-owner sequential ID.
    pub id: StapleId,
    /// Owning account.
    pub owner: Email,
    /// Short title shown in listings.
    pub name: String,
    /// The saved text.
    pub content: String,
    /// When the staple was created (UTC).
    pub created_at: DateTime<Utc>,
    /// Whether the staple has been read and moved to the archive.
    pub archived: bool,
}

impl Staple {
    /// Whether the staple is still in the active queue.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.archived
    }
}

/// Client-supplied part of a staple.
///
/// The ID, owner, timestamp, and archive flag are never taken from the
/// client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStaple {
    /// Short title shown in listings.
    #[serde(default)]
    pub name: String,
    /// The text to save.
    pub content: String,
}

impl NewStaple {
    /// Create a new staple payload.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}
