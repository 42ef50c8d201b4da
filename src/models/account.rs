//! Accounts on third-party platforms.

use serde::{Deserialize, Serialize};

/// A user's identity on a linked platform, as reported by the platform itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAccount {
    /// Platform-side identifier (Discord snowflake, GitHub numeric id, ...).
    pub id: String,
    /// Platform-side display handle.
    pub name: String,
    /// Platform key, e.g. `discord` or `github`.
    pub platform: String,
}

impl ExternalAccount {
    pub fn new(platform: impl Into<String>, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            platform: platform.into(),
        }
    }

    /// Returns true if both values name the same platform identity.
    pub fn same_identity(&self, other: &ExternalAccount) -> bool {
        self.platform == other.platform && self.id == other.id
    }
}
