//! PronounDB user model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{account::ExternalAccount, pronouns::Pronouns};

/// Longest display name accepted, counted in characters after trimming.
pub const MAX_NAME_LENGTH: usize = 16;

/// A PronounDB user and the platform accounts linked to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Internal user ID.
    pub id: Uuid,
    /// Optional display name.
    pub name: Option<String>,
    /// Selected pronouns.
    pub pronouns: Pronouns,
    /// Linked platform accounts.
    pub accounts: Vec<ExternalAccount>,
    /// When the user record was created.
    pub created_at: DateTime<Utc>,
    /// When the user record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a fresh user owning a single account.
    pub fn new(account: ExternalAccount) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: None,
            pronouns: Pronouns::Unspecified,
            accounts: vec![account],
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome of checking a submitted display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameChange {
    /// Store the trimmed name.
    Update(String),
    /// The trimmed name was empty: remove it.
    Delete,
    /// The trimmed name exceeds [`MAX_NAME_LENGTH`].
    TooLong,
}

impl NameChange {
    /// Trim and classify a submitted name.
    pub fn from_input(raw: &str) -> Self {
        let name = raw.trim();
        if name.chars().count() > MAX_NAME_LENGTH {
            Self::TooLong
        } else if name.is_empty() {
            Self::Delete
        } else {
            Self::Update(name.to_string())
        }
    }
}
