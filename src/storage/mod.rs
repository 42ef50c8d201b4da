//! Storage abstraction for PronounDB users and their linked accounts.
//!
//! This module provides a trait-based storage abstraction with two implementations:
//! - `SqlxStorage`: PostgreSQL storage via SQLx (feature: `sqlx-storage`)
//! - `MemoryStorage`: In-memory storage for testing (feature: `memory-storage`)

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::models::{ExternalAccount, Pronouns, User};

#[cfg(feature = "sqlx-storage")]
mod sqlx_impl;
#[cfg(feature = "sqlx-storage")]
pub use sqlx_impl::SqlxStorage;

#[cfg(any(test, feature = "memory-storage"))]
mod memory;
#[cfg(any(test, feature = "memory-storage"))]
pub use memory::MemoryStorage;

/// Storage trait for user operations.
///
/// This trait is object-safe and can be used with `Box<dyn UserStorage>`.
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Get a user by ID, including linked accounts.
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>>;

    /// Get the user owning a platform account.
    async fn find_user_by_account(&self, platform: &str, account_id: &str)
        -> Result<Option<User>>;

    /// Create a user owning `account`.
    ///
    /// Fails with [`StorageError::AccountTaken`] if the account is already linked.
    async fn create_user(&self, account: &ExternalAccount) -> Result<User>;

    /// Link `account` to an existing user. Re-linking an account the user
    /// already owns refreshes its name.
    ///
    /// Fails with [`StorageError::AccountTaken`] if another user owns it.
    async fn link_account(&self, user_id: Uuid, account: &ExternalAccount) -> Result<()>;

    /// Set a user's display name.
    async fn update_name(&self, user_id: Uuid, name: &str) -> Result<()>;

    /// Remove a user's display name.
    async fn delete_name(&self, user_id: Uuid) -> Result<()>;

    /// Set a user's pronouns.
    async fn update_pronouns(&self, user_id: Uuid, pronouns: Pronouns) -> Result<()>;

    /// Pronouns registered for a platform account, `Unspecified` when unknown.
    async fn lookup_pronouns(&self, platform: &str, account_id: &str) -> Result<Pronouns> {
        Ok(self
            .find_user_by_account(platform, account_id)
            .await?
            .map(|u| u.pronouns)
            .unwrap_or_default())
    }
}

/// Helper function to build the error for an account owned by someone else.
pub fn account_taken(account: &ExternalAccount) -> StorageError {
    StorageError::AccountTaken {
        platform: account.platform.clone(),
        id: account.id.clone(),
    }
}
