//! In-memory storage implementation for testing.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    models::{ExternalAccount, Pronouns, User},
    storage::{account_taken, UserStorage},
};

/// In-memory storage backend for testing and development.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    users: RwLock<HashMap<Uuid, User>>,
    /// `(platform, account id)` to owning user.
    accounts: RwLock<HashMap<(String, String), Uuid>>,
}

impl MemoryStorage {
    /// Create a new empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all stored data (useful for test cleanup).
    pub fn clear(&self) {
        self.users.write().clear();
        self.accounts.write().clear();
    }

    /// Get the number of stored users.
    pub fn user_count(&self) -> usize {
        self.users.read().len()
    }

    /// Get the number of linked accounts across all users.
    pub fn account_count(&self) -> usize {
        self.accounts.read().len()
    }

    fn with_user<F>(&self, user_id: Uuid, f: F) -> Result<()>
    where
        F: FnOnce(&mut User),
    {
        let mut users = self.users.write();
        let user = users.get_mut(&user_id).ok_or(Error::UserNotFound(user_id))?;
        f(user);
        user.updated_at = Utc::now();
        Ok(())
    }
}

fn account_key(account: &ExternalAccount) -> (String, String) {
    (account.platform.clone(), account.id.clone())
}

#[async_trait]
impl UserStorage for MemoryStorage {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().get(&user_id).cloned())
    }

    async fn find_user_by_account(
        &self,
        platform: &str,
        account_id: &str,
    ) -> Result<Option<User>> {
        let owner = self
            .accounts
            .read()
            .get(&(platform.to_string(), account_id.to_string()))
            .copied();

        Ok(owner.and_then(|id| self.users.read().get(&id).cloned()))
    }

    async fn create_user(&self, account: &ExternalAccount) -> Result<User> {
        let mut accounts = self.accounts.write();
        let key = account_key(account);
        if accounts.contains_key(&key) {
            return Err(account_taken(account).into());
        }

        let user = User::new(account.clone());
        accounts.insert(key, user.id);
        self.users.write().insert(user.id, user.clone());
        Ok(user)
    }

    async fn link_account(&self, user_id: Uuid, account: &ExternalAccount) -> Result<()> {
        let mut accounts = self.accounts.write();
        let key = account_key(account);
        match accounts.get(&key) {
            Some(owner) if *owner != user_id => return Err(account_taken(account).into()),
            _ => {}
        }

        self.with_user(user_id, |user| {
            match user.accounts.iter_mut().find(|a| a.same_identity(account)) {
                Some(existing) => existing.name = account.name.clone(),
                None => user.accounts.push(account.clone()),
            }
        })?;
        accounts.insert(key, user_id);
        Ok(())
    }

    async fn update_name(&self, user_id: Uuid, name: &str) -> Result<()> {
        self.with_user(user_id, |user| user.name = Some(name.to_string()))
    }

    async fn delete_name(&self, user_id: Uuid) -> Result<()> {
        self.with_user(user_id, |user| user.name = None)
    }

    async fn update_pronouns(&self, user_id: Uuid, pronouns: Pronouns) -> Result<()> {
        self.with_user(user_id, |user| user.pronouns = pronouns)
    }
}
