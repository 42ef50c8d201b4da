//! `SQLx` `PostgreSQL` storage implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{Error, Result, StorageError},
    models::{ExternalAccount, Pronouns, User},
    storage::{account_taken, UserStorage},
};

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

/// `SQLx` `PostgreSQL` storage backend.
#[derive(Debug, Clone)]
pub struct SqlxStorage {
    pool: PgPool,
}

impl SqlxStorage {
    /// Create a new `SQLx` storage with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///    - Returns `StorageError` if migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.into()))?;
        Ok(())
    }

    async fn load_accounts(&self, user_id: Uuid) -> Result<Vec<ExternalAccount>> {
        let rows = sqlx::query_as::<_, AccountRow>(
            r"
            SELECT platform, account_id, account_name
            FROM linked_accounts
            WHERE user_id = $1
            ORDER BY linked_at
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(rows.into_iter().map(ExternalAccount::from).collect())
    }

    async fn hydrate(&self, row: Option<UserRow>) -> Result<Option<User>> {
        match row {
            Some(row) => {
                let accounts = self.load_accounts(row.id).await?;
                Ok(Some(User {
                    id: row.id,
                    name: row.name,
                    pronouns: row.pronouns,
                    accounts,
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                }))
            }
            None => Ok(None),
        }
    }

    async fn update_user(&self, user_id: Uuid, query: PgQuery<'_>) -> Result<()> {
        let result = query
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::UserNotFound(user_id));
        }
        Ok(())
    }
}

/// Maps a unique violation on `linked_accounts` to [`StorageError::AccountTaken`].
fn map_link_error(err: sqlx::Error, account: &ExternalAccount) -> Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => account_taken(account).into(),
        _ => StorageError::Database(err).into(),
    }
}

#[async_trait]
impl UserStorage for SqlxStorage {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, name, pronouns, created_at, updated_at
            FROM users
            WHERE id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        self.hydrate(row).await
    }

    async fn find_user_by_account(
        &self,
        platform: &str,
        account_id: &str,
    ) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT u.id, u.name, u.pronouns, u.created_at, u.updated_at
            FROM users u
            JOIN linked_accounts a ON a.user_id = u.id
            WHERE a.platform = $1 AND a.account_id = $2
            ",
        )
        .bind(platform)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        self.hydrate(row).await
    }

    async fn create_user(&self, account: &ExternalAccount) -> Result<User> {
        let user = User::new(account.clone());
        let mut tx = self.pool.begin().await.map_err(StorageError::Database)?;

        sqlx::query(
            r"
            INSERT INTO users (id, name, pronouns, created_at, updated_at)
            VALUES ($1, NULL, $2, $3, $3)
            ",
        )
        .bind(user.id)
        .bind(user.pronouns)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await
        .map_err(StorageError::Database)?;

        sqlx::query(
            r"
            INSERT INTO linked_accounts (platform, account_id, account_name, user_id)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&account.platform)
        .bind(&account.id)
        .bind(&account.name)
        .bind(user.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_link_error(e, account))?;

        tx.commit().await.map_err(StorageError::Database)?;
        Ok(user)
    }

    async fn link_account(&self, user_id: Uuid, account: &ExternalAccount) -> Result<()> {
        // The conditional update leaves rows owned by other users untouched,
        // which then surfaces as zero affected rows.
        let result = sqlx::query(
            r"
            INSERT INTO linked_accounts (platform, account_id, account_name, user_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (platform, account_id) DO UPDATE SET
                account_name = EXCLUDED.account_name
            WHERE linked_accounts.user_id = EXCLUDED.user_id
            ",
        )
        .bind(&account.platform)
        .bind(&account.id)
        .bind(&account.name)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_link_error(e, account))?;

        if result.rows_affected() == 0 {
            return Err(account_taken(account).into());
        }
        Ok(())
    }

    async fn update_name(&self, user_id: Uuid, name: &str) -> Result<()> {
        self.update_user(
            user_id,
            sqlx::query("UPDATE users SET name = $2, updated_at = NOW() WHERE id = $1")
                .bind(user_id)
                .bind(name),
        )
        .await
    }

    async fn delete_name(&self, user_id: Uuid) -> Result<()> {
        self.update_user(
            user_id,
            sqlx::query("UPDATE users SET name = NULL, updated_at = NOW() WHERE id = $1")
                .bind(user_id),
        )
        .await
    }

    async fn update_pronouns(&self, user_id: Uuid, pronouns: Pronouns) -> Result<()> {
        self.update_user(
            user_id,
            sqlx::query("UPDATE users SET pronouns = $2, updated_at = NOW() WHERE id = $1")
                .bind(user_id)
                .bind(pronouns),
        )
        .await
    }
}

/// Internal row type for `SQLx` queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: Option<String>,
    pronouns: Pronouns,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    platform: String,
    account_id: String,
    account_name: String,
}

impl From<AccountRow> for ExternalAccount {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.account_id,
            name: row.account_name,
            platform: row.platform,
        }
    }
}
