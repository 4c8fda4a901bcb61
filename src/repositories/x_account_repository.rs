use crate::error::RepositoryError;
use crate::models::{BindingStatus, XAccount};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// X account binding data access
#[async_trait]
pub trait XAccountRepository: Send + Sync {
    /// Insert a binding; the same X user twice for one owner is a duplicate
    async fn create(&self, account: &XAccount) -> Result<XAccount, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<XAccount>, RepositoryError>;

    /// Find a binding only if `user_id` owns it
    async fn find_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<XAccount>, RepositoryError>;

    async fn find_by_x_user_id(&self, x_user_id: &str)
        -> Result<Option<XAccount>, RepositoryError>;

    /// One page of a user's bindings plus the unpaged total, primary first then newest
    async fn list_by_user(
        &self,
        user_id: Uuid,
        status: Option<BindingStatus>,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<XAccount>, i64), RepositoryError>;

    async fn all_for_user(&self, user_id: Uuid) -> Result<Vec<XAccount>, RepositoryError>;

    /// Persist every mutable field and bump `updated_at`
    async fn update(&self, account: &XAccount) -> Result<XAccount, RepositoryError>;

    /// Unset the primary flag on all of a user's bindings
    async fn clear_primary(&self, user_id: Uuid) -> Result<u64, RepositoryError>;

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError>;
}

fn offset(page: u32, limit: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(limit)
}

pub struct PgXAccountRepository {
    pool: PgPool,
}

impl PgXAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl XAccountRepository for PgXAccountRepository {
    async fn create(&self, account: &XAccount) -> Result<XAccount, RepositoryError> {
        let created = sqlx::query_as::<_, XAccount>(
            r#"
            INSERT INTO x_accounts (
                id, user_id, x_user_id, username, display_name, email, avatar_url, bio,
                location, website, verified, followers_count, following_count, tweets_count,
                listed_count, account_created_at, access_token, refresh_token, token_expires_at,
                scope, is_active, is_primary, binding_status, last_sync_at, last_error,
                auto_grow_enabled, auto_grow_settings, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29)
            RETURNING *
            "#,
        )
        .bind(account.id)
        .bind(account.user_id)
        .bind(&account.x_user_id)
        .bind(&account.username)
        .bind(&account.display_name)
        .bind(&account.email)
        .bind(&account.avatar_url)
        .bind(&account.bio)
        .bind(&account.location)
        .bind(&account.website)
        .bind(account.verified)
        .bind(account.followers_count)
        .bind(account.following_count)
        .bind(account.tweets_count)
        .bind(account.listed_count)
        .bind(account.account_created_at)
        .bind(&account.access_token)
        .bind(&account.refresh_token)
        .bind(account.token_expires_at)
        .bind(&account.scope)
        .bind(account.is_active)
        .bind(account.is_primary)
        .bind(&account.binding_status)
        .bind(account.last_sync_at)
        .bind(&account.last_error)
        .bind(account.auto_grow_enabled)
        .bind(&account.auto_grow_settings)
        .bind(account.created_at)
        .bind(account.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<XAccount>, RepositoryError> {
        let account = sqlx::query_as::<_, XAccount>("SELECT * FROM x_accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn find_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<XAccount>, RepositoryError> {
        let account = sqlx::query_as::<_, XAccount>(
            "SELECT * FROM x_accounts WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn find_by_x_user_id(
        &self,
        x_user_id: &str,
    ) -> Result<Option<XAccount>, RepositoryError> {
        let account = sqlx::query_as::<_, XAccount>(
            "SELECT * FROM x_accounts WHERE x_user_id = $1 ORDER BY created_at ASC LIMIT 1",
        )
        .bind(x_user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        status: Option<BindingStatus>,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<XAccount>, i64), RepositoryError> {
        let status = status.map(|s| s.as_str());

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM x_accounts
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR binding_status = $2)
            "#,
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, XAccount>(
            r#"
            SELECT * FROM x_accounts
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR binding_status = $2)
            ORDER BY is_primary DESC, created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(status)
        .bind(i64::from(limit))
        .bind(offset(page, limit))
        .fetch_all(&self.pool)
        .await?;

        Ok((rows, total))
    }

    async fn all_for_user(&self, user_id: Uuid) -> Result<Vec<XAccount>, RepositoryError> {
        let rows = sqlx::query_as::<_, XAccount>(
            "SELECT * FROM x_accounts WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update(&self, account: &XAccount) -> Result<XAccount, RepositoryError> {
        let updated = sqlx::query_as::<_, XAccount>(
            r#"
            UPDATE x_accounts SET
                username = $2, display_name = $3, email = $4, avatar_url = $5, bio = $6,
                location = $7, website = $8, verified = $9, followers_count = $10,
                following_count = $11, tweets_count = $12, listed_count = $13,
                account_created_at = $14, access_token = $15, refresh_token = $16,
                token_expires_at = $17, scope = $18, is_active = $19, is_primary = $20,
                binding_status = $21, last_sync_at = $22, last_error = $23,
                auto_grow_enabled = $24, auto_grow_settings = $25, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(account.id)
        .bind(&account.username)
        .bind(&account.display_name)
        .bind(&account.email)
        .bind(&account.avatar_url)
        .bind(&account.bio)
        .bind(&account.location)
        .bind(&account.website)
        .bind(account.verified)
        .bind(account.followers_count)
        .bind(account.following_count)
        .bind(account.tweets_count)
        .bind(account.listed_count)
        .bind(account.account_created_at)
        .bind(&account.access_token)
        .bind(&account.refresh_token)
        .bind(account.token_expires_at)
        .bind(&account.scope)
        .bind(account.is_active)
        .bind(account.is_primary)
        .bind(&account.binding_status)
        .bind(account.last_sync_at)
        .bind(&account.last_error)
        .bind(account.auto_grow_enabled)
        .bind(&account.auto_grow_settings)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| RepositoryError::NotFound(format!("X account {}", account.id)))
    }

    async fn clear_primary(&self, user_id: Uuid) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE x_accounts SET is_primary = FALSE, updated_at = NOW() WHERE user_id = $1 AND is_primary",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM x_accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// In-memory binding store
#[derive(Default)]
pub struct InMemoryXAccountRepository {
    accounts: RwLock<HashMap<Uuid, XAccount>>,
}

impl InMemoryXAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_for_listing(rows: &mut [XAccount]) {
    rows.sort_by(|a, b| {
        b.is_primary
            .cmp(&a.is_primary)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

#[async_trait]
impl XAccountRepository for InMemoryXAccountRepository {
    async fn create(&self, account: &XAccount) -> Result<XAccount, RepositoryError> {
        let mut accounts = self.accounts.write().await;
        if accounts
            .values()
            .any(|a| a.user_id == account.user_id && a.x_user_id == account.x_user_id)
        {
            return Err(RepositoryError::Duplicate(format!(
                "X user {} is already bound",
                account.x_user_id
            )));
        }
        if account.is_primary
            && accounts
                .values()
                .any(|a| a.user_id == account.user_id && a.is_primary)
        {
            return Err(RepositoryError::ConstraintViolation(
                "User already has a primary account".to_string(),
            ));
        }
        accounts.insert(account.id, account.clone());
        Ok(account.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<XAccount>, RepositoryError> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn find_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<XAccount>, RepositoryError> {
        Ok(self
            .accounts
            .read()
            .await
            .get(&id)
            .filter(|a| a.user_id == user_id)
            .cloned())
    }

    async fn find_by_x_user_id(
        &self,
        x_user_id: &str,
    ) -> Result<Option<XAccount>, RepositoryError> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .filter(|a| a.x_user_id == x_user_id)
            .min_by_key(|a| a.created_at)
            .cloned())
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        status: Option<BindingStatus>,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<XAccount>, i64), RepositoryError> {
        let mut rows: Vec<XAccount> = self
            .accounts
            .read()
            .await
            .values()
            .filter(|a| a.user_id == user_id)
            .filter(|a| status.map(|s| a.status() == s).unwrap_or(true))
            .cloned()
            .collect();
        sort_for_listing(&mut rows);

        let total = rows.len() as i64;
        let page_rows = rows
            .into_iter()
            .skip(offset(page, limit) as usize)
            .take(limit as usize)
            .collect();
        Ok((page_rows, total))
    }

    async fn all_for_user(&self, user_id: Uuid) -> Result<Vec<XAccount>, RepositoryError> {
        let mut rows: Vec<XAccount> = self
            .accounts
            .read()
            .await
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn update(&self, account: &XAccount) -> Result<XAccount, RepositoryError> {
        let mut accounts = self.accounts.write().await;
        if account.is_primary
            && accounts
                .values()
                .any(|a| a.user_id == account.user_id && a.is_primary && a.id != account.id)
        {
            return Err(RepositoryError::ConstraintViolation(
                "User already has a primary account".to_string(),
            ));
        }
        let slot = accounts
            .get_mut(&account.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("X account {}", account.id)))?;
        let created_at = slot.created_at;
        *slot = account.clone();
        slot.created_at = created_at;
        slot.updated_at = Utc::now();
        Ok(slot.clone())
    }

    async fn clear_primary(&self, user_id: Uuid) -> Result<u64, RepositoryError> {
        let mut cleared = 0;
        for account in self.accounts.write().await.values_mut() {
            if account.user_id == user_id && account.is_primary {
                account.is_primary = false;
                account.updated_at = Utc::now();
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.accounts.write().await.remove(&id).is_some())
    }
}
