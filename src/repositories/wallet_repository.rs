use crate::error::RepositoryError;
use crate::models::Wallet;
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Wallet data access; one wallet per user
#[async_trait]
pub trait WalletRepository: Send + Sync {
    async fn create(&self, wallet: &Wallet) -> Result<Wallet, RepositoryError>;

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Wallet>, RepositoryError>;
}

pub struct PgWalletRepository {
    pool: PgPool,
}

impl PgWalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WalletRepository for PgWalletRepository {
    async fn create(&self, wallet: &Wallet) -> Result<Wallet, RepositoryError> {
        let created = sqlx::query_as::<_, Wallet>(
            r#"
            INSERT INTO wallets (id, user_id, balance, currency, address, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(wallet.id)
        .bind(wallet.user_id)
        .bind(wallet.balance)
        .bind(&wallet.currency)
        .bind(&wallet.address)
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Wallet>, RepositoryError> {
        let wallet = sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(wallet)
    }
}

/// In-memory wallet repository keyed by owner
#[derive(Default)]
pub struct InMemoryWalletRepository {
    wallets: RwLock<HashMap<Uuid, Wallet>>,
}

impl InMemoryWalletRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletRepository for InMemoryWalletRepository {
    async fn create(&self, wallet: &Wallet) -> Result<Wallet, RepositoryError> {
        let mut wallets = self.wallets.write().await;
        if wallets.contains_key(&wallet.user_id) {
            return Err(RepositoryError::Duplicate(format!(
                "Wallet for user {} already exists",
                wallet.user_id
            )));
        }
        wallets.insert(wallet.user_id, wallet.clone());
        Ok(wallet.clone())
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Wallet>, RepositoryError> {
        Ok(self.wallets.read().await.get(&user_id).cloned())
    }
}
