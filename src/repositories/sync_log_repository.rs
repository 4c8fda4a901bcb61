use crate::error::RepositoryError;
use crate::models::SyncLog;
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Sync log data access
#[async_trait]
pub trait SyncLogRepository: Send + Sync {
    async fn create_many(&self, logs: &[SyncLog]) -> Result<(), RepositoryError>;

    async fn update(&self, log: &SyncLog) -> Result<(), RepositoryError>;

    async fn find_by_sync(
        &self,
        x_account_id: Uuid,
        sync_id: &str,
    ) -> Result<Vec<SyncLog>, RepositoryError>;

    /// Most recent logs of an account, newest first
    async fn latest_for_account(
        &self,
        x_account_id: Uuid,
        limit: u32,
    ) -> Result<Vec<SyncLog>, RepositoryError>;

    async fn list_for_accounts(
        &self,
        x_account_ids: &[Uuid],
    ) -> Result<Vec<SyncLog>, RepositoryError>;

    async fn delete_for_account(&self, x_account_id: Uuid) -> Result<u64, RepositoryError>;
}

pub struct PgSyncLogRepository {
    pool: PgPool,
}

impl PgSyncLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncLogRepository for PgSyncLogRepository {
    async fn create_many(&self, logs: &[SyncLog]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for log in logs {
            sqlx::query(
                r#"
                INSERT INTO x_account_sync_logs (
                    id, sync_id, x_account_id, sync_type, sync_status, started_at,
                    completed_at, records_processed, records_success, records_failed,
                    error_message
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(&log.id)
            .bind(&log.sync_id)
            .bind(log.x_account_id)
            .bind(&log.sync_type)
            .bind(&log.sync_status)
            .bind(log.started_at)
            .bind(log.completed_at)
            .bind(log.records_processed)
            .bind(log.records_success)
            .bind(log.records_failed)
            .bind(&log.error_message)
            .execute(&mut tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn update(&self, log: &SyncLog) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE x_account_sync_logs SET
                sync_status = $2, completed_at = $3, records_processed = $4,
                records_success = $5, records_failed = $6, error_message = $7
            WHERE id = $1
            "#,
        )
        .bind(&log.id)
        .bind(&log.sync_status)
        .bind(log.completed_at)
        .bind(log.records_processed)
        .bind(log.records_success)
        .bind(log.records_failed)
        .bind(&log.error_message)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Sync log {}", log.id)));
        }
        Ok(())
    }

    async fn find_by_sync(
        &self,
        x_account_id: Uuid,
        sync_id: &str,
    ) -> Result<Vec<SyncLog>, RepositoryError> {
        let logs = sqlx::query_as::<_, SyncLog>(
            r#"
            SELECT * FROM x_account_sync_logs
            WHERE x_account_id = $1 AND sync_id = $2
            ORDER BY started_at ASC, id ASC
            "#,
        )
        .bind(x_account_id)
        .bind(sync_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }

    async fn latest_for_account(
        &self,
        x_account_id: Uuid,
        limit: u32,
    ) -> Result<Vec<SyncLog>, RepositoryError> {
        let logs = sqlx::query_as::<_, SyncLog>(
            r#"
            SELECT * FROM x_account_sync_logs
            WHERE x_account_id = $1
            ORDER BY started_at DESC
            LIMIT $2
            "#,
        )
        .bind(x_account_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }

    async fn list_for_accounts(
        &self,
        x_account_ids: &[Uuid],
    ) -> Result<Vec<SyncLog>, RepositoryError> {
        let logs = sqlx::query_as::<_, SyncLog>(
            "SELECT * FROM x_account_sync_logs WHERE x_account_id = ANY($1)",
        )
        .bind(x_account_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }

    async fn delete_for_account(&self, x_account_id: Uuid) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM x_account_sync_logs WHERE x_account_id = $1")
            .bind(x_account_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// In-memory sync log store keyed by log id
#[derive(Default)]
pub struct InMemorySyncLogRepository {
    logs: RwLock<HashMap<String, SyncLog>>,
}

impl InMemorySyncLogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncLogRepository for InMemorySyncLogRepository {
    async fn create_many(&self, logs: &[SyncLog]) -> Result<(), RepositoryError> {
        let mut store = self.logs.write().await;
        if let Some(dup) = logs.iter().find(|l| store.contains_key(&l.id)) {
            return Err(RepositoryError::Duplicate(format!("Sync log {}", dup.id)));
        }
        for log in logs {
            store.insert(log.id.clone(), log.clone());
        }
        Ok(())
    }

    async fn update(&self, log: &SyncLog) -> Result<(), RepositoryError> {
        let mut store = self.logs.write().await;
        match store.get_mut(&log.id) {
            Some(slot) => {
                *slot = log.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("Sync log {}", log.id))),
        }
    }

    async fn find_by_sync(
        &self,
        x_account_id: Uuid,
        sync_id: &str,
    ) -> Result<Vec<SyncLog>, RepositoryError> {
        let mut logs: Vec<SyncLog> = self
            .logs
            .read()
            .await
            .values()
            .filter(|l| l.x_account_id == x_account_id && l.sync_id == sync_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        Ok(logs)
    }

    async fn latest_for_account(
        &self,
        x_account_id: Uuid,
        limit: u32,
    ) -> Result<Vec<SyncLog>, RepositoryError> {
        let mut logs: Vec<SyncLog> = self
            .logs
            .read()
            .await
            .values()
            .filter(|l| l.x_account_id == x_account_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        logs.truncate(limit as usize);
        Ok(logs)
    }

    async fn list_for_accounts(
        &self,
        x_account_ids: &[Uuid],
    ) -> Result<Vec<SyncLog>, RepositoryError> {
        Ok(self
            .logs
            .read()
            .await
            .values()
            .filter(|l| x_account_ids.contains(&l.x_account_id))
            .cloned()
            .collect())
    }

    async fn delete_for_account(&self, x_account_id: Uuid) -> Result<u64, RepositoryError> {
        let mut store = self.logs.write().await;
        let before = store.len();
        store.retain(|_, l| l.x_account_id != x_account_id);
        Ok((before - store.len()) as u64)
    }
}
