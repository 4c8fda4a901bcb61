use crate::error::RepositoryError;
use crate::models::OAuthState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Pending OAuth authorization requests
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save(&self, state: &OAuthState) -> Result<(), RepositoryError>;

    /// Look up a state without consuming it
    async fn find(&self, state: &str) -> Result<Option<OAuthState>, RepositoryError>;

    /// Remove and return a state in one step; a state can be taken once
    async fn take(&self, state: &str) -> Result<Option<OAuthState>, RepositoryError>;

    /// Drop every state created before `cutoff`, returning how many were removed
    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError>;

    async fn list(&self) -> Result<Vec<OAuthState>, RepositoryError>;
}

pub struct PgStateStore {
    pool: PgPool,
}

impl PgStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateStore for PgStateStore {
    async fn save(&self, state: &OAuthState) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO oauth_states (state, code_verifier, code_challenge, user_id, redirect_uri, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&state.state)
        .bind(&state.code_verifier)
        .bind(&state.code_challenge)
        .bind(&state.user_id)
        .bind(&state.redirect_uri)
        .bind(state.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, state: &str) -> Result<Option<OAuthState>, RepositoryError> {
        let found = sqlx::query_as::<_, OAuthState>("SELECT * FROM oauth_states WHERE state = $1")
            .bind(state)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found)
    }

    async fn take(&self, state: &str) -> Result<Option<OAuthState>, RepositoryError> {
        let taken = sqlx::query_as::<_, OAuthState>(
            "DELETE FROM oauth_states WHERE state = $1 RETURNING *",
        )
        .bind(state)
        .fetch_optional(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM oauth_states WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list(&self) -> Result<Vec<OAuthState>, RepositoryError> {
        let states =
            sqlx::query_as::<_, OAuthState>("SELECT * FROM oauth_states ORDER BY created_at ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(states)
    }
}

/// In-memory state store
#[derive(Default)]
pub struct InMemoryStateStore {
    states: Mutex<HashMap<String, OAuthState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn save(&self, state: &OAuthState) -> Result<(), RepositoryError> {
        let mut states = self.states.lock().await;
        if states.contains_key(&state.state) {
            return Err(RepositoryError::Duplicate("OAuth state already exists".to_string()));
        }
        states.insert(state.state.clone(), state.clone());
        Ok(())
    }

    async fn find(&self, state: &str) -> Result<Option<OAuthState>, RepositoryError> {
        Ok(self.states.lock().await.get(state).cloned())
    }

    async fn take(&self, state: &str) -> Result<Option<OAuthState>, RepositoryError> {
        Ok(self.states.lock().await.remove(state))
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut states = self.states.lock().await;
        let before = states.len();
        states.retain(|_, s| s.created_at >= cutoff);
        Ok((before - states.len()) as u64)
    }

    async fn list(&self) -> Result<Vec<OAuthState>, RepositoryError> {
        let mut states: Vec<OAuthState> = self.states.lock().await.values().cloned().collect();
        states.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(states)
    }
}
