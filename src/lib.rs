//! Social Automation Backend Library
//!
//! User accounts, X (Twitter) account binding over OAuth 2.0 + PKCE, and a
//! proxy to the Twitter analysis service. Exposed for the binary and tests.

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod oauth;
pub mod repositories;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use routes::router;

use database::Database;
use oauth::XOAuthFlowManager;
use repositories::*;
use services::{AnalysisClient, UserService, XAccountService, XApiClient};
use std::sync::Arc;

/// Application state shared by every request handler
pub struct AppState {
    pub config: AppConfig,
    /// `None` when running on in-memory storage
    pub database: Option<Database>,
    pub users: Arc<dyn UserRepository>,
    pub wallets: Arc<dyn WalletRepository>,
    pub x_accounts: Arc<dyn XAccountRepository>,
    pub sync_logs: Arc<dyn SyncLogRepository>,
    pub states: Arc<dyn StateStore>,
    pub oauth: Arc<XOAuthFlowManager>,
    pub x_api: Arc<XApiClient>,
    pub analysis: Arc<AnalysisClient>,
    pub user_service: Arc<UserService>,
    pub x_account_service: Arc<XAccountService>,
}

impl AppState {
    /// State backed by in-memory repositories
    pub fn in_memory(config: AppConfig) -> AppResult<Self> {
        Self::assemble(
            config,
            None,
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(InMemoryWalletRepository::new()),
            Arc::new(InMemoryXAccountRepository::new()),
            Arc::new(InMemorySyncLogRepository::new()),
            Arc::new(InMemoryStateStore::new()),
        )
    }

    /// State backed by PostgreSQL repositories
    pub fn postgres(pool: sqlx::PgPool, config: AppConfig) -> AppResult<Self> {
        Self::assemble(
            config,
            Some(Database::new(pool.clone())),
            Arc::new(PgUserRepository::new(pool.clone())),
            Arc::new(PgWalletRepository::new(pool.clone())),
            Arc::new(PgXAccountRepository::new(pool.clone())),
            Arc::new(PgSyncLogRepository::new(pool.clone())),
            Arc::new(PgStateStore::new(pool)),
        )
    }

    fn assemble(
        config: AppConfig,
        database: Option<Database>,
        users: Arc<dyn UserRepository>,
        wallets: Arc<dyn WalletRepository>,
        x_accounts: Arc<dyn XAccountRepository>,
        sync_logs: Arc<dyn SyncLogRepository>,
        states: Arc<dyn StateStore>,
    ) -> AppResult<Self> {
        let oauth = Arc::new(XOAuthFlowManager::new(
            config.x_oauth.clone(),
            states.clone(),
        ));
        let x_api = Arc::new(XApiClient::new(config.x_oauth.api_base_url.clone()));
        let analysis = Arc::new(AnalysisClient::new(&config.analysis)?);

        let user_service = Arc::new(UserService::new(
            users.clone(),
            wallets.clone(),
            config.auth.clone(),
        ));
        let x_account_service = Arc::new(XAccountService::new(
            x_accounts.clone(),
            sync_logs.clone(),
            oauth.clone(),
            x_api.clone(),
        ));

        Ok(Self {
            config,
            database,
            users,
            wallets,
            x_accounts,
            sync_logs,
            states,
            oauth,
            x_api,
            analysis,
            user_service,
            x_account_service,
        })
    }
}
