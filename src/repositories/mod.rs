//! Storage seams. Each repository is a trait with a PostgreSQL implementation
//! and an in-memory one used when no database is configured.

pub mod oauth_state_repository;
pub mod sync_log_repository;
pub mod user_repository;
pub mod wallet_repository;
pub mod x_account_repository;

// Re-export all repositories for convenient access
pub use oauth_state_repository::{InMemoryStateStore, PgStateStore, StateStore};
pub use sync_log_repository::{InMemorySyncLogRepository, PgSyncLogRepository, SyncLogRepository};
pub use user_repository::{InMemoryUserRepository, PgUserRepository, UserRepository};
pub use wallet_repository::{InMemoryWalletRepository, PgWalletRepository, WalletRepository};
pub use x_account_repository::{
    InMemoryXAccountRepository, PgXAccountRepository, XAccountRepository,
};
