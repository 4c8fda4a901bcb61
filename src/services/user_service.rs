use crate::auth::{hash_password, issue_session, verify_password};
use crate::config::AuthConfig;
use crate::error::{option_to_result, AppError, AppResult};
use crate::models::{User, Wallet};
use crate::repositories::{UserRepository, WalletRepository};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 8;

/// A freshly registered user with their wallet and first session
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    pub wallet: Wallet,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Registration, login and session lookups
pub struct UserService {
    users: Arc<dyn UserRepository>,
    wallets: Arc<dyn WalletRepository>,
    auth: AuthConfig,
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .map(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
            .unwrap_or(false)
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        wallets: Arc<dyn WalletRepository>,
        auth: AuthConfig,
    ) -> Self {
        Self {
            users,
            wallets,
            auth,
        }
    }

    /// Create a user and their wallet, then open a session
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> AppResult<Registration> {
        let email = email.trim().to_lowercase();
        let first_name = first_name.trim();
        let last_name = last_name.trim();

        if email.is_empty() || password.is_empty() || first_name.is_empty() || last_name.is_empty()
        {
            return Err(AppError::Validation("All fields are required".to_string()));
        }
        if !is_valid_email(&email) {
            return Err(AppError::Validation("Invalid email format".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }

        let user = User::new(
            email,
            hash_password(password)?,
            first_name.to_string(),
            last_name.to_string(),
        );
        let user = self.users.create(&user).await?;
        let wallet = self.wallets.create(&Wallet::new(user.id)).await?;
        let (token, expires_at) = issue_session(&self.auth, &user)?;

        info!("Registered user {} with wallet {}", user.id, wallet.address);

        Ok(Registration {
            user,
            wallet,
            token,
            expires_at,
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<Session> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let invalid = || AppError::Unauthorized("Invalid email or password".to_string());
        let user = self.users.find_by_email(&email).await?.ok_or_else(invalid)?;
        if !verify_password(password, &user.password_hash)? {
            return Err(invalid());
        }
        if !user.is_active {
            return Err(AppError::Forbidden("Account is disabled".to_string()));
        }

        let (token, expires_at) = issue_session(&self.auth, &user)?;
        info!("User {} logged in", user.id);

        Ok(Session {
            user,
            token,
            expires_at,
        })
    }

    pub async fn current_user(&self, user_id: Uuid) -> AppResult<User> {
        option_to_result(self.users.find_by_id(user_id).await?, "User not found")
    }

    pub async fn wallet(&self, user_id: Uuid) -> AppResult<Wallet> {
        option_to_result(self.wallets.find_by_user(user_id).await?, "Wallet not found")
    }
}
