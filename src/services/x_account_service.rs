use super::x_api_client::{XApiClient, XUserProfile};
use crate::error::{option_to_result, AppError, AppResult};
use crate::models::oauth_state::redact;
use crate::models::{
    AutoGrowSettingsPatch, BindingStatus, SyncLog, SyncStatus, SyncType, XAccount, XAccountDetail,
    XAccountInfo,
};
use crate::oauth::{XOAuthFlowManager, XOAuthTokens};
use crate::repositories::{SyncLogRepository, XAccountRepository};
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;
const DETAIL_SYNC_LOGS: u32 = 10;
const SYNC_FETCH_LIMIT: u32 = 100;

/// Options chosen by the user when completing an authorization
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BindPreferences {
    pub is_primary: Option<bool>,
    pub auto_grow_enabled: Option<bool>,
    pub auto_grow_settings: Option<AutoGrowSettingsPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountUpdate {
    pub is_primary: Option<bool>,
    pub auto_grow_enabled: Option<bool>,
    pub auto_grow_settings: Option<AutoGrowSettingsPatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountPage {
    pub accounts: Vec<XAccountInfo>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusBreakdown {
    pub pending: u64,
    pub active: u64,
    pub expired: u64,
    pub error: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XAccountStats {
    pub total_accounts: u64,
    pub active_accounts: u64,
    pub primary_accounts: u64,
    pub total_followers: i64,
    pub total_following: i64,
    pub total_tweets: i64,
    pub accounts_by_status: StatusBreakdown,
    pub accounts_growth_today: u64,
    pub sync_success_rate: f64,
    pub last_sync_time: Option<DateTime<Utc>>,
}

/// Aggregate a user's bindings and their sync history
pub fn compute_stats(accounts: &[XAccount], logs: &[SyncLog], now: DateTime<Utc>) -> XAccountStats {
    let mut by_status = StatusBreakdown::default();
    for account in accounts {
        match account.status() {
            BindingStatus::Pending => by_status.pending += 1,
            BindingStatus::Active => by_status.active += 1,
            BindingStatus::Expired => by_status.expired += 1,
            BindingStatus::Error => by_status.error += 1,
        }
    }

    let midnight = now.date_naive().and_hms_opt(0, 0, 0).map(|t| t.and_utc());
    let finished = logs.iter().filter(|l| l.status().is_finished()).count();
    let completed = logs
        .iter()
        .filter(|l| l.status() == SyncStatus::Completed)
        .count();
    let sync_success_rate = if finished == 0 {
        100.0
    } else {
        completed as f64 / finished as f64 * 100.0
    };

    XAccountStats {
        total_accounts: accounts.len() as u64,
        active_accounts: accounts
            .iter()
            .filter(|a| a.is_active && a.status() == BindingStatus::Active)
            .count() as u64,
        primary_accounts: accounts.iter().filter(|a| a.is_primary).count() as u64,
        total_followers: accounts.iter().map(|a| a.followers_count).sum(),
        total_following: accounts.iter().map(|a| a.following_count).sum(),
        total_tweets: accounts.iter().map(|a| a.tweets_count).sum(),
        accounts_by_status: by_status,
        accounts_growth_today: accounts
            .iter()
            .filter(|a| midnight.map(|m| a.created_at >= m).unwrap_or(false))
            .count() as u64,
        sync_success_rate,
        last_sync_time: accounts.iter().filter_map(|a| a.last_sync_at).max(),
    }
}

fn apply_profile(account: &mut XAccount, profile: &XUserProfile) {
    account.username = profile.username.clone();
    account.display_name = profile.name.clone();
    account.avatar_url = profile.profile_image_url.clone();
    account.bio = profile.description.clone();
    account.location = profile.location.clone();
    account.website = profile.url.clone();
    account.verified = profile.verified;
    account.followers_count = profile.public_metrics.followers_count;
    account.following_count = profile.public_metrics.following_count;
    account.tweets_count = profile.public_metrics.tweet_count;
    account.listed_count = profile.public_metrics.listed_count;
    if profile.created_at.is_some() {
        account.account_created_at = profile.created_at;
    }
}

fn apply_tokens(account: &mut XAccount, tokens: &XOAuthTokens, now: DateTime<Utc>) {
    account.access_token = tokens.access_token.clone();
    if tokens.refresh_token.is_some() {
        account.refresh_token = tokens.refresh_token.clone();
    }
    account.token_expires_at = if tokens.expires_in > 0 {
        Some(now + Duration::seconds(tokens.expires_in))
    } else {
        None
    };
    if !tokens.scope.is_empty() {
        account.scope = tokens.scope.clone();
    }
}

fn new_sync_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("sync-{}-{}", Utc::now().timestamp_millis(), suffix)
}

const ACCOUNT_NOT_FOUND: &str = "Account not found or permission denied";

/// Binding lifecycle, statistics and profile sync for X accounts
#[derive(Clone)]
pub struct XAccountService {
    accounts: Arc<dyn XAccountRepository>,
    sync_logs: Arc<dyn SyncLogRepository>,
    oauth: Arc<XOAuthFlowManager>,
    x_api: Arc<XApiClient>,
}

impl XAccountService {
    pub fn new(
        accounts: Arc<dyn XAccountRepository>,
        sync_logs: Arc<dyn SyncLogRepository>,
        oauth: Arc<XOAuthFlowManager>,
        x_api: Arc<XApiClient>,
    ) -> Self {
        Self {
            accounts,
            sync_logs,
            oauth,
            x_api,
        }
    }

    async fn owned(&self, user_id: Uuid, id: Uuid) -> AppResult<XAccount> {
        option_to_result(
            self.accounts.find_for_user(id, user_id).await?,
            ACCOUNT_NOT_FOUND,
        )
    }

    /// Store (or re-bind) the X account behind `tokens` for `user_id`
    pub async fn bind(
        &self,
        user_id: Uuid,
        tokens: &XOAuthTokens,
        preferences: BindPreferences,
    ) -> AppResult<XAccount> {
        let profile = self.x_api.get_me(&tokens.access_token).await?;
        let now = Utc::now();

        let existing = self.accounts.find_by_x_user_id(&profile.id).await?;
        if let Some(other) = existing.as_ref().filter(|a| a.user_id != user_id) {
            warn!(
                "X user {} already bound to user {}, rejecting bind for {}",
                profile.id, other.user_id, user_id
            );
            return Err(AppError::Conflict(
                "This X account is already bound to another user".to_string(),
            ));
        }

        let is_new = existing.is_none();
        let mut account = existing.unwrap_or_else(|| {
            XAccount::new(
                user_id,
                profile.id.clone(),
                profile.username.clone(),
                profile.name.clone(),
                tokens.access_token.clone(),
                tokens.scope.clone(),
            )
        });

        apply_profile(&mut account, &profile);
        apply_tokens(&mut account, tokens, now);
        account.set_status(BindingStatus::Active);
        account.is_active = true;
        account.last_sync_at = Some(now);
        account.last_error = None;

        if let Some(enabled) = preferences.auto_grow_enabled {
            account.auto_grow_enabled = enabled;
        }
        if let Some(patch) = preferences.auto_grow_settings {
            account.auto_grow_settings.0.apply(patch);
        }
        match preferences.is_primary {
            Some(true) => {
                self.accounts.clear_primary(user_id).await?;
                account.is_primary = true;
            }
            Some(false) => account.is_primary = false,
            None => {}
        }

        let account = if is_new {
            self.accounts.create(&account).await?
        } else {
            self.accounts.update(&account).await?
        };

        info!(
            "Bound X account @{} ({}) to user {} (token: {})",
            account.username,
            account.x_user_id,
            user_id,
            redact(&account.access_token)
        );
        Ok(account)
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        status: Option<&str>,
        page: u32,
        limit: u32,
    ) -> AppResult<AccountPage> {
        if page < 1 {
            return Err(AppError::Validation("page must be at least 1".to_string()));
        }
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }
        let status = status
            .filter(|s| !s.trim().is_empty())
            .map(BindingStatus::from_str)
            .transpose()
            .map_err(AppError::Validation)?;

        let (rows, total) = self
            .accounts
            .list_by_user(user_id, status, page, limit)
            .await?;

        Ok(AccountPage {
            accounts: rows.iter().map(XAccount::info).collect(),
            total,
            page,
            limit,
        })
    }

    pub async fn detail(&self, user_id: Uuid, id: Uuid) -> AppResult<XAccountDetail> {
        let account = self.owned(user_id, id).await?;
        let logs = self
            .sync_logs
            .latest_for_account(account.id, DETAIL_SYNC_LOGS)
            .await?;
        Ok(account.detail(logs))
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        changes: AccountUpdate,
    ) -> AppResult<XAccountDetail> {
        let mut account = self.owned(user_id, id).await?;

        match changes.is_primary {
            Some(true) if !account.is_primary => {
                self.accounts.clear_primary(user_id).await?;
                account.is_primary = true;
            }
            Some(false) => account.is_primary = false,
            _ => {}
        }
        if let Some(enabled) = changes.auto_grow_enabled {
            account.auto_grow_enabled = enabled;
        }
        if let Some(patch) = changes.auto_grow_settings {
            account.auto_grow_settings.0.apply(patch);
        }

        let account = self.accounts.update(&account).await?;
        info!("Updated X account {} for user {}", account.id, user_id);

        let logs = self
            .sync_logs
            .latest_for_account(account.id, DETAIL_SYNC_LOGS)
            .await?;
        Ok(account.detail(logs))
    }

    /// Remove a binding after the caller confirms its username
    pub async fn unbind(&self, user_id: Uuid, id: Uuid, confirm_username: &str) -> AppResult<()> {
        let account = self.owned(user_id, id).await?;

        let confirm = confirm_username.trim();
        let confirm = confirm.strip_prefix('@').unwrap_or(confirm);
        if !confirm.eq_ignore_ascii_case(&account.username) {
            return Err(AppError::Validation(
                "Username confirmation does not match".to_string(),
            ));
        }

        let logs = self.sync_logs.delete_for_account(account.id).await?;
        self.accounts.delete(account.id).await?;
        info!(
            "Unbound X account @{} from user {} ({} sync logs removed)",
            account.username, user_id, logs
        );

        if let Err(e) = self.oauth.revoke_token(&account.access_token).await {
            warn!(
                "Failed to revoke token {} for @{}: {}",
                redact(&account.access_token),
                account.username,
                e
            );
        }
        Ok(())
    }

    pub async fn stats(&self, user_id: Uuid) -> AppResult<XAccountStats> {
        let accounts = self.accounts.all_for_user(user_id).await?;
        let ids: Vec<Uuid> = accounts.iter().map(|a| a.id).collect();
        let logs = if ids.is_empty() {
            Vec::new()
        } else {
            self.sync_logs.list_for_accounts(&ids).await?
        };
        Ok(compute_stats(&accounts, &logs, Utc::now()))
    }

    /// Refresh a binding's tokens with its stored refresh token
    pub async fn refresh_tokens(&self, user_id: Uuid, id: Uuid) -> AppResult<XOAuthTokens> {
        let account = self.owned(user_id, id).await?;
        let refresh_token = account
            .refresh_token
            .clone()
            .ok_or_else(|| AppError::Validation("No refresh token available".to_string()))?;

        self.refresh_account(account, &refresh_token).await
    }

    /// Refresh with a caller-supplied token, storing the result on an owned binding if given
    pub async fn refresh_with_token(
        &self,
        user_id: Uuid,
        refresh_token: &str,
        account_id: Option<Uuid>,
    ) -> AppResult<XOAuthTokens> {
        match account_id {
            Some(id) => {
                let account = self.owned(user_id, id).await?;
                self.refresh_account(account, refresh_token).await
            }
            None => self
                .oauth
                .refresh_access_token(refresh_token)
                .await
                .map_err(|e| {
                    warn!("Token refresh failed for user {}: {}", user_id, e);
                    AppError::Unauthorized(
                        "Token refresh failed, re-authorization required".to_string(),
                    )
                }),
        }
    }

    async fn refresh_account(
        &self,
        mut account: XAccount,
        refresh_token: &str,
    ) -> AppResult<XOAuthTokens> {
        match self.oauth.refresh_access_token(refresh_token).await {
            Ok(tokens) => {
                apply_tokens(&mut account, &tokens, Utc::now());
                account.set_status(BindingStatus::Active);
                account.last_error = None;
                self.accounts.update(&account).await?;
                info!("Refreshed tokens for X account @{}", account.username);
                Ok(tokens)
            }
            Err(e) => {
                warn!("Token refresh failed for @{}: {}", account.username, e);
                account.set_status(BindingStatus::Expired);
                account.last_error = Some(e.to_string());
                self.accounts.update(&account).await?;
                Err(AppError::Unauthorized(
                    "Token refresh failed, re-authorization required".to_string(),
                ))
            }
        }
    }

    /// Record pending logs for the requested types and sync them in the background
    pub async fn start_sync(
        &self,
        user_id: Uuid,
        id: Uuid,
        sync_types: Option<Vec<String>>,
        force: bool,
    ) -> AppResult<String> {
        let mut account = self.owned(user_id, id).await?;

        let types = match sync_types {
            None => vec![SyncType::Profile, SyncType::Followers, SyncType::Following],
            Some(raw) if raw.is_empty() => {
                return Err(AppError::Validation(
                    "sync_types must not be empty".to_string(),
                ))
            }
            Some(raw) => SyncType::parse_list(&raw).map_err(|invalid| {
                AppError::Validation(format!("Invalid sync types: {}", invalid.join(", ")))
            })?,
        };

        if account.token_expired(Utc::now()) {
            let refresh_token = account.refresh_token.clone().ok_or_else(|| {
                AppError::Validation("Access token expired, requires re-authorization".to_string())
            })?;
            self.refresh_account(account.clone(), &refresh_token)
                .await
                .map_err(|_| {
                    AppError::Validation(
                        "Access token expired, requires re-authorization".to_string(),
                    )
                })?;
            account = self.owned(user_id, id).await?;
        }

        if !force {
            let recent = self.sync_logs.latest_for_account(account.id, 20).await?;
            if recent.iter().any(|l| !l.status().is_finished()) {
                return Err(AppError::Conflict(
                    "A sync is already in progress for this account".to_string(),
                ));
            }
        }

        let sync_id = new_sync_id();
        let logs: Vec<SyncLog> = types
            .iter()
            .map(|t| SyncLog::pending(&sync_id, account.id, *t))
            .collect();
        self.sync_logs.create_many(&logs).await?;

        info!(
            "Starting sync {} for @{} ({} types)",
            sync_id,
            account.username,
            logs.len()
        );

        let service = self.clone();
        tokio::spawn(async move {
            service.run_sync(account, logs).await;
        });

        Ok(sync_id)
    }

    /// Execute a sync run, marking each log and finally the account itself
    pub async fn run_sync(&self, account: XAccount, logs: Vec<SyncLog>) {
        let token = account.access_token.clone();
        let mut profile: Option<XUserProfile> = None;
        let mut first_error: Option<String> = None;
        let mut completed = 0usize;

        for mut log in logs.iter().cloned() {
            log.sync_status = SyncStatus::Running.as_str().to_string();
            if let Err(e) = self.sync_logs.update(&log).await {
                error!("Failed to mark sync log {} running: {}", log.id, e);
            }

            let result = match SyncType::from_str(&log.sync_type) {
                Ok(SyncType::Profile) | Ok(SyncType::Stats) => {
                    if profile.is_some() {
                        Ok(1)
                    } else {
                        match self.x_api.get_me(&token).await {
                            Ok(fetched) => {
                                profile = Some(fetched);
                                Ok(1)
                            }
                            Err(e) => Err(e),
                        }
                    }
                }
                Ok(SyncType::Followers) => self
                    .x_api
                    .get_followers(&token, &account.x_user_id, SYNC_FETCH_LIMIT)
                    .await
                    .map(|v| v.len() as i64),
                Ok(SyncType::Following) => self
                    .x_api
                    .get_following(&token, &account.x_user_id, SYNC_FETCH_LIMIT)
                    .await
                    .map(|v| v.len() as i64),
                Ok(SyncType::Tweets) => self
                    .x_api
                    .get_recent_tweets(&token, &account.x_user_id, SYNC_FETCH_LIMIT)
                    .await
                    .map(|v| v.len() as i64),
                Err(e) => Err(AppError::Validation(e)),
            };

            match result {
                Ok(records) => {
                    log.complete(records);
                    completed += 1;
                }
                Err(e) => {
                    warn!("Sync {} failed for {}: {}", log.sync_id, log.sync_type, e);
                    first_error.get_or_insert_with(|| e.to_string());
                    log.fail(e.to_string());
                }
            }

            if let Err(e) = self.sync_logs.update(&log).await {
                error!("Failed to record sync log {}: {}", log.id, e);
            }
        }

        let mut current = match self.accounts.find_by_id(account.id).await {
            Ok(Some(current)) => current,
            Ok(None) => {
                warn!("X account {} disappeared during sync", account.id);
                return;
            }
            Err(e) => {
                error!("Failed to reload X account {}: {}", account.id, e);
                return;
            }
        };

        if let Some(profile) = profile.as_ref() {
            apply_profile(&mut current, profile);
        }
        current.last_sync_at = Some(Utc::now());
        if completed == 0 && !logs.is_empty() {
            current.set_status(BindingStatus::Error);
            current.last_error = first_error;
        } else {
            current.set_status(BindingStatus::Active);
            current.last_error = None;
        }

        match self.accounts.update(&current).await {
            Ok(updated) => info!(
                "Sync finished for @{}: {}/{} types completed",
                updated.username,
                completed,
                logs.len()
            ),
            Err(e) => error!("Failed to store sync result for {}: {}", account.id, e),
        }
    }

    pub async fn sync_status(
        &self,
        user_id: Uuid,
        id: Uuid,
        sync_id: &str,
    ) -> AppResult<Vec<SyncLog>> {
        let account = self.owned(user_id, id).await?;
        let logs = self.sync_logs.find_by_sync(account.id, sync_id).await?;
        if logs.is_empty() {
            return Err(AppError::NotFound("Sync task not found".to_string()));
        }
        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(user_id: Uuid, status: BindingStatus, followers: i64) -> XAccount {
        let mut acc = XAccount::new(
            user_id,
            Uuid::new_v4().to_string(),
            "name".into(),
            "Name".into(),
            "token".into(),
            "users.read".into(),
        );
        acc.set_status(status);
        acc.followers_count = followers;
        acc.following_count = 1;
        acc.tweets_count = 2;
        acc
    }

    #[test]
    fn test_compute_stats() {
        let owner = Uuid::new_v4();
        let now = Utc::now();
        let mut primary = account(owner, BindingStatus::Active, 100);
        primary.is_primary = true;
        primary.last_sync_at = Some(now - Duration::hours(1));
        let mut old = account(owner, BindingStatus::Expired, 50);
        old.created_at = now - Duration::days(3);
        let mut inactive = account(owner, BindingStatus::Active, 10);
        inactive.is_active = false;
        inactive.created_at = now - Duration::days(2);
        inactive.last_sync_at = Some(now - Duration::minutes(5));

        let mut done = SyncLog::pending("s", primary.id, SyncType::Profile);
        done.complete(1);
        let mut failed = SyncLog::pending("s", primary.id, SyncType::Tweets);
        failed.fail("boom");
        let pending = SyncLog::pending("s", primary.id, SyncType::Stats);

        let stats = compute_stats(
            &[primary, old, inactive],
            &[done, failed, pending],
            now,
        );

        assert_eq!(stats.total_accounts, 3);
        assert_eq!(stats.active_accounts, 1);
        assert_eq!(stats.primary_accounts, 1);
        assert_eq!(stats.total_followers, 160);
        assert_eq!(stats.total_following, 3);
        assert_eq!(stats.total_tweets, 6);
        assert_eq!(
            stats.accounts_by_status,
            StatusBreakdown {
                pending: 0,
                active: 2,
                expired: 1,
                error: 0
            }
        );
        assert_eq!(stats.sync_success_rate, 50.0);
        assert_eq!(stats.last_sync_time, Some(now - Duration::minutes(5)));
    }

    #[test]
    fn test_stats_without_sync_history() {
        let stats = compute_stats(&[], &[], Utc::now());
        assert_eq!(stats.total_accounts, 0);
        assert_eq!(stats.sync_success_rate, 100.0);
        assert!(stats.last_sync_time.is_none());
    }

    #[test]
    fn test_sync_id_format() {
        let id = new_sync_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "sync");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_apply_tokens_keeps_refresh_token() {
        let now = Utc::now();
        let mut acc = account(Uuid::new_v4(), BindingStatus::Active, 0);
        acc.refresh_token = Some("old-refresh".into());
        apply_tokens(
            &mut acc,
            &XOAuthTokens {
                access_token: "new-access".into(),
                refresh_token: None,
                token_type: "bearer".into(),
                expires_in: 7200,
                scope: String::new(),
            },
            now,
        );
        assert_eq!(acc.access_token, "new-access");
        assert_eq!(acc.refresh_token.as_deref(), Some("old-refresh"));
        assert_eq!(acc.token_expires_at, Some(now + Duration::seconds(7200)));
        assert_eq!(acc.scope, "users.read");
    }
}
