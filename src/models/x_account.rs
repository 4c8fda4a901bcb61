use super::sync_log::SyncLog;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Binding status of an X account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingStatus {
    Pending,
    Active,
    Expired,
    Error,
}

impl BindingStatus {
    pub const ALL: [BindingStatus; 4] = [
        BindingStatus::Pending,
        BindingStatus::Active,
        BindingStatus::Expired,
        BindingStatus::Error,
    ];

    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(BindingStatus::Pending),
            "active" => Ok(BindingStatus::Active),
            "expired" => Ok(BindingStatus::Expired),
            "error" => Ok(BindingStatus::Error),
            _ => Err(format!("Invalid binding status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingStatus::Pending => "pending",
            BindingStatus::Active => "active",
            BindingStatus::Expired => "expired",
            BindingStatus::Error => "error",
        }
    }
}

impl From<String> for BindingStatus {
    fn from(s: String) -> Self {
        Self::from_str(&s).unwrap_or(BindingStatus::Pending)
    }
}

impl From<BindingStatus> for String {
    fn from(status: BindingStatus) -> Self {
        status.as_str().to_string()
    }
}

/// How aggressively the growth automation may act
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthSpeed {
    Slow,
    Normal,
    Fast,
}

/// Automation settings stored with each binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoGrowSettings {
    pub daily_follow_limit: u32,
    pub daily_unfollow_limit: u32,
    pub target_followers_count: u64,
    pub target_keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub min_followers_ratio: f64,
    pub max_following_ratio: f64,
    pub account_age_days: u32,
    pub growth_speed: GrowthSpeed,
    pub enabled_features: Vec<String>,
}

impl Default for AutoGrowSettings {
    fn default() -> Self {
        Self {
            daily_follow_limit: 50,
            daily_unfollow_limit: 50,
            target_followers_count: 10_000,
            target_keywords: Vec::new(),
            exclude_keywords: vec!["spam".into(), "bot".into(), "fake".into()],
            min_followers_ratio: 0.1,
            max_following_ratio: 10.0,
            account_age_days: 30,
            growth_speed: GrowthSpeed::Normal,
            enabled_features: vec!["follow".into(), "unfollow".into()],
        }
    }
}

/// Partial update of [`AutoGrowSettings`]; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AutoGrowSettingsPatch {
    pub daily_follow_limit: Option<u32>,
    pub daily_unfollow_limit: Option<u32>,
    pub target_followers_count: Option<u64>,
    pub target_keywords: Option<Vec<String>>,
    pub exclude_keywords: Option<Vec<String>>,
    pub min_followers_ratio: Option<f64>,
    pub max_following_ratio: Option<f64>,
    pub account_age_days: Option<u32>,
    pub growth_speed: Option<GrowthSpeed>,
    pub enabled_features: Option<Vec<String>>,
}

impl AutoGrowSettings {
    pub fn apply(&mut self, patch: AutoGrowSettingsPatch) {
        if let Some(v) = patch.daily_follow_limit {
            self.daily_follow_limit = v;
        }
        if let Some(v) = patch.daily_unfollow_limit {
            self.daily_unfollow_limit = v;
        }
        if let Some(v) = patch.target_followers_count {
            self.target_followers_count = v;
        }
        if let Some(v) = patch.target_keywords {
            self.target_keywords = v;
        }
        if let Some(v) = patch.exclude_keywords {
            self.exclude_keywords = v;
        }
        if let Some(v) = patch.min_followers_ratio {
            self.min_followers_ratio = v;
        }
        if let Some(v) = patch.max_following_ratio {
            self.max_following_ratio = v;
        }
        if let Some(v) = patch.account_age_days {
            self.account_age_days = v;
        }
        if let Some(v) = patch.growth_speed {
            self.growth_speed = v;
        }
        if let Some(v) = patch.enabled_features {
            self.enabled_features = v;
        }
    }
}

/// An X account bound to a local user, including its OAuth tokens
#[derive(Debug, Clone, FromRow)]
pub struct XAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub x_user_id: String,
    pub username: String,
    pub display_name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub verified: bool,
    pub followers_count: i64,
    pub following_count: i64,
    pub tweets_count: i64,
    pub listed_count: i64,
    pub account_created_at: Option<DateTime<Utc>>,

    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub scope: String,

    pub is_active: bool,
    pub is_primary: bool,
    pub binding_status: String, // Stored as TEXT, use BindingStatus for type safety
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,

    pub auto_grow_enabled: bool,
    pub auto_grow_settings: Json<AutoGrowSettings>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl XAccount {
    /// Create a pending binding with default settings and zeroed metrics
    pub fn new(
        user_id: Uuid,
        x_user_id: String,
        username: String,
        display_name: String,
        access_token: String,
        scope: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            x_user_id,
            username,
            display_name,
            email: None,
            avatar_url: None,
            bio: None,
            location: None,
            website: None,
            verified: false,
            followers_count: 0,
            following_count: 0,
            tweets_count: 0,
            listed_count: 0,
            account_created_at: None,
            access_token,
            refresh_token: None,
            token_expires_at: None,
            scope,
            is_active: true,
            is_primary: false,
            binding_status: BindingStatus::Pending.as_str().to_string(),
            last_sync_at: None,
            last_error: None,
            auto_grow_enabled: false,
            auto_grow_settings: Json(AutoGrowSettings::default()),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> BindingStatus {
        BindingStatus::from(self.binding_status.clone())
    }

    pub fn set_status(&mut self, status: BindingStatus) {
        self.binding_status = status.as_str().to_string();
    }

    /// True once the access token's expiry has passed
    pub fn token_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expires_at.map(|at| at <= now).unwrap_or(false)
    }

    pub fn info(&self) -> XAccountInfo {
        XAccountInfo {
            id: self.id,
            x_user_id: self.x_user_id.clone(),
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
            verified: self.verified,
            followers_count: self.followers_count,
            following_count: self.following_count,
            tweets_count: self.tweets_count,
            binding_status: self.status(),
            is_active: self.is_active,
            is_primary: self.is_primary,
            last_sync_at: self.last_sync_at,
            auto_grow_enabled: self.auto_grow_enabled,
            created_at: self.created_at,
        }
    }

    pub fn detail(&self, sync_logs: Vec<SyncLog>) -> XAccountDetail {
        XAccountDetail {
            info: self.info(),
            bio: self.bio.clone(),
            location: self.location.clone(),
            website: self.website.clone(),
            email: self.email.clone(),
            listed_count: self.listed_count,
            account_created_at: self.account_created_at,
            token_expires_at: self.token_expires_at,
            scope: self.scope.clone(),
            last_error: self.last_error.clone(),
            auto_grow_settings: self.auto_grow_settings.0.clone(),
            sync_logs,
        }
    }
}

/// List view of a binding; never carries tokens
#[derive(Debug, Clone, Serialize)]
pub struct XAccountInfo {
    pub id: Uuid,
    pub x_user_id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub verified: bool,
    pub followers_count: i64,
    pub following_count: i64,
    pub tweets_count: i64,
    pub binding_status: BindingStatus,
    pub is_active: bool,
    pub is_primary: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub auto_grow_enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Detail view of a binding
#[derive(Debug, Clone, Serialize)]
pub struct XAccountDetail {
    #[serde(flatten)]
    pub info: XAccountInfo,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
    pub listed_count: i64,
    pub account_created_at: Option<DateTime<Utc>>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub scope: String,
    pub last_error: Option<String>,
    pub auto_grow_settings: AutoGrowSettings,
    pub sync_logs: Vec<SyncLog>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> XAccount {
        XAccount::new(
            Uuid::new_v4(),
            "42".into(),
            "rustacean".into(),
            "Ferris".into(),
            "secret-access-token".into(),
            "users.read".into(),
        )
    }

    #[test]
    fn test_binding_status_conversion() {
        for status in BindingStatus::ALL {
            assert_eq!(BindingStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(BindingStatus::from_str("revoked").is_err());
        assert_eq!(BindingStatus::from("garbage".to_string()), BindingStatus::Pending);
    }

    #[test]
    fn test_settings_patch_merges() {
        let mut settings = AutoGrowSettings::default();
        settings.apply(AutoGrowSettingsPatch {
            daily_follow_limit: Some(10),
            growth_speed: Some(GrowthSpeed::Fast),
            ..Default::default()
        });
        assert_eq!(settings.daily_follow_limit, 10);
        assert_eq!(settings.growth_speed, GrowthSpeed::Fast);
        assert_eq!(settings.daily_unfollow_limit, 50);
        assert_eq!(settings.exclude_keywords, vec!["spam", "bot", "fake"]);
    }

    #[test]
    fn test_settings_deserialize_from_empty_object() {
        let settings: AutoGrowSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, AutoGrowSettings::default());
    }

    #[test]
    fn test_views_hide_tokens() {
        let mut acc = account();
        acc.refresh_token = Some("secret-refresh-token".into());
        let json = serde_json::to_string(&acc.detail(Vec::new())).unwrap();
        assert!(!json.contains("secret-access-token"));
        assert!(!json.contains("secret-refresh-token"));
        assert!(json.contains("\"username\":\"rustacean\""));
        assert!(json.contains("\"binding_status\":\"pending\""));
    }

    #[test]
    fn test_token_expiry() {
        let now = Utc::now();
        let mut acc = account();
        assert!(!acc.token_expired(now));
        acc.token_expires_at = Some(now - chrono::Duration::seconds(1));
        assert!(acc.token_expired(now));
        acc.token_expires_at = Some(now + chrono::Duration::hours(2));
        assert!(!acc.token_expired(now));
    }
}
