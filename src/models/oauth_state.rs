use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A pending authorization request, keyed by its state token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OAuthState {
    pub state: String,
    #[serde(skip_serializing)]
    pub code_verifier: String,
    pub code_challenge: String,
    pub user_id: Option<String>,
    pub redirect_uri: String,
    pub created_at: DateTime<Utc>,
}

impl OAuthState {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) > ttl
    }
}

/// Shorten a secret for log output
pub fn redact(value: &str) -> String {
    let prefix: String = value.chars().take(8).collect();
    format!("{}...", prefix)
}
