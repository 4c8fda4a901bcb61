use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// What a sync run fetches from the X API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncType {
    Profile,
    Followers,
    Following,
    Tweets,
    Stats,
}

impl SyncType {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "profile" => Ok(SyncType::Profile),
            "followers" => Ok(SyncType::Followers),
            "following" => Ok(SyncType::Following),
            "tweets" => Ok(SyncType::Tweets),
            "stats" => Ok(SyncType::Stats),
            _ => Err(format!("Invalid sync type: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncType::Profile => "profile",
            SyncType::Followers => "followers",
            SyncType::Following => "following",
            SyncType::Tweets => "tweets",
            SyncType::Stats => "stats",
        }
    }

    /// Parse a requested type list, returning every unknown entry on failure
    pub fn parse_list(raw: &[String]) -> Result<Vec<SyncType>, Vec<String>> {
        let mut parsed = Vec::with_capacity(raw.len());
        let mut invalid = Vec::new();
        for item in raw {
            match SyncType::from_str(item) {
                Ok(t) if !parsed.contains(&t) => parsed.push(t),
                Ok(_) => {}
                Err(_) => invalid.push(item.clone()),
            }
        }
        if invalid.is_empty() {
            Ok(parsed)
        } else {
            Err(invalid)
        }
    }
}

/// Progress of a single sync log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl SyncStatus {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SyncStatus::Pending),
            "running" => Ok(SyncStatus::Running),
            "completed" => Ok(SyncStatus::Completed),
            "failed" => Ok(SyncStatus::Failed),
            _ => Err(format!("Invalid sync status: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Running => "running",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed => "failed",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, SyncStatus::Completed | SyncStatus::Failed)
    }
}

impl From<String> for SyncStatus {
    fn from(s: String) -> Self {
        Self::from_str(&s).unwrap_or(SyncStatus::Pending)
    }
}

/// One sync type within a sync run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SyncLog {
    pub id: String,
    pub sync_id: String,
    pub x_account_id: Uuid,
    pub sync_type: String,
    pub sync_status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_processed: i64,
    pub records_success: i64,
    pub records_failed: i64,
    pub error_message: Option<String>,
}

impl SyncLog {
    pub fn pending(sync_id: &str, x_account_id: Uuid, sync_type: SyncType) -> Self {
        Self {
            id: format!("{}-{}", sync_id, sync_type.as_str()),
            sync_id: sync_id.to_string(),
            x_account_id,
            sync_type: sync_type.as_str().to_string(),
            sync_status: SyncStatus::Pending.as_str().to_string(),
            started_at: Utc::now(),
            completed_at: None,
            records_processed: 0,
            records_success: 0,
            records_failed: 0,
            error_message: None,
        }
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus::from(self.sync_status.clone())
    }

    pub fn complete(&mut self, records: i64) {
        self.sync_status = SyncStatus::Completed.as_str().to_string();
        self.completed_at = Some(Utc::now());
        self.records_processed = records;
        self.records_success = records;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.sync_status = SyncStatus::Failed.as_str().to_string();
        self.completed_at = Some(Utc::now());
        self.records_processed = 1;
        self.records_failed = 1;
        self.error_message = Some(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_type_parse_list() {
        let raw = vec!["profile".to_string(), "Stats".to_string(), "profile".to_string()];
        assert_eq!(
            SyncType::parse_list(&raw).unwrap(),
            vec![SyncType::Profile, SyncType::Stats]
        );

        let raw = vec!["profile".to_string(), "likes".to_string(), "dms".to_string()];
        assert_eq!(SyncType::parse_list(&raw).unwrap_err(), vec!["likes", "dms"]);
    }

    #[test]
    fn test_log_id_and_transitions() {
        let account = Uuid::new_v4();
        let mut log = SyncLog::pending("sync_1", account, SyncType::Followers);
        assert_eq!(log.id, "sync_1-followers");
        assert_eq!(log.status(), SyncStatus::Pending);
        assert!(!log.status().is_finished());

        log.complete(120);
        assert_eq!(log.status(), SyncStatus::Completed);
        assert_eq!(log.records_success, 120);
        assert!(log.completed_at.is_some());

        let mut failed = SyncLog::pending("sync_1", account, SyncType::Tweets);
        failed.fail("rate limited");
        assert_eq!(failed.status(), SyncStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("rate limited"));
    }
}
