use std::env;
use std::time::Duration;

/// Fallback signing secret for local development only.
const DEV_JWT_SECRET: &str = "dev-secret-change-in-production";

/// Upper bound for session and OAuth state lifetimes (one year).
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub test_before_acquire: bool,
}

/// Session token configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
}

/// X (Twitter) OAuth 2.0 client configuration
#[derive(Debug, Clone)]
pub struct XOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub authorize_url: String,
    pub token_url: String,
    pub revoke_url: String,
    pub api_base_url: String,
    pub state_ttl_secs: u64,
    pub state_cleanup_interval_secs: u64,
}

/// Python analysis service configuration
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub service_url: String,
    pub timeout_secs: u64,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` selects the in-memory storage backend.
    pub database: Option<DatabaseConfig>,
    pub log_level: String,
    pub log_format: String,
    pub http_port: u16,
    pub environment: String,
    pub enable_test_routes: bool,
    pub auth: AuthConfig,
    pub x_oauth: XOAuthConfig,
    pub analysis: AnalysisConfig,
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
}

/// Reject lifetimes of zero or longer than [`MAX_TTL_SECS`]
pub fn validate_ttl(key: &str, secs: u64) -> Result<u64, String> {
    if secs == 0 || secs > MAX_TTL_SECS {
        return Err(format!(
            "{} must be between 1 and {} seconds, got {}",
            key, MAX_TTL_SECS, secs
        ));
    }
    Ok(secs)
}

fn ttl_duration(secs: u64) -> chrono::Duration {
    let secs = i64::try_from(secs.min(MAX_TTL_SECS)).unwrap_or_default();
    chrono::Duration::seconds(secs)
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(10);

        let acquire_timeout_secs = env_u64("DATABASE_ACQUIRE_TIMEOUT_SECS", 30);
        let idle_timeout_secs = env_u64("DATABASE_IDLE_TIMEOUT_SECS", 600); // 10 minutes
        let max_lifetime_secs = env_u64("DATABASE_MAX_LIFETIME_SECS", 1800); // 30 minutes

        let test_before_acquire = env::var("DATABASE_TEST_BEFORE_ACQUIRE")
            .ok()
            .and_then(|s| s.parse::<bool>().ok())
            .unwrap_or(true);

        if max_connections == 0 {
            return Err("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string());
        }

        if acquire_timeout_secs == 0 {
            return Err("DATABASE_ACQUIRE_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            url,
            max_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
            test_before_acquire,
        })
    }

    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Get max lifetime as Duration
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/social_automation".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            test_before_acquire: true,
        }
    }
}

impl AuthConfig {
    pub fn token_ttl(&self) -> chrono::Duration {
        ttl_duration(self.token_ttl_secs)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_secs: 7 * 24 * 60 * 60,
        }
    }
}

impl XOAuthConfig {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        let app_url = env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let redirect_uri = env::var("X_REDIRECT_URI")
            .unwrap_or_else(|_| format!("{}/auth/x/callback", app_url.trim_end_matches('/')));

        let scopes = env::var("X_SCOPES")
            .ok()
            .map(|s| parse_scopes(&s))
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.scopes);

        let state_ttl_secs = validate_ttl(
            "X_OAUTH_STATE_TTL_SECS",
            env_u64("X_OAUTH_STATE_TTL_SECS", defaults.state_ttl_secs),
        )?;

        Ok(Self {
            client_id: env::var("X_CLIENT_ID").unwrap_or_default(),
            client_secret: env::var("X_CLIENT_SECRET").unwrap_or_default(),
            redirect_uri,
            scopes,
            authorize_url: env::var("X_AUTHORIZE_URL").unwrap_or(defaults.authorize_url),
            token_url: env::var("X_TOKEN_URL").unwrap_or(defaults.token_url),
            revoke_url: env::var("X_REVOKE_URL").unwrap_or(defaults.revoke_url),
            api_base_url: env::var("X_API_BASE_URL").unwrap_or(defaults.api_base_url),
            state_ttl_secs,
            state_cleanup_interval_secs: env_u64(
                "X_OAUTH_STATE_CLEANUP_SECS",
                defaults.state_cleanup_interval_secs,
            ),
        })
    }

    /// How long an authorization request stays redeemable
    pub fn state_ttl(&self) -> chrono::Duration {
        ttl_duration(self.state_ttl_secs)
    }

    pub fn state_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.state_cleanup_interval_secs)
    }
}

impl Default for XOAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://localhost:3000/auth/x/callback".to_string(),
            scopes: vec![
                "users.read".to_string(),
                "offline.access".to_string(),
                "tweet.read".to_string(),
                "follows.read".to_string(),
            ],
            authorize_url: "https://twitter.com/i/oauth2/authorize".to_string(),
            token_url: "https://api.twitter.com/2/oauth2/token".to_string(),
            revoke_url: "https://api.twitter.com/2/oauth2/revoke".to_string(),
            api_base_url: "https://api.twitter.com/2".to_string(),
            state_ttl_secs: 15 * 60,
            state_cleanup_interval_secs: 5 * 60,
        }
    }
}

impl AnalysisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Split a comma separated scope list, dropping blanks.
pub fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let database = if env::var("DATABASE_URL").is_ok() {
            Some(DatabaseConfig::from_env()?)
        } else {
            None
        };

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

        let http_port = env::var("HTTP_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(3000);

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        let valid_log_formats = ["text", "json"];
        if !valid_log_formats.contains(&log_format.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_FORMAT: {}. Must be one of: {:?}",
                log_format, valid_log_formats
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&environment.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }
        let environment = environment.to_lowercase();
        let is_production = environment == "production";

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if is_production => {
                return Err("JWT_SECRET must be set in production".to_string());
            }
            _ => DEV_JWT_SECRET.to_string(),
        };

        let auth = AuthConfig {
            jwt_secret,
            token_ttl_secs: validate_ttl(
                "JWT_TTL_SECS",
                env_u64("JWT_TTL_SECS", AuthConfig::default().token_ttl_secs),
            )?,
        };

        let analysis = AnalysisConfig {
            service_url: env::var("PYTHON_SERVICE_URL")
                .unwrap_or_else(|_| AnalysisConfig::default().service_url),
            timeout_secs: env_u64("PYTHON_SERVICE_TIMEOUT_SECS", 30),
        };

        let enable_test_routes = env::var("ENABLE_TEST_ROUTES")
            .ok()
            .and_then(|s| s.parse::<bool>().ok())
            .unwrap_or(!is_production);

        Ok(Self {
            database,
            log_level: log_level.to_lowercase(),
            log_format: log_format.to_lowercase(),
            http_port,
            environment,
            enable_test_routes,
            auth,
            x_oauth: XOAuthConfig::from_env()?,
            analysis,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn json_logs(&self) -> bool {
        self.log_format == "json"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: None,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            http_port: 3000,
            environment: "development".to_string(),
            enable_test_routes: true,
            auth: AuthConfig::default(),
            x_oauth: XOAuthConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.http_port, 3000);
        assert!(config.database.is_none());
        assert!(config.is_development());
        assert!(!config.is_production());
        assert!(config.enable_test_routes);
    }

    #[test]
    fn test_oauth_defaults() {
        let config = XOAuthConfig::default();
        assert_eq!(config.state_ttl(), chrono::Duration::minutes(15));
        assert_eq!(config.state_cleanup_interval(), Duration::from_secs(300));
        assert!(config.scopes.iter().any(|s| s == "offline.access"));
    }

    #[test]
    fn test_ttl_bounds() {
        assert_eq!(validate_ttl("JWT_TTL_SECS", 3600).unwrap(), 3600);
        assert_eq!(validate_ttl("JWT_TTL_SECS", MAX_TTL_SECS).unwrap(), MAX_TTL_SECS);
        assert!(validate_ttl("JWT_TTL_SECS", 0).is_err());
        assert!(validate_ttl("JWT_TTL_SECS", MAX_TTL_SECS + 1).is_err());

        let err = validate_ttl("X_OAUTH_STATE_TTL_SECS", u64::MAX).unwrap_err();
        assert!(err.starts_with("X_OAUTH_STATE_TTL_SECS must be between 1 and"));
    }

    #[test]
    fn test_ttl_accessors_are_bounded() {
        let auth = AuthConfig {
            token_ttl_secs: u64::MAX,
            ..AuthConfig::default()
        };
        assert_eq!(auth.token_ttl(), chrono::Duration::days(365));
        assert_eq!(AuthConfig::default().token_ttl(), chrono::Duration::days(7));
    }

    #[test]
    fn test_parse_scopes() {
        assert_eq!(
            parse_scopes(" users.read, ,tweet.read,"),
            vec!["users.read".to_string(), "tweet.read".to_string()]
        );
        assert!(parse_scopes("").is_empty());
    }
}
