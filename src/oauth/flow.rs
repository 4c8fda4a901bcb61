use super::pkce;
use crate::config::XOAuthConfig;
use crate::error::{AppError, AppResult};
use crate::models::oauth_state::redact;
use crate::models::OAuthState;
use crate::repositories::StateStore;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Tokens issued by the X token endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XOAuthTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub scope: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Authorization redirect and the state token correlating it
#[derive(Debug, Clone, Serialize)]
pub struct AuthUrl {
    pub url: String,
    pub state: String,
}

/// Per-request overrides of the configured redirect and scopes
#[derive(Debug, Clone, Default)]
pub struct AuthUrlOptions {
    pub redirect_uri: Option<String>,
    pub scopes: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct CallbackResult {
    pub tokens: XOAuthTokens,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateSummary {
    pub state: String,
    pub user_id: Option<String>,
    pub age_secs: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateStats {
    pub total: usize,
    pub states: Vec<StateSummary>,
}

/// Drives the X OAuth 2.0 authorization-code flow with PKCE.
///
/// States are persisted through a [`StateStore`] and consumed exactly once
/// by [`XOAuthFlowManager::handle_callback`].
pub struct XOAuthFlowManager {
    config: XOAuthConfig,
    store: Arc<dyn StateStore>,
    http: Client,
}

impl XOAuthFlowManager {
    pub fn new(config: XOAuthConfig, store: Arc<dyn StateStore>) -> Self {
        Self {
            config,
            store,
            http: Client::new(),
        }
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn config(&self) -> &XOAuthConfig {
        &self.config
    }

    pub async fn generate_auth_url(&self, user_id: Option<&str>) -> AppResult<AuthUrl> {
        self.generate_auth_url_with(user_id, AuthUrlOptions::default())
            .await
    }

    /// Create and store a state with a fresh PKCE pair, returning the authorize URL
    pub async fn generate_auth_url_with(
        &self,
        user_id: Option<&str>,
        options: AuthUrlOptions,
    ) -> AppResult<AuthUrl> {
        let redirect_uri = options
            .redirect_uri
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| self.config.redirect_uri.clone());
        let scopes = options
            .scopes
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.config.scopes.clone());

        let state = pkce::generate_state(user_id);
        let code_verifier = pkce::generate_code_verifier();
        let code_challenge = pkce::code_challenge(&code_verifier);

        let record = OAuthState {
            state: state.clone(),
            code_verifier,
            code_challenge: code_challenge.clone(),
            user_id: user_id.map(String::from),
            redirect_uri: redirect_uri.clone(),
            created_at: Utc::now(),
        };
        self.store.save(&record).await?;

        let scope = scopes.join(" ");
        let url = Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("state", state.as_str()),
                ("code_challenge", code_challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        )
        .map_err(|e| AppError::Config(format!("Invalid authorize URL: {}", e)))?;

        info!(
            "Generated X authorization URL (state: {}, user: {:?})",
            redact(&state),
            user_id
        );

        Ok(AuthUrl {
            url: url.to_string(),
            state,
        })
    }

    /// Consume the state and exchange the authorization code for tokens.
    ///
    /// With `expected_user` set, a state issued to another user is rejected
    /// before it is consumed or any token request is made.
    pub async fn handle_callback(
        &self,
        code: &str,
        state: &str,
        expected_user: Option<&str>,
    ) -> AppResult<CallbackResult> {
        if let Some(expected) = expected_user {
            let owner = self.store.find(state).await?.and_then(|s| s.user_id);
            if let Some(owner) = owner.filter(|owner| owner != expected) {
                warn!(
                    "User {} presented state {} issued to {}",
                    expected,
                    redact(state),
                    owner
                );
                return Err(AppError::InvalidState(
                    "State does not belong to the current user".to_string(),
                ));
            }
        }

        let record = self.store.take(state).await?.ok_or_else(|| {
            warn!("Callback with unknown state {}", redact(state));
            AppError::InvalidState("Invalid or expired state".to_string())
        })?;

        if record.is_expired(Utc::now(), self.config.state_ttl()) {
            warn!("Callback with expired state {}", redact(state));
            return Err(AppError::InvalidState("State expired".to_string()));
        }

        let mut form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("client_id", self.config.client_id.clone()),
            ("code", code.to_string()),
            ("redirect_uri", record.redirect_uri.clone()),
            ("code_verifier", record.code_verifier.clone()),
        ];
        if !self.config.client_secret.is_empty() {
            form.push(("client_secret", self.config.client_secret.clone()));
        }

        let tokens = self
            .request_tokens(&form, "Token exchange failed")
            .await?;
        info!(
            "Exchanged authorization code (state: {}, access token: {})",
            redact(state),
            redact(&tokens.access_token)
        );

        Ok(CallbackResult {
            tokens,
            user_id: record.user_id,
        })
    }

    /// Obtain a new access token; the old refresh token is kept when none is returned
    pub async fn refresh_access_token(&self, refresh_token: &str) -> AppResult<XOAuthTokens> {
        let mut form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.to_string()),
            ("client_id", self.config.client_id.clone()),
        ];
        if !self.config.client_secret.is_empty() {
            form.push(("client_secret", self.config.client_secret.clone()));
        }

        let mut tokens = self.request_tokens(&form, "Token refresh failed").await?;
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token.to_string());
        }
        debug!("Refreshed access token {}", redact(&tokens.access_token));
        Ok(tokens)
    }

    pub async fn revoke_token(&self, access_token: &str) -> AppResult<()> {
        let mut form = vec![
            ("token", access_token.to_string()),
            ("client_id", self.config.client_id.clone()),
        ];
        if !self.config.client_secret.is_empty() {
            form.push(("client_secret", self.config.client_secret.clone()));
        }

        let response = self
            .http
            .post(&self.config.revoke_url)
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Token revocation failed: {}",
                response.status()
            )));
        }
        debug!("Revoked access token {}", redact(access_token));
        Ok(())
    }

    pub async fn cleanup_expired_states(&self) -> AppResult<u64> {
        let cutoff = Utc::now() - self.config.state_ttl();
        let purged = self.store.purge_expired(cutoff).await?;
        if purged > 0 {
            info!("Purged {} expired OAuth states", purged);
        }
        Ok(purged)
    }

    pub async fn state_stats(&self) -> AppResult<StateStats> {
        let now = Utc::now();
        let states: Vec<StateSummary> = self
            .store
            .list()
            .await?
            .into_iter()
            .map(|s| StateSummary {
                state: redact(&s.state),
                age_secs: s.age(now).num_seconds(),
                user_id: s.user_id,
            })
            .collect();

        Ok(StateStats {
            total: states.len(),
            states,
        })
    }

    async fn request_tokens(
        &self,
        form: &[(&str, String)],
        failure: &str,
    ) -> AppResult<XOAuthTokens> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("{} with status {}", failure, status);
            return Err(AppError::ExternalService(format!("{}: {}", failure, body)));
        }

        let tokens = response.json::<XOAuthTokens>().await?;
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::InMemoryStateStore;
    use chrono::Duration;
    use std::collections::HashMap;

    fn manager() -> (XOAuthFlowManager, Arc<InMemoryStateStore>) {
        let store = Arc::new(InMemoryStateStore::new());
        let config = XOAuthConfig {
            client_id: "client-abc".into(),
            ..XOAuthConfig::default()
        };
        (XOAuthFlowManager::new(config, store.clone()), store)
    }

    #[tokio::test]
    async fn test_auth_url_parameters() {
        let (manager, store) = manager();
        let auth = manager.generate_auth_url(Some("user-1")).await.unwrap();
        assert!(auth.state.starts_with("user-1_"));

        let url = Url::parse(&auth.url).unwrap();
        assert_eq!(url.host_str(), Some("twitter.com"));
        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], "client-abc");
        assert_eq!(params["state"], auth.state);
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["scope"], "users.read offline.access tweet.read follows.read");

        let saved = store.list().await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(params["code_challenge"], pkce::code_challenge(&saved[0].code_verifier));
        assert_eq!(saved[0].user_id.as_deref(), Some("user-1"));
    }

    #[tokio::test]
    async fn test_auth_url_overrides() {
        let (manager, store) = manager();
        let auth = manager
            .generate_auth_url_with(
                None,
                AuthUrlOptions {
                    redirect_uri: Some("http://app.local/cb".into()),
                    scopes: Some(vec!["users.read".into()]),
                },
            )
            .await
            .unwrap();

        let url = Url::parse(&auth.url).unwrap();
        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["redirect_uri"], "http://app.local/cb");
        assert_eq!(params["scope"], "users.read");
        assert_eq!(store.list().await.unwrap()[0].redirect_uri, "http://app.local/cb");
    }

    #[tokio::test]
    async fn test_unknown_state_rejected() {
        let (manager, _) = manager();
        let err = manager.handle_callback("code", "nope", None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(err.to_string(), "Invalid or expired state");
    }

    #[tokio::test]
    async fn test_expired_state_rejected_and_consumed() {
        let (manager, store) = manager();
        store
            .save(&OAuthState {
                state: "old".into(),
                code_verifier: "v".into(),
                code_challenge: "c".into(),
                user_id: None,
                redirect_uri: "http://localhost/cb".into(),
                created_at: Utc::now() - Duration::minutes(16),
            })
            .await
            .unwrap();

        let err = manager.handle_callback("code", "old", None).await.unwrap_err();
        assert_eq!(err.to_string(), "State expired");

        let err = manager.handle_callback("code", "old", None).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid or expired state");
    }

    #[tokio::test]
    async fn test_foreign_state_rejected_without_consuming() {
        let (manager, store) = manager();
        let auth = manager.generate_auth_url(Some("owner")).await.unwrap();

        let err = manager
            .handle_callback("code", &auth.state, Some("intruder"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(err.to_string(), "State does not belong to the current user");

        let pending = store.find(&auth.state).await.unwrap().unwrap();
        assert_eq!(pending.user_id.as_deref(), Some("owner"));
    }

    #[tokio::test]
    async fn test_cleanup_and_stats() {
        let (manager, store) = manager();
        manager.generate_auth_url(Some("u")).await.unwrap();
        store
            .save(&OAuthState {
                state: "stale-state-token".into(),
                code_verifier: "v".into(),
                code_challenge: "c".into(),
                user_id: None,
                redirect_uri: "http://localhost/cb".into(),
                created_at: Utc::now() - Duration::hours(1),
            })
            .await
            .unwrap();

        let stats = manager.state_stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert!(stats.states.iter().all(|s| s.state.ends_with("...")));

        assert_eq!(manager.cleanup_expired_states().await.unwrap(), 1);
        assert_eq!(manager.state_stats().await.unwrap().total, 1);
    }

    #[test]
    fn test_token_response_defaults() {
        let tokens: XOAuthTokens =
            serde_json::from_str(r#"{"access_token":"abc","expires_in":7200}"#).unwrap();
        assert_eq!(tokens.token_type, "bearer");
        assert!(tokens.refresh_token.is_none());
        assert_eq!(tokens.expires_in, 7200);
    }
}
