use crate::config::AnalysisConfig;
use crate::error::{AppError, AppResult};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

/// Body forwarded to the analysis service's `/api/analyze`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzeRequest {
    pub username: String,
    pub include_tweets: bool,
    pub tweets_limit: u32,
    pub include_followers: bool,
    pub include_following: bool,
}

impl AnalyzeRequest {
    pub fn new(username: &str, include_tweets: bool, tweets_limit: u32) -> Self {
        Self {
            username: normalize_username(username),
            include_tweets,
            tweets_limit,
            include_followers: false,
            include_following: false,
        }
    }
}

/// Trim whitespace and a leading `@`
pub fn normalize_username(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_prefix('@').unwrap_or(trimmed).to_string()
}

/// JSON proxy to the Twitter analysis service
#[derive(Clone)]
pub struct AnalysisClient {
    base_url: String,
    http: Client,
}

impl AnalysisClient {
    pub fn new(config: &AnalysisConfig) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: config.service_url.clone(),
            http,
        })
    }

    pub async fn analyze(&self, request: &AnalyzeRequest) -> AppResult<Value> {
        debug!("Requesting analysis of {}", request.username);
        let url = self.url(&["api", "analyze"])?;
        self.send(self.http.post(url).json(request)).await
    }

    pub async fn get_result(&self, task_id: &str) -> AppResult<Value> {
        let url = self.url(&["api", "analyze", task_id])?;
        self.send(self.http.get(url)).await
    }

    pub async fn list_tasks(&self) -> AppResult<Value> {
        let url = self.url(&["api", "tasks"])?;
        self.send(self.http.get(url)).await
    }

    pub async fn get_user(&self, username: &str) -> AppResult<Value> {
        let username = normalize_username(username);
        let url = self.url(&["api", "user", username.as_str()])?;
        self.send(self.http.get(url)).await
    }

    fn url(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AppError::Config(format!("Invalid PYTHON_SERVICE_URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Config("PYTHON_SERVICE_URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> AppResult<Value> {
        let response = request.send().await.map_err(|e| {
            warn!("Analysis service unreachable: {}", e);
            AppError::ExternalService(format!("Analysis service request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!("Analysis service answered {}", status);
            return Err(AppError::ExternalService(format!(
                "Analysis service request failed: {}",
                status
            )));
        }

        Ok(response.json::<Value>().await?)
    }
}
