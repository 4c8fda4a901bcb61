use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

const USER_FIELDS: &str =
    "created_at,description,id,location,name,profile_image_url,protected,public_metrics,url,username,verified";
const FOLLOW_USER_FIELDS: &str = "created_at,description,public_metrics,verified,profile_image_url";
const TWEET_FIELDS: &str = "created_at,public_metrics,author_id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicMetrics {
    pub followers_count: i64,
    pub following_count: i64,
    pub tweet_count: i64,
    pub listed_count: i64,
}

/// A user object from the X API v2
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XUserProfile {
    pub id: String,
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub public_metrics: PublicMetrics,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XTweet {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

/// Thin client over the X API v2, authenticated per call with a user's access token
#[derive(Clone)]
pub struct XApiClient {
    base_url: String,
    http: Client,
}

impl XApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    /// Profile of the token's owner
    pub async fn get_me(&self, access_token: &str) -> AppResult<XUserProfile> {
        let envelope: Envelope<XUserProfile> = self
            .get(access_token, "/users/me", &[("user.fields", USER_FIELDS.to_string())])
            .await?;
        envelope
            .data
            .ok_or_else(|| AppError::ExternalService("No user data received".to_string()))
    }

    pub async fn get_followers(
        &self,
        access_token: &str,
        x_user_id: &str,
        max_results: u32,
    ) -> AppResult<Vec<XUserProfile>> {
        self.get_user_list(access_token, x_user_id, "followers", max_results)
            .await
    }

    pub async fn get_following(
        &self,
        access_token: &str,
        x_user_id: &str,
        max_results: u32,
    ) -> AppResult<Vec<XUserProfile>> {
        self.get_user_list(access_token, x_user_id, "following", max_results)
            .await
    }

    pub async fn get_recent_tweets(
        &self,
        access_token: &str,
        x_user_id: &str,
        max_results: u32,
    ) -> AppResult<Vec<XTweet>> {
        let path = format!("/users/{}/tweets", x_user_id);
        let envelope: Envelope<Vec<XTweet>> = self
            .get(
                access_token,
                &path,
                &[
                    ("tweet.fields", TWEET_FIELDS.to_string()),
                    ("max_results", max_results.clamp(5, 100).to_string()),
                ],
            )
            .await?;
        Ok(envelope.data.unwrap_or_default())
    }

    /// True when `users/me` answers with a success status
    pub async fn is_token_valid(&self, access_token: &str) -> bool {
        match self
            .http
            .get(format!("{}/users/me", self.base_url))
            .bearer_auth(access_token)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Token validation request failed: {}", e);
                false
            }
        }
    }

    async fn get_user_list(
        &self,
        access_token: &str,
        x_user_id: &str,
        relation: &str,
        max_results: u32,
    ) -> AppResult<Vec<XUserProfile>> {
        let path = format!("/users/{}/{}", x_user_id, relation);
        let envelope: Envelope<Vec<XUserProfile>> = self
            .get(
                access_token,
                &path,
                &[
                    ("user.fields", FOLLOW_USER_FIELDS.to_string()),
                    ("max_results", max_results.clamp(1, 1000).to_string()),
                ],
            )
            .await?;
        Ok(envelope.data.unwrap_or_default())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        access_token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> AppResult<T> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AppError::ExternalService(
                "X API rejected the access token".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(AppError::ExternalService(format!(
                "X API request failed: {}",
                status
            )));
        }

        Ok(response.json::<T>().await?)
    }
}
