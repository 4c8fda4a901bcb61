use super::{present, ApiJson};
use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::services::analysis_client::normalize_username;
use crate::services::AnalyzeRequest;
use crate::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

const DEFAULT_TWEETS_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct AnalyzeBody {
    pub username: Option<String>,
    pub include_tweets: Option<bool>,
    pub tweets_limit: Option<u32>,
}

pub async fn analyze(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(body): ApiJson<AnalyzeBody>,
) -> AppResult<Json<Value>> {
    let username = present(body.username)
        .map(|u| normalize_username(&u))
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::Validation("Username is required".to_string()))?;

    let request = AnalyzeRequest::new(
        &username,
        body.include_tweets.unwrap_or(true),
        body.tweets_limit.unwrap_or(DEFAULT_TWEETS_LIMIT),
    );
    info!("User {} requested analysis of @{}", user.id(), request.username);

    Ok(Json(state.analysis.analyze(&request).await?))
}

pub async fn result(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(task_id): Path<String>,
) -> AppResult<Json<Value>> {
    let task_id = task_id.trim();
    if task_id.is_empty() {
        return Err(AppError::Validation("Task ID is required".to_string()));
    }
    Ok(Json(state.analysis.get_result(task_id).await?))
}

pub async fn tasks(State(state): State<Arc<AppState>>, _user: AuthUser) -> AppResult<Json<Value>> {
    Ok(Json(state.analysis.list_tasks().await?))
}

pub async fn user(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(username): Path<String>,
) -> AppResult<Json<Value>> {
    if normalize_username(&username).is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }
    Ok(Json(state.analysis.get_user(&username).await?))
}
