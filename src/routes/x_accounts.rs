use super::{account_id, present, ApiJson};
use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::services::x_account_service::{DEFAULT_LIMIT, DEFAULT_PAGE};
use crate::services::AccountUpdate;
use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmUsername {
    pub confirm_username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SyncBody {
    pub sync_types: Option<Vec<String>>,
    #[serde(default)]
    pub force_sync: bool,
}

fn parse_number(raw: Option<String>, name: &str, default: u32) -> AppResult<u32> {
    match present(raw) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<u32>()
            .map_err(|_| AppError::Validation(format!("{} must be a positive integer", name))),
    }
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Value>> {
    let page = parse_number(query.page, "page", DEFAULT_PAGE)?;
    let limit = parse_number(query.limit, "limit", DEFAULT_LIMIT)?;

    let result = state
        .x_account_service
        .list(user.id(), query.status.as_deref(), page, limit)
        .await?;

    Ok(Json(json!({
        "success": true,
        "accounts": result.accounts,
        "total": result.total,
        "page": result.page,
        "limit": result.limit,
    })))
}

pub async fn stats(State(state): State<Arc<AppState>>, user: AuthUser) -> AppResult<Json<Value>> {
    let stats = state.x_account_service.stats(user.id()).await?;
    Ok(Json(json!({
        "success": true,
        "stats": stats,
    })))
}

pub async fn detail(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let account = state
        .x_account_service
        .detail(user.id(), account_id(&id)?)
        .await?;
    Ok(Json(json!({
        "success": true,
        "account": account,
    })))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(changes): ApiJson<AccountUpdate>,
) -> AppResult<Json<Value>> {
    let account = state
        .x_account_service
        .update(user.id(), account_id(&id)?, changes)
        .await?;
    Ok(Json(json!({
        "success": true,
        "account": account,
        "message": "X account updated successfully",
    })))
}

/// `confirm_username` may come from the query string or a JSON body
pub async fn unbind(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Query(query): Query<ConfirmUsername>,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let from_body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<ConfirmUsername>(&body)
            .ok()
            .and_then(|b| b.confirm_username)
    };
    let confirm = present(query.confirm_username)
        .or_else(|| present(from_body))
        .ok_or_else(|| AppError::Validation("Missing confirm_username parameter".to_string()))?;

    state
        .x_account_service
        .unbind(user.id(), account_id(&id)?, &confirm)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "X account unbound successfully",
    })))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let tokens = state
        .x_account_service
        .refresh_tokens(user.id(), account_id(&id)?)
        .await?;
    Ok(Json(json!({
        "success": true,
        "expires_in": tokens.expires_in,
        "message": "Token refreshed successfully",
    })))
}

pub async fn start_sync(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<SyncBody>,
) -> AppResult<Json<Value>> {
    let sync_id = state
        .x_account_service
        .start_sync(user.id(), account_id(&id)?, body.sync_types, body.force_sync)
        .await?;
    Ok(Json(json!({
        "success": true,
        "sync_id": sync_id,
        "message": "Sync task started",
    })))
}

pub async fn sync_status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((id, sync_id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let logs = state
        .x_account_service
        .sync_status(user.id(), account_id(&id)?, &sync_id)
        .await?;
    Ok(Json(json!({
        "success": true,
        "sync_logs": logs,
    })))
}
