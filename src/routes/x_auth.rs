use super::{account_id, present, ApiJson};
use crate::auth::AuthUser;
use crate::config::parse_scopes;
use crate::error::{AppError, AppResult};
use crate::oauth::AuthUrlOptions;
use crate::services::BindPreferences;
use crate::AppState;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// Fixed owner of states created by the test URL route
pub const TEST_USER_ID: &str = "test_user_123";

#[derive(Debug, Deserialize)]
pub struct AuthUrlQuery {
    pub redirect_uri: Option<String>,
    pub scopes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackBody {
    pub code: Option<String>,
    pub state: Option<String>,
    #[serde(default)]
    pub user_preferences: Option<BindPreferences>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshBody {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshQuery {
    pub account_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateBody {
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StateBody {
    pub state: Option<String>,
}

pub async fn auth_url(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<AuthUrlQuery>,
) -> AppResult<Json<Value>> {
    let options = AuthUrlOptions {
        redirect_uri: present(query.redirect_uri),
        scopes: present(query.scopes).map(|s| parse_scopes(&s)),
    };
    let auth = state
        .oauth
        .generate_auth_url_with(Some(&user.id().to_string()), options)
        .await?;

    Ok(Json(json!({
        "success": true,
        "auth_url": auth.url,
        "state": auth.state,
    })))
}

/// Complete an authorization: consume the state, exchange the code and bind the account
pub async fn callback(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(body): ApiJson<CallbackBody>,
) -> AppResult<Json<Value>> {
    let (code, oauth_state) = match (present(body.code), present(body.state)) {
        (Some(code), Some(oauth_state)) => (code, oauth_state),
        _ => {
            return Err(AppError::Validation(
                "Missing authorization code or state".to_string(),
            ))
        }
    };

    let user_id = user.id().to_string();
    let result = state
        .oauth
        .handle_callback(&code, &oauth_state, Some(&user_id))
        .await?;

    let account = state
        .x_account_service
        .bind(
            user.id(),
            &result.tokens,
            body.user_preferences.unwrap_or_default(),
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "account": account.info(),
    })))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<RefreshQuery>,
    ApiJson(body): ApiJson<RefreshBody>,
) -> AppResult<Json<Value>> {
    let refresh_token = present(body.refresh_token)
        .ok_or_else(|| AppError::Validation("Missing refresh token".to_string()))?;
    let account = present(query.account_id)
        .map(|raw| account_id(&raw))
        .transpose()?;

    let tokens = state
        .x_account_service
        .refresh_with_token(user.id(), &refresh_token, account)
        .await?;

    Ok(Json(json!({
        "success": true,
        "access_token": tokens.access_token,
        "refresh_token": tokens.refresh_token,
        "expires_in": tokens.expires_in,
    })))
}

pub async fn validate(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    ApiJson(body): ApiJson<ValidateBody>,
) -> AppResult<Json<Value>> {
    let access_token = present(body.access_token)
        .ok_or_else(|| AppError::Validation("Missing access token".to_string()))?;

    let valid = state.x_api.is_token_valid(&access_token).await;
    let user_info = if valid {
        state.x_api.get_me(&access_token).await.ok()
    } else {
        None
    };

    Ok(Json(json!({
        "success": true,
        "valid": valid,
        "user_info": user_info,
    })))
}

pub async fn test_url(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let auth = state.oauth.generate_auth_url(Some(TEST_USER_ID)).await?;
    let config = state.oauth.config();

    Ok(Json(json!({
        "success": true,
        "auth_url": auth.url,
        "state": auth.state,
        "debug_info": {
            "user_id": TEST_USER_ID,
            "redirect_uri": config.redirect_uri,
            "scopes": config.scopes,
            "client_id_configured": !config.client_id.is_empty(),
            "state_ttl_secs": config.state_ttl_secs,
        },
    })))
}

/// Run a callback with a bogus code against `state`, which is expected to fail
pub async fn test_expired_state(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<StateBody>,
) -> AppResult<Json<Value>> {
    let oauth_state =
        present(body.state).ok_or_else(|| AppError::Validation("Missing state".to_string()))?;

    match state
        .oauth
        .handle_callback("fake_authorization_code", &oauth_state, None)
        .await
    {
        Ok(_) => Ok(Json(json!({
            "success": false,
            "error": "Should have failed with expired state",
        }))),
        Err(e) => {
            info!("Expired state check failed as expected: {}", e);
            Ok(Json(json!({
                "success": true,
                "message": "Expected error caught",
                "error": e.to_string(),
                "state_tested": oauth_state,
            })))
        }
    }
}

pub async fn debug_state(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let stats = state.oauth.state_stats().await?;
    Ok(Json(json!({
        "success": true,
        "stats": stats,
    })))
}
