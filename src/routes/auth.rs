use super::{present, ApiJson};
use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let registration = state
        .user_service
        .register(
            &present(req.email).unwrap_or_default(),
            &req.password.unwrap_or_default(),
            &present(req.first_name).unwrap_or_default(),
            &present(req.last_name).unwrap_or_default(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "user": registration.user,
            "wallet": registration.wallet,
            "token": registration.token,
            "expires_at": registration.expires_at,
            "message": "Registration successful",
        })),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<Json<Value>> {
    let session = state
        .user_service
        .login(
            &req.email.unwrap_or_default(),
            &req.password.unwrap_or_default(),
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "user": session.user,
        "token": session.token,
        "expires_at": session.expires_at,
        "message": "Login successful",
    })))
}

pub async fn me(user: AuthUser) -> Json<Value> {
    Json(json!({
        "success": true,
        "user": user.0,
    }))
}
