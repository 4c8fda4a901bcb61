//! HTTP surface. Every handler returns `AppResult`, so failures render the
//! `{success: false, message}` envelope.

pub mod auth;
pub mod health;
pub mod twitter;
pub mod wallet;
pub mod x_accounts;
pub mod x_auth;

use crate::error::AppError;
use crate::AppState;
use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::routing::{get, post};
use axum::Router;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// JSON body whose rejections are reported as validation errors
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T> FromRequest<Arc<AppState>> for ApiJson<T>
where
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> AppError {
    AppError::Validation(format!("Invalid request body: {}", rejection.body_text()))
}

/// Treat blank strings as absent
pub(crate) fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse an account id path segment; malformed ids are indistinguishable from missing ones
pub(crate) fn account_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw)
        .map_err(|_| AppError::NotFound("Account not found or permission denied".to_string()))
}

pub fn router(state: Arc<AppState>) -> Router {
    let mut api = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/wallet", get(wallet::get_wallet))
        .route("/api/twitter/analyze", post(twitter::analyze))
        .route("/api/twitter/result/:task_id", get(twitter::result))
        .route("/api/twitter/tasks", get(twitter::tasks))
        .route("/api/twitter/user/:username", get(twitter::user))
        .route("/api/x/auth/url", get(x_auth::auth_url))
        .route("/api/x/auth/callback", post(x_auth::callback))
        .route("/api/x/auth/refresh", post(x_auth::refresh))
        .route("/api/x/auth/validate", post(x_auth::validate))
        .route("/api/x/accounts", get(x_accounts::list))
        .route("/api/x/accounts/stats", get(x_accounts::stats))
        .route(
            "/api/x/accounts/:id",
            get(x_accounts::detail)
                .put(x_accounts::update)
                .delete(x_accounts::unbind),
        )
        .route("/api/x/accounts/:id/refresh", post(x_accounts::refresh))
        .route("/api/x/accounts/:id/sync", post(x_accounts::start_sync))
        .route(
            "/api/x/accounts/:id/sync/:sync_id",
            get(x_accounts::sync_status),
        );

    if state.config.enable_test_routes {
        api = api
            .route("/api/x/auth/test/url", get(x_auth::test_url))
            .route("/api/x/auth/test/expired-state", post(x_auth::test_expired_state))
            .route("/api/x/auth/debug/state", get(x_auth::debug_state));
    }

    api.route("/health", get(health::health_check))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
