#![allow(dead_code)]

use axum::body::Body;
use axum::extract::{Form, Path, State};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use social_automation_backend::config::{AnalysisConfig, AppConfig, XOAuthConfig};
use social_automation_backend::{router, AppState};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower::ServiceExt;
use url::Url;

pub const TEST_PASSWORD: &str = "password123";

/// Serve `app` on an ephemeral local port and return its base URL
pub async fn spawn_server(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock server");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{}", addr)
}

// ============================================================================
// Mock X API and OAuth endpoints
// ============================================================================

/// Requests received by the mock X endpoints
#[derive(Default)]
pub struct MockXRecorder {
    pub token_requests: Mutex<Vec<HashMap<String, String>>>,
    pub revoked: Mutex<Vec<String>>,
}

fn bearer(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(String::from)
}

/// Access tokens look like `access-<name>`; the X user behind them is `<name>`
fn user_for_token(token: &str) -> Option<Value> {
    let name = token.strip_prefix("access-")?;
    if name.starts_with("invalid") {
        return None;
    }
    Some(json!({
        "id": format!("x-{}", name),
        "username": name,
        "name": format!("{} on X", name),
        "description": "Automating growth",
        "profile_image_url": format!("https://pbs.twimg.com/{}.png", name),
        "verified": false,
        "protected": false,
        "created_at": "2020-01-01T00:00:00.000Z",
        "public_metrics": {
            "followers_count": 120,
            "following_count": 80,
            "tweet_count": 42,
            "listed_count": 3
        }
    }))
}

async fn mock_token(
    State(recorder): State<Arc<MockXRecorder>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    recorder.token_requests.lock().await.push(form.clone());

    match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") => {
            let code = form.get("code").cloned().unwrap_or_default();
            if code.starts_with("bad") || code == "fake_authorization_code" {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "invalid_grant"})),
                )
                    .into_response();
            }
            let name = code.strip_prefix("code-").unwrap_or(&code);
            Json(json!({
                "token_type": "bearer",
                "expires_in": 7200,
                "access_token": format!("access-{}", name),
                "refresh_token": format!("refresh-{}", name),
                "scope": "users.read offline.access tweet.read follows.read"
            }))
            .into_response()
        }
        Some("refresh_token") => {
            let refresh = form.get("refresh_token").cloned().unwrap_or_default();
            if refresh.starts_with("revoked") {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "invalid_request"})),
                )
                    .into_response();
            }
            let name = refresh.strip_prefix("refresh-").unwrap_or(&refresh);
            // No refresh token in the response: callers keep the old one
            Json(json!({
                "token_type": "bearer",
                "expires_in": 3600,
                "access_token": format!("access-{}", name),
                "scope": "users.read offline.access"
            }))
            .into_response()
        }
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn mock_revoke(
    State(recorder): State<Arc<MockXRecorder>>,
    Form(form): Form<HashMap<String, String>>,
) -> StatusCode {
    if let Some(token) = form.get("token") {
        recorder.revoked.lock().await.push(token.clone());
    }
    StatusCode::OK
}

async fn mock_me(headers: axum::http::HeaderMap) -> Response {
    match bearer(&headers).as_deref().and_then(user_for_token) {
        Some(user) => Json(json!({ "data": user })).into_response(),
        None => (StatusCode::UNAUTHORIZED, Json(json!({"title": "Unauthorized"}))).into_response(),
    }
}

fn user_list(count: usize) -> Value {
    let users: Vec<Value> = (0..count)
        .map(|i| json!({"id": format!("f{}", i), "username": format!("f{}", i), "name": "F"}))
        .collect();
    json!({ "data": users })
}

async fn mock_followers(headers: axum::http::HeaderMap, Path(_id): Path<String>) -> Response {
    if bearer(&headers).as_deref().and_then(user_for_token).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(user_list(3)).into_response()
}

async fn mock_following(headers: axum::http::HeaderMap, Path(_id): Path<String>) -> Response {
    if bearer(&headers).as_deref().and_then(user_for_token).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(user_list(2)).into_response()
}

async fn mock_tweets(Path(_id): Path<String>) -> Response {
    // Tweets are always rate limited in the mock
    StatusCode::TOO_MANY_REQUESTS.into_response()
}

pub async fn spawn_mock_x() -> (String, Arc<MockXRecorder>) {
    let recorder = Arc::new(MockXRecorder::default());
    let app = Router::new()
        .route("/oauth2/token", post(mock_token))
        .route("/oauth2/revoke", post(mock_revoke))
        .route("/users/me", get(mock_me))
        .route("/users/:id/followers", get(mock_followers))
        .route("/users/:id/following", get(mock_following))
        .route("/users/:id/tweets", get(mock_tweets))
        .with_state(recorder.clone());
    (spawn_server(app).await, recorder)
}

// ============================================================================
// Mock analysis service
// ============================================================================

async fn mock_analyze(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "task_id": "task-1", "status": "pending", "received": body }))
}

async fn mock_result(Path(task_id): Path<String>) -> Response {
    if task_id == "missing" {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "not found"}))).into_response();
    }
    Json(json!({ "task_id": task_id, "status": "completed" })).into_response()
}

async fn mock_tasks() -> Json<Value> {
    Json(json!({ "tasks": [{ "task_id": "task-1", "status": "completed" }] }))
}

async fn mock_user(Path(username): Path<String>) -> Json<Value> {
    Json(json!({ "username": username, "followers_count": 10 }))
}

pub async fn spawn_mock_analysis() -> String {
    let app = Router::new()
        .route("/api/analyze", post(mock_analyze))
        .route("/api/analyze/:task_id", get(mock_result))
        .route("/api/tasks", get(mock_tasks))
        .route("/api/user/:username", get(mock_user));
    spawn_server(app).await
}

// ============================================================================
// Application under test
// ============================================================================

pub struct TestApp {
    pub state: Arc<AppState>,
    pub router: Router,
    pub x: Arc<MockXRecorder>,
}

pub fn test_config(x_base: &str, analysis_base: &str) -> AppConfig {
    AppConfig {
        x_oauth: XOAuthConfig {
            client_id: "test-client".to_string(),
            client_secret: "test-secret".to_string(),
            redirect_uri: "http://localhost:3000/auth/x/callback".to_string(),
            token_url: format!("{}/oauth2/token", x_base),
            revoke_url: format!("{}/oauth2/revoke", x_base),
            api_base_url: x_base.to_string(),
            ..XOAuthConfig::default()
        },
        analysis: AnalysisConfig {
            service_url: analysis_base.to_string(),
            timeout_secs: 5,
        },
        ..AppConfig::default()
    }
}

impl TestApp {
    /// In-memory app wired to fresh mock upstreams
    pub async fn spawn() -> Self {
        let (x_base, recorder) = spawn_mock_x().await;
        let analysis_base = spawn_mock_analysis().await;
        Self::with_config(test_config(&x_base, &analysis_base), recorder)
    }

    pub fn with_config(config: AppConfig, x: Arc<MockXRecorder>) -> Self {
        let state = Arc::new(AppState::in_memory(config).expect("Failed to build app state"));
        Self {
            router: router(state.clone()),
            state,
            x,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    /// Register a user and return their session token and id
    pub async fn register(&self, email: &str) -> (String, String) {
        let (status, body) = self
            .post(
                "/api/auth/register",
                None,
                json!({
                    "email": email,
                    "password": TEST_PASSWORD,
                    "first_name": "Test",
                    "last_name": "User"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        (
            body["token"].as_str().expect("token").to_string(),
            body["user"]["id"].as_str().expect("user id").to_string(),
        )
    }

    /// Request an authorization URL for the session and return its state
    pub async fn auth_state(&self, token: &str) -> String {
        let (status, body) = self.get("/api/x/auth/url", Some(token)).await;
        assert_eq!(status, StatusCode::OK, "auth url failed: {}", body);
        body["state"].as_str().expect("state").to_string()
    }

    /// Run the full authorization flow binding the X user `name`
    pub async fn bind(&self, token: &str, name: &str, preferences: Option<Value>) -> Value {
        let state = self.auth_state(token).await;
        let mut body = json!({ "code": format!("code-{}", name), "state": state });
        if let Some(prefs) = preferences {
            body["user_preferences"] = prefs;
        }
        let (status, body) = self.post("/api/x/auth/callback", Some(token), body).await;
        assert_eq!(status, StatusCode::OK, "callback failed: {}", body);
        body["account"].clone()
    }
}

pub fn query_params(url: &str) -> HashMap<String, String> {
    Url::parse(url)
        .expect("Invalid URL")
        .query_pairs()
        .into_owned()
        .collect()
}

/// Poll until every log of a sync run has finished
pub async fn wait_for_sync(app: &TestApp, token: &str, account_id: &str, sync_id: &str) -> Value {
    let uri = format!("/api/x/accounts/{}/sync/{}", account_id, sync_id);
    for _ in 0..100 {
        let (status, body) = app.get(&uri, Some(token)).await;
        assert_eq!(status, StatusCode::OK, "sync status failed: {}", body);
        let finished = body["sync_logs"]
            .as_array()
            .map(|logs| {
                logs.iter().all(|l| {
                    matches!(l["sync_status"].as_str(), Some("completed") | Some("failed"))
                })
            })
            .unwrap_or(false);
        if finished {
            // The account row is written after the last log
            tokio::time::sleep(Duration::from_millis(50)).await;
            return body;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("sync {} did not finish", sync_id);
}

// ============================================================================
// PostgreSQL fixtures
// ============================================================================

use social_automation_backend::repositories::*;
use sqlx::PgPool;

/// Postgres-backed repositories over a `#[sqlx::test]` pool
pub struct TestDatabase {
    pub pool: PgPool,
    pub user_repo: PgUserRepository,
    pub wallet_repo: PgWalletRepository,
    pub x_account_repo: PgXAccountRepository,
    pub sync_log_repo: PgSyncLogRepository,
    pub state_store: PgStateStore,
}

impl TestDatabase {
    pub async fn from_pool(pool: PgPool) -> Self {
        Self {
            user_repo: PgUserRepository::new(pool.clone()),
            wallet_repo: PgWalletRepository::new(pool.clone()),
            x_account_repo: PgXAccountRepository::new(pool.clone()),
            sync_log_repo: PgSyncLogRepository::new(pool.clone()),
            state_store: PgStateStore::new(pool.clone()),
            pool,
        }
    }

    /// Remove all rows, children first
    pub async fn cleanup(&self) {
        for table in [
            "x_account_sync_logs",
            "x_accounts",
            "oauth_states",
            "wallets",
            "users",
        ] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&self.pool)
                .await
                .expect("Failed to clean up table");
        }
    }
}
