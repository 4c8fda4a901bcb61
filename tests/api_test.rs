mod helpers;

use axum::http::{Method, StatusCode};
use helpers::*;
use serde_json::json;

// ============================================================================
// Health and authentication
// ============================================================================

#[tokio::test]
async fn test_health_reports_memory_storage() {
    let app = TestApp::spawn().await;
    let (status, body) = app.get("/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "memory");
}

#[tokio::test]
async fn test_register_login_and_me() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({
                "email": "Alice@Example.com",
                "password": TEST_PASSWORD,
                "first_name": "Alice",
                "last_name": "Doe"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert!(body["user"].get("password_hash").is_none());
    assert_eq!(body["wallet"]["currency"], "USDT");
    assert!(body["token"].as_str().is_some());

    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "alice@example.com", "password": TEST_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().expect("token").to_string();

    let (status, body) = app.get("/api/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["first_name"], "Alice");

    let (status, body) = app.get("/api/wallet", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["wallet"]["address"]
        .as_str()
        .map(|a| a.starts_with("0x"))
        .unwrap_or(false));
}

#[tokio::test]
async fn test_register_validation() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .post("/api/auth/register", None, json!({ "email": "a@b.com" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "All fields are required");

    let (status, _) = app
        .post(
            "/api/auth/register",
            None,
            json!({
                "email": "not-an-email",
                "password": TEST_PASSWORD,
                "first_name": "A",
                "last_name": "B"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/auth/register",
            None,
            json!({
                "email": "short@example.com",
                "password": "short",
                "first_name": "A",
                "last_name": "B"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = TestApp::spawn().await;
    app.register("dup@example.com").await;

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({
                "email": "DUP@example.com",
                "password": TEST_PASSWORD,
                "first_name": "A",
                "last_name": "B"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let app = TestApp::spawn().await;
    app.register("bob@example.com").await;

    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "bob@example.com", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");

    let (status, _) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "nobody@example.com", "password": TEST_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let app = TestApp::spawn().await;
    let id = uuid::Uuid::new_v4();

    let routes = vec![
        (Method::GET, "/api/auth/me".to_string()),
        (Method::GET, "/api/wallet".to_string()),
        (Method::POST, "/api/twitter/analyze".to_string()),
        (Method::GET, "/api/twitter/result/task-1".to_string()),
        (Method::GET, "/api/twitter/tasks".to_string()),
        (Method::GET, "/api/twitter/user/jack".to_string()),
        (Method::GET, "/api/x/auth/url".to_string()),
        (Method::POST, "/api/x/auth/callback".to_string()),
        (Method::POST, "/api/x/auth/refresh".to_string()),
        (Method::POST, "/api/x/auth/validate".to_string()),
        (Method::GET, "/api/x/accounts".to_string()),
        (Method::GET, "/api/x/accounts/stats".to_string()),
        (Method::GET, format!("/api/x/accounts/{}", id)),
        (Method::PUT, format!("/api/x/accounts/{}", id)),
        (Method::DELETE, format!("/api/x/accounts/{}", id)),
        (Method::POST, format!("/api/x/accounts/{}/refresh", id)),
        (Method::POST, format!("/api/x/accounts/{}/sync", id)),
        (Method::GET, format!("/api/x/accounts/{}/sync/sync-1", id)),
    ];

    for (method, uri) in routes {
        let body = if method == Method::GET {
            None
        } else {
            Some(json!({}))
        };
        let (status, body) = app.request(method.clone(), &uri, None, body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "User not authenticated");
    }
}

#[tokio::test]
async fn test_invalid_session_token_rejected() {
    let app = TestApp::spawn().await;
    let (status, _) = app.get("/api/auth/me", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Analysis proxy
// ============================================================================

#[tokio::test]
async fn test_analyze_forwards_normalized_request() {
    let app = TestApp::spawn().await;
    let (token, _) = app.register("analyst@example.com").await;

    let (status, body) = app
        .post(
            "/api/twitter/analyze",
            Some(&token),
            json!({ "username": "@elonmusk", "tweets_limit": 20 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task_id"], "task-1");
    assert_eq!(body["received"]["username"], "elonmusk");
    assert_eq!(body["received"]["include_tweets"], true);
    assert_eq!(body["received"]["tweets_limit"], 20);
    assert_eq!(body["received"]["include_followers"], false);
    assert_eq!(body["received"]["include_following"], false);
}

#[tokio::test]
async fn test_analyze_requires_username() {
    let app = TestApp::spawn().await;
    let (token, _) = app.register("analyst2@example.com").await;

    let (status, body) = app
        .post("/api/twitter/analyze", Some(&token), json!({ "username": " " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Username is required");
}

#[tokio::test]
async fn test_analysis_passthrough_routes() {
    let app = TestApp::spawn().await;
    let (token, _) = app.register("analyst3@example.com").await;

    let (status, body) = app.get("/api/twitter/result/task-9", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task_id"], "task-9");

    let (status, body) = app.get("/api/twitter/tasks", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tasks"][0]["task_id"], "task-1");

    let (status, body) = app.get("/api/twitter/user/jack", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "jack");
}

#[tokio::test]
async fn test_analysis_upstream_error_is_server_error() {
    let app = TestApp::spawn().await;
    let (token, _) = app.register("analyst4@example.com").await;

    let (status, body) = app.get("/api/twitter/result/missing", Some(&token)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_analysis_service_unreachable() {
    let (x_base, recorder) = spawn_mock_x().await;
    // Port 9 (discard) is not served locally
    let app = TestApp::with_config(test_config(&x_base, "http://127.0.0.1:9"), recorder);
    let (token, _) = app.register("analyst5@example.com").await;

    let (status, body) = app.get("/api/twitter/tasks", Some(&token)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_malformed_json_body() {
    let app = TestApp::spawn().await;
    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!(["not", "an", "object"])),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}
