#![allow(dead_code)]

use axum::http::{header::AUTHORIZATION, HeaderName, HeaderValue};
use axum_test::{multipart::MultipartForm, TestResponse, TestServer};
use serde_json::json;
use socialite::{build_app, AppConfig, AppState};
use tempfile::TempDir;

pub struct TestApp {
    pub server: TestServer,
    /// Keeps the assets directory alive for the duration of the test.
    pub dir: TempDir,
}

pub async fn test_server() -> TestApp {
    test_server_with_env(&[]).await
}

pub async fn test_server_with_secret(secret: &str) -> TestApp {
    test_server_with_env(&[("JWT_SECRET", secret)]).await
}

/// Test server with extra environment overrides on top of the defaults.
pub async fn test_server_with_env(overrides: &[(&str, &str)]) -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let assets = dir.path().join("assets").display().to_string();
    let config = AppConfig::from_lookup(|key| {
        if let Some((_, value)) = overrides.iter().find(|(k, _)| *k == key) {
            return Some(value.to_string());
        }
        match key {
            "JWT_SECRET" => Some("test-secret-key-for-testing-only".into()),
            "ASSETS_DIR" => Some(assets.clone()),
            "PASSWORD_HASH_MEMORY_KIB" => Some("1024".into()),
            "PASSWORD_HASH_ITERATIONS" => Some("1".into()),
            _ => None,
        }
    })
    .expect("config");

    let state = AppState::in_memory(config).await.expect("state");
    let app = build_app(state).expect("app");
    let server = TestServer::new(app).expect("test server");
    TestApp { server, dir }
}

pub fn register_form(email: &str, password: &str) -> MultipartForm {
    MultipartForm::new()
        .add_text("firstName", "Ada")
        .add_text("lastName", "Lovelace")
        .add_text("email", email)
        .add_text("password", password)
        .add_text("location", "London")
        .add_text("occupation", "Mathematician")
}

pub async fn register(server: &TestServer, email: &str, password: &str) -> TestResponse {
    server
        .post("/auth/register")
        .multipart(register_form(email, password))
        .await
}

pub async fn login(server: &TestServer, email: &str, password: &str) -> TestResponse {
    server
        .post("/auth/login")
        .json(&json!({ "email": email, "password": password }))
        .await
}

pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).expect("header value"),
    )
}

/// Registers and logs in, returning `(user id, token)`.
pub async fn signed_up(server: &TestServer, email: &str) -> (String, String) {
    let user: serde_json::Value = register(server, email, "secret").await.json();
    let body: serde_json::Value = login(server, email, "secret").await.json();
    (
        user["id"].as_str().expect("id").to_string(),
        body["token"].as_str().expect("token").to_string(),
    )
}
