//! Shared harness: the real router over in-memory stores

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use http_body_util::BodyExt;
use hr_server::auth::{APP_KEY_HEADER, ClientMeta, MemorySessionStore, TOKEN_HEADER};
use hr_server::db::MemoryEntityStore;
use hr_server::{AppState, Config, build_app};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const APP_KEY: &str = "test-app-key";
pub const USER: &str = "1105";

pub struct TestApp {
    pub state: AppState,
    pub sessions: MemorySessionStore,
    pub token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_env(&[]).await
    }

    /// Build with extra or overriding environment variables
    pub async fn with_env(overrides: &[(&str, &str)]) -> Self {
        let mut vars: HashMap<String, String> = [
            ("APP_KEY", APP_KEY),
            ("JWT_SECRET_KEY", "integration-session-secret-0123456789"),
            ("JWT_DATA_SECRET_KEY", "integration-data-secret-0123456789"),
            ("DATABASE_URL", "postgres://localhost/unused"),
            ("SUPER_ADMIN", USER),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in overrides {
            vars.insert(k.to_string(), v.to_string());
        }
        let config = Config::from_lookup(|name| vars.get(name).cloned()).unwrap();

        let sessions = MemorySessionStore::new();
        let state = AppState::new(
            &config,
            Arc::new(MemoryEntityStore::new()),
            Arc::new(sessions.clone()),
        );
        let token = state
            .sessions
            .open(USER, &ClientMeta::new("integration-test", "127.0.0.1"))
            .await
            .unwrap();

        Self {
            state,
            sessions,
            token,
        }
    }

    pub fn app(&self) -> Router {
        build_app(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app().oneshot(request).await.unwrap()
    }

    /// Authenticated JSON request, returning the envelope
    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> Value {
        let request = build_request(
            method,
            uri,
            Some(APP_KEY),
            Some(&format!("Bearer {}", self.token)),
            body.map(|b| b.to_string()),
        );
        body_to_json(self.send(request).await.into_body()).await
    }

    pub async fn get(&self, uri: &str) -> Value {
        self.call(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> Value {
        self.call(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> Value {
        self.call(Method::PUT, uri, Some(body)).await
    }

    /// Department 1 and group 1 under it
    pub async fn seed_group(&self) {
        let resp = self
            .post(
                "/department",
                json!([{
                    "department_name_vn": "Phòng nhân sự",
                    "department_name_en": "Human resources",
                    "department_name_jp": "人事部",
                    "department_shortcut": "HR"
                }]),
            )
            .await;
        assert_eq!(resp["status"], true, "{resp}");

        let resp = self
            .post(
                "/group",
                json!([{
                    "department_id": 1,
                    "group_name_vn": "Tuyển dụng",
                    "group_name_en": "Recruiting",
                    "group_name_jp": "採用",
                    "group_shortcut": "REC"
                }]),
            )
            .await;
        assert_eq!(resp["status"], true, "{resp}");
    }
}

/// Request with optional auth headers and raw JSON body
pub fn build_request(
    method: Method,
    uri: &str,
    app_key: Option<&str>,
    token_header: Option<&str>,
    body: Option<String>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = app_key {
        builder = builder.header(APP_KEY_HEADER, key);
    }
    if let Some(token) = token_header {
        builder = builder.header(TOKEN_HEADER, token);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_to_json(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Team payload under group 1
pub fn team(name: &str) -> Value {
    json!({
        "group_id": 1,
        "team_name_vn": name,
        "team_name_en": name,
        "team_name_jp": name
    })
}
