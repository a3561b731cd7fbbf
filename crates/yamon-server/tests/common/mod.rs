#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;
use yamon_common::HashKey;
use yamon_server::app;
use yamon_server::state::AppState;
use yamon_storage::{InMemoryStore, Repository, SqliteRepository};

pub const TEST_KEY: &str = "test-secret";

pub struct TestContext {
    pub repo: Arc<dyn Repository>,
    pub app: axum::Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: String,
    pub content_type: Option<String>,
    pub trace_id: Option<String>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("response body should be JSON")
    }
}

fn context_with(repo: Arc<dyn Repository>, key: Option<&str>) -> TestContext {
    let state = AppState::new(repo.clone(), key.and_then(HashKey::new));
    TestContext {
        repo,
        app: app::build_http_app(state),
    }
}

/// In-memory store, no snapshot, no signing key.
pub fn build_test_context() -> TestContext {
    context_with(Arc::new(InMemoryStore::new()), None)
}

/// In-memory store with [`TEST_KEY`] configured.
pub fn build_signed_context() -> TestContext {
    context_with(Arc::new(InMemoryStore::new()), Some(TEST_KEY))
}

pub fn build_sqlite_context() -> TestContext {
    let repo = SqliteRepository::open_in_memory().expect("sqlite should open");
    context_with(Arc::new(repo), None)
}

pub async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<String>) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(body) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(body)
        }
        None => Body::empty(),
    };
    let req = builder.body(body).expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let header_str = |name: &str| {
        resp.headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string())
    };
    let content_type = header_str("content-type");
    let trace_id = header_str("x-trace-id");
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");

    TestResponse {
        status,
        body: String::from_utf8_lossy(&bytes).to_string(),
        content_type,
        trace_id,
    }
}

pub async fn post_json(app: &axum::Router, uri: &str, body: Value) -> TestResponse {
    send(app, "POST", uri, Some(body.to_string())).await
}

pub async fn get(app: &axum::Router, uri: &str) -> TestResponse {
    send(app, "GET", uri, None).await
}

pub async fn post(app: &axum::Router, uri: &str) -> TestResponse {
    send(app, "POST", uri, None).await
}
