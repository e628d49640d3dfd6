//! Shared helpers for the HTTP integration tests

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::NaiveDateTime;
use radius_api::api::{self, AppState};
use radius_api::state::MemoryStateBackend;
use radius_api::store::AcctRecord;
use radius_api::{AuditLogger, Config, MemoryStore};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const TOKEN: &str = "test-api-token";

pub fn test_config() -> Config {
    let mut config = Config {
        api_key: TOKEN.to_string(),
        online_cache_ttl_secs: 0,
        ..Config::default()
    };
    config.coa.timeout_ms = 300;
    config.coa.retries = 0;
    config
}

pub fn app_with(config: &Config) -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(
        store.clone(),
        Arc::new(MemoryStateBackend::new()),
        Arc::new(AuditLogger::disabled()),
        config,
    );
    (api::router(state), store)
}

pub fn app() -> (Router, Arc<MemoryStore>) {
    app_with(&test_config())
}

/// Send a request with the test token; JSON bodies are parsed, text comes back as a string
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    send_with_token(app, method, uri, body, Some(TOKEN)).await
}

pub async fn send_with_token(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}

pub fn open_session(
    user: &str,
    session: &str,
    nas: &str,
    start: NaiveDateTime,
    update: Option<NaiveDateTime>,
) -> AcctRecord {
    AcctRecord {
        radacctid: 0,
        username: user.to_string(),
        acctsessionid: session.to_string(),
        acctterminatecause: String::new(),
        callingstationid: "AA:BB:CC:DD:EE:FF".to_string(),
        nasipaddress: nas.to_string(),
        acctstarttime: Some(start),
        acctupdatetime: update,
        acctstoptime: None,
        acctsessiontime: None,
        acctinputoctets: Some(0),
        acctoutputoctets: Some(0),
        framedipaddress: "10.10.0.2".to_string(),
    }
}
