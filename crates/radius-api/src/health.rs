//! Health endpoints for load balancers and Kubernetes liveness/readiness checks
//!
//! The database decides health. A cache outage only degrades the online
//! view, which falls back to the store.

use crate::api::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// healthy, degraded or unhealthy
    pub status: String,
    /// "connected" or "error: <reason>"
    pub database: String,
    pub cache: BackendHealth,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendHealth {
    /// memory or valkey
    pub backend_type: String,
    /// up or down
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status != "unhealthy"
    }
}

async fn check_database(state: &AppState) -> Result<(), String> {
    state.store.ping().await.map_err(|e| e.to_string())
}

async fn check_cache(state: &AppState) -> BackendHealth {
    let cache = state.online.cache();
    let backend_type = cache.backend_type().to_string();
    match cache.ping().await {
        Ok(()) => BackendHealth {
            backend_type,
            status: "up".to_string(),
            error: None,
        },
        Err(e) => BackendHealth {
            backend_type,
            status: "down".to_string(),
            error: Some(e.to_string()),
        },
    }
}

pub async fn check(state: &AppState) -> HealthStatus {
    let database = check_database(state).await;
    let cache = check_cache(state).await;

    let status = match (&database, cache.status.as_str()) {
        (Err(_), _) => "unhealthy",
        (Ok(()), "up") => "healthy",
        (Ok(()), _) => "degraded",
    };

    HealthStatus {
        status: status.to_string(),
        database: match database {
            Ok(()) => "connected".to_string(),
            Err(e) => format!("error: {}", e),
        },
        cache,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

async fn health_handler(State(state): State<AppState>) -> Response {
    let health = check(&state).await;
    let code = if health.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(health)).into_response()
}

async fn ready_handler(State(state): State<AppState>) -> Response {
    match check_database(&state).await {
        Ok(()) => (StatusCode::OK, "ready").into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("database unavailable: {}", e),
        )
            .into_response(),
    }
}

async fn live_handler() -> Response {
    (StatusCode::OK, "alive").into_response()
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/health/ready", get(ready_handler))
        .route("/health/live", get(live_handler))
}
