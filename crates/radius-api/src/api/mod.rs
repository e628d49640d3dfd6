//! HTTP management API
//!
//! Every route except `/` and the health checks requires
//! `Authorization: Bearer <api_key>`.

mod auth;
pub mod error;
pub mod models;
mod nas;
mod packages;
mod sessions;
mod users;

use crate::audit::AuditLogger;
use crate::coa::CoaClient;
use crate::config::Config;
use crate::health;
use crate::online::OnlineTracker;
use crate::reconcile::Reconciler;
use crate::state::StateBackend;
use crate::store::RadiusStore;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Shared handles for every request
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RadiusStore>,
    pub online: Arc<OnlineTracker>,
    pub coa: Arc<CoaClient>,
    pub reconciler: Arc<Reconciler>,
    pub audit: Arc<AuditLogger>,
    pub api_key: Arc<str>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RadiusStore>,
        cache: Arc<dyn StateBackend>,
        audit: Arc<AuditLogger>,
        config: &Config,
    ) -> Self {
        let online = Arc::new(OnlineTracker::new(
            Arc::clone(&store),
            cache,
            config.online_cache_ttl(),
        ));
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&store),
            Arc::clone(&online),
            Arc::clone(&audit),
            config.reconcile.clone(),
        ));

        Self {
            store,
            online,
            coa: Arc::new(CoaClient::new(config.coa.clone())),
            reconciler,
            audit,
            api_key: Arc::from(config.api_key.as_str()),
        }
    }
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "RADIUS Management API is running" }))
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/package", post(packages::create_package))
        .route("/package/:limit/:offset", get(packages::list_packages))
        .route("/package/:package", delete(packages::delete_package))
        .route("/user", post(users::create_user))
        .route("/user/:username", get(users::get_user).delete(users::delete_user))
        .route("/acct/:username/:limit/:offset", get(users::user_accounting))
        .route("/online", get(sessions::online))
        .route("/onlinecount", get(sessions::online_count))
        .route("/online/:username", get(sessions::online_status))
        .route("/nas", post(nas::create_nas))
        .route("/nas/:limit/:offset", get(nas::list_nas))
        .route("/nas/:nasname", delete(nas::delete_nas))
        .route("/session-dis", post(sessions::disconnect))
        .route("/session-coa", post(sessions::change_authorization))
        .route("/session-reconcile", post(sessions::reconcile))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_bearer));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .merge(health::routes())
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
