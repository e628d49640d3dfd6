//! Online sessions and Dynamic Authorization endpoints

use super::error::ApiError;
use super::models::{check_length, ReconcileQuery, SessionCoa, SessionQuery, StatusResponse};
use super::AppState;
use crate::audit::{AuditEntry, AuditEventType};
use crate::coa::{CoaError, CoaTarget};
use crate::reconcile::ReconcileReport;
use crate::store::OnlineSession;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use std::net::Ipv4Addr;
use tracing::info;

pub async fn online(State(state): State<AppState>) -> Result<Json<Vec<OnlineSession>>, ApiError> {
    Ok(Json(state.online.sessions().await?))
}

pub async fn online_count(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let total = state.online.count().await?;
    Ok(Json(json!({ "total_online": total })))
}

pub async fn online_status(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.store.user_exists(&username).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    let status = if state.online.is_online(&username).await? {
        "Online"
    } else {
        "Offline"
    };
    Ok(Json(json!({ "status": status })))
}

/// Shared secret, address and known session details for a CoA/PoD request
async fn resolve_target(
    state: &AppState,
    action: &str,
    session: &str,
    nas: &str,
) -> Result<CoaTarget, ApiError> {
    check_length("session", session, 64)?;
    check_length("nas", nas, 128)?;

    let secret = match state.store.find_nas(nas).await? {
        Some(client) => client.secret,
        None => match state.coa.default_secret() {
            Some(secret) => secret.to_string(),
            None => return Err(ApiError::from_coa(action, CoaError::UnknownNas(nas.to_string()))),
        },
    };

    let address = state
        .coa
        .resolve(nas)
        .await
        .map_err(|e| ApiError::from_coa(action, e))?;

    let known = state.store.find_open_session(session, nas).await?;
    let username = known
        .as_ref()
        .map(|s| s.username.clone())
        .filter(|u| !u.is_empty());
    let framed_ip = known
        .as_ref()
        .and_then(|s| s.framedipaddress.parse::<Ipv4Addr>().ok());

    Ok(CoaTarget {
        nas: address,
        secret: secret.into_bytes(),
        acct_session_id: session.to_string(),
        username,
        framed_ip,
    })
}

/// Packet of Disconnect for one session
pub async fn disconnect(
    State(state): State<AppState>,
    query: Result<Query<SessionQuery>, QueryRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    const ACTION: &str = "Session disconnect";
    let Query(params) = query?;
    let target = resolve_target(&state, ACTION, &params.session, &params.nas).await?;

    match state.coa.disconnect(&target).await {
        Ok(outcome) => {
            state.online.invalidate().await;
            info!(
                session = %params.session,
                nas = %params.nas,
                attempts = outcome.attempts,
                "Session disconnected"
            );

            let mut entry = AuditEntry::new(AuditEventType::SessionDisconnected)
                .with_nas(&params.nas)
                .with_session_id(&params.session);
            if let Some(ref username) = target.username {
                entry = entry.with_username(username);
            }
            state.audit.log(entry).await;

            Ok(Json(StatusResponse::new("User session disconnected successfully")))
        }
        Err(e) => {
            state
                .audit
                .log(
                    AuditEntry::new(AuditEventType::DisconnectFailed)
                        .with_nas(&params.nas)
                        .with_session_id(&params.session)
                        .with_details(e.to_string()),
                )
                .await;
            Err(ApiError::from_coa(ACTION, e))
        }
    }
}

/// CoA-Request changing rate limit, session timeout or filter of a live session
pub async fn change_authorization(
    State(state): State<AppState>,
    payload: Result<Json<SessionCoa>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    const ACTION: &str = "Change of authorization";
    let Json(body) = payload?;

    if body.change.is_empty() {
        return Err(ApiError::Validation(
            "at least one of rate_limit, session_timeout or filter_id is required".to_string(),
        ));
    }
    if let Some(ref rate) = body.change.rate_limit {
        check_length("rate_limit", rate, 247)?;
    }
    if let Some(ref filter) = body.change.filter_id {
        check_length("filter_id", filter, 253)?;
    }

    let target = resolve_target(&state, ACTION, &body.session, &body.nas).await?;
    let details = body.change.to_string();

    match state.coa.change_authorization(&target, &body.change).await {
        Ok(outcome) => {
            info!(
                session = %body.session,
                nas = %body.nas,
                change = %details,
                attempts = outcome.attempts,
                "Session authorization changed"
            );
            state
                .audit
                .log(
                    AuditEntry::new(AuditEventType::AuthorizationChanged)
                        .with_nas(&body.nas)
                        .with_session_id(&body.session)
                        .with_details(details),
                )
                .await;
            Ok(Json(StatusResponse::new("Session authorization changed successfully")))
        }
        Err(e) => {
            state
                .audit
                .log(
                    AuditEntry::new(AuditEventType::CoaFailed)
                        .with_nas(&body.nas)
                        .with_session_id(&body.session)
                        .with_details(e.to_string()),
                )
                .await;
            Err(ApiError::from_coa(ACTION, e))
        }
    }
}

/// Close ghost sessions now, or every open session of one NAS
pub async fn reconcile(
    State(state): State<AppState>,
    query: Result<Query<ReconcileQuery>, QueryRejection>,
) -> Result<Json<ReconcileReport>, ApiError> {
    let Query(params) = query?;
    let now = Utc::now().naive_utc();

    let report = match params.nas.as_deref().filter(|nas| !nas.is_empty()) {
        Some(nas) => {
            check_length("nas", nas, 128)?;
            state.reconciler.reset_nas(nas, now).await?
        }
        None => state.reconciler.sweep(now).await?,
    };
    Ok(Json(report))
}
