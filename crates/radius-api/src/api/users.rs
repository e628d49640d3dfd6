use super::error::ApiError;
use super::models::{check_length, check_page, normalize_expiration, StatusResponse, UserCreate};
use super::AppState;
use crate::audit::{AuditEntry, AuditEventType};
use crate::store::{AcctRecord, NewUser, Paginated};
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<UserCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<StatusResponse>), ApiError> {
    let Json(body) = payload?;
    body.validate()?;

    let expdate = normalize_expiration(&body.expdate).ok_or_else(|| {
        ApiError::Validation(format!(
            "expdate {:?} is not a date (use YYYY-MM-DD or DD Mon YYYY [HH:MM:SS])",
            body.expdate
        ))
    })?;

    if state.store.user_exists(&body.username).await? {
        return Err(ApiError::BadRequest("User already exists".to_string()));
    }
    if !state.store.package_exists(&body.package).await? {
        return Err(ApiError::BadRequest("Package does not exist".to_string()));
    }

    state
        .store
        .create_user(&NewUser {
            username: body.username.clone(),
            passwd: body.passwd,
            expdate: expdate.clone(),
            package: body.package.clone(),
        })
        .await?;

    info!(username = %body.username, package = %body.package, expires = %expdate, "User created");
    state
        .audit
        .log(
            AuditEntry::new(AuditEventType::UserCreated)
                .with_username(&body.username)
                .with_package(&body.package)
                .with_details(format!("expires {}", expdate)),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(StatusResponse::new("User created successfully")),
    ))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let items = state.store.user_check_items(&username).await?;
    if items.is_empty() {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    Ok(Json(json!({ "logdata": items })))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    check_length("username", &username, 64)?;
    state.store.delete_user(&username).await?;

    info!(username = %username, "User deleted");
    state
        .audit
        .log(AuditEntry::new(AuditEventType::UserDeleted).with_username(&username))
        .await;

    Ok(Json(StatusResponse::new("User deleted successfully")))
}

pub async fn user_accounting(
    State(state): State<AppState>,
    path: Result<Path<(String, u32, u32)>, PathRejection>,
) -> Result<Json<Paginated<AcctRecord>>, ApiError> {
    let Path((username, limit, offset)) = path?;
    let page = check_page(limit, offset)?;
    Ok(Json(state.store.accounting(&username, page).await?))
}
