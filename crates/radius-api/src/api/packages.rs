use super::error::ApiError;
use super::models::{check_length, check_page, PackageCreate, StatusResponse};
use super::AppState;
use crate::audit::{AuditEntry, AuditEventType};
use crate::store::{NewPackage, PackageSummary, Paginated};
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

pub async fn create_package(
    State(state): State<AppState>,
    payload: Result<Json<PackageCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<StatusResponse>), ApiError> {
    let Json(body) = payload?;
    body.validate()?;

    state
        .store
        .create_package(&NewPackage {
            package: body.package.clone(),
            pool: body.pool.clone(),
        })
        .await?;

    info!(package = %body.package, pool = %body.pool, "Package created");
    state
        .audit
        .log(
            AuditEntry::new(AuditEventType::PackageCreated)
                .with_package(&body.package)
                .with_details(format!("pool={}", body.pool)),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(StatusResponse::new("Package created successfully")),
    ))
}

pub async fn list_packages(
    State(state): State<AppState>,
    path: Result<Path<(u32, u32)>, PathRejection>,
) -> Result<Json<Paginated<PackageSummary>>, ApiError> {
    let Path((limit, offset)) = path?;
    let page = check_page(limit, offset)?;
    Ok(Json(state.store.list_packages(page).await?))
}

pub async fn delete_package(
    State(state): State<AppState>,
    Path(package): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    check_length("package", &package, 64)?;
    state.store.delete_package(&package).await?;

    info!(package = %package, "Package deleted");
    state
        .audit
        .log(AuditEntry::new(AuditEventType::PackageDeleted).with_package(&package))
        .await;

    Ok(Json(StatusResponse::new("Package deleted successfully")))
}
