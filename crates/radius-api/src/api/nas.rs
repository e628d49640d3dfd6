use super::error::ApiError;
use super::models::{check_page, NasCreate, StatusResponse};
use super::AppState;
use crate::audit::{AuditEntry, AuditEventType};
use crate::store::{NasClient, NasSummary, Paginated};
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use tracing::info;

/// Register a NAS; parameters come from the query string
pub async fn create_nas(
    State(state): State<AppState>,
    query: Result<Query<NasCreate>, QueryRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Query(params) = query?;
    params.validate()?;

    let nas = NasClient {
        nasname: params.nasname,
        shortname: params.shortname,
        nas_type: params.nas_type,
        secret: params.secret,
        description: params.description,
    };
    state.store.create_nas(&nas).await?;

    info!(nas = %nas.nasname, shortname = %nas.shortname, "NAS created");
    state
        .audit
        .log(
            AuditEntry::new(AuditEventType::NasCreated)
                .with_nas(&nas.nasname)
                .with_details(format!("shortname={} type={}", nas.shortname, nas.nas_type)),
        )
        .await;

    Ok(Json(StatusResponse::new("NAS created successfully")))
}

pub async fn list_nas(
    State(state): State<AppState>,
    path: Result<Path<(u32, u32)>, PathRejection>,
) -> Result<Json<Paginated<NasSummary>>, ApiError> {
    let Path((limit, offset)) = path?;
    let page = check_page(limit, offset)?;
    Ok(Json(state.store.list_nas(page).await?))
}

pub async fn delete_nas(
    State(state): State<AppState>,
    Path(nasname): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.store.delete_nas(&nasname).await?;

    info!(nas = %nasname, "NAS deleted");
    state
        .audit
        .log(AuditEntry::new(AuditEventType::NasDeleted).with_nas(&nasname))
        .await;

    Ok(Json(StatusResponse::new("NAS deleted successfully")))
}
