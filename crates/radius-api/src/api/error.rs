//! HTTP error type; every error body is `{"detail": "..."}`

use crate::coa::{error_cause_name, CoaError};
use crate::store::StoreError;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    /// NAS answered with a NAK
    #[error("{0}")]
    BadGateway(String),

    /// NAS did not answer
    #[error("{0}")]
    GatewayTimeout(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotAuthenticated => StatusCode::FORBIDDEN,
            ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map a CoA failure, prefixing messages with the action, e.g. "Session disconnect"
    pub fn from_coa(action: &str, err: CoaError) -> Self {
        match err {
            CoaError::UnknownNas(nas) => ApiError::NotFound(format!("Unknown NAS: {}", nas)),
            CoaError::InvalidAddress(nas) => {
                ApiError::Validation(format!("Cannot resolve NAS address: {}", nas))
            }
            CoaError::Packet(e) => ApiError::Validation(e.to_string()),
            CoaError::Timeout { .. } => ApiError::GatewayTimeout(format!("{} timeout", action)),
            CoaError::Nak { error_cause, .. } => ApiError::BadGateway(format!(
                "{} failed: {}",
                action,
                error_cause_name(error_cause)
            )),
            CoaError::Io(e) => ApiError::Internal(format!("{} failed: {}", action, e)),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => ApiError::NotFound(msg),
            StoreError::AlreadyExists(msg) => ApiError::BadRequest(msg),
            StoreError::InUse(msg) => ApiError::Conflict(msg),
            StoreError::InvalidInput(msg) => ApiError::Validation(msg),
            StoreError::Database(e) => {
                error!(error = %e, "Database error");
                ApiError::Internal(format!("Database error: {}", e))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, Json(json!({ "detail": self.to_string() }))).into_response();

        if matches!(self, ApiError::InvalidToken) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
