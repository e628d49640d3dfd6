//! Request bodies, query strings and input validation

use super::error::ApiError;
use crate::coa::AuthorizationChange;
use crate::store::Page;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub const MAX_PAGE_SIZE: u32 = 1000;

/// FreeRADIUS `Expiration` format
const EXPIRATION_FORMAT: &str = "%d %b %Y %H:%M:%S";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub message: String,
}

impl StatusResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackageCreate {
    pub package: String,
    pub pool: String,
}

impl PackageCreate {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_length("package", &self.package, 64)?;
        check_length("pool", &self.pool, 253)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserCreate {
    pub username: String,
    pub passwd: String,
    pub expdate: String,
    pub package: String,
}

impl UserCreate {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_length("username", &self.username, 64)?;
        check_length("passwd", &self.passwd, 253)?;
        check_length("package", &self.package, 64)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NasCreate {
    pub nasname: String,
    pub shortname: String,
    pub secret: String,
    #[serde(rename = "type", default = "default_nas_type")]
    pub nas_type: String,
    #[serde(default = "default_nas_description")]
    pub description: String,
}

fn default_nas_type() -> String {
    "other".to_string()
}

fn default_nas_description() -> String {
    "RADIUS Client".to_string()
}

impl NasCreate {
    /// Column widths of the `nas` table
    pub fn validate(&self) -> Result<(), ApiError> {
        check_length("nasname", &self.nasname, 128)?;
        check_length("shortname", &self.shortname, 32)?;
        check_length("secret", &self.secret, 60)?;
        check_length("type", &self.nas_type, 30)?;
        if self.description.len() > 200 {
            return Err(ApiError::Validation(
                "description must be at most 200 characters".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionQuery {
    pub session: String,
    pub nas: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionCoa {
    pub session: String,
    pub nas: String,
    #[serde(flatten)]
    pub change: AuthorizationChange,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconcileQuery {
    pub nas: Option<String>,
}

pub fn check_length(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    let len = value.chars().count();
    if len == 0 || len > max {
        return Err(ApiError::Validation(format!(
            "{} must be between 1 and {} characters",
            field, max
        )));
    }
    Ok(())
}

pub fn check_page(limit: u32, offset: u32) -> Result<Page, ApiError> {
    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    Ok(Page::new(limit, offset))
}

/// Parse a user-supplied expiry and render it the way FreeRADIUS expects
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`,
/// `DD Mon YYYY` and `DD Mon YYYY HH:MM:SS`.
pub fn normalize_expiration(input: &str) -> Option<String> {
    let input = input.trim();

    const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", EXPIRATION_FORMAT];
    const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d %b %Y"];

    let parsed = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    Some(parsed.format(EXPIRATION_FORMAT).to_string())
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_expiration() {
        assert_eq!(
            normalize_expiration("2025-12-31").as_deref(),
            Some("31 Dec 2025 00:00:00")
        );
        assert_eq!(
            normalize_expiration("2025-01-05 23:59:00").as_deref(),
            Some("05 Jan 2025 23:59:00")
        );
        assert_eq!(
            normalize_expiration("2025-01-05T08:30:00").as_deref(),
            Some("05 Jan 2025 08:30:00")
        );
        assert_eq!(
            normalize_expiration("05 Jan 2025").as_deref(),
            Some("05 Jan 2025 00:00:00")
        );
        assert_eq!(
            normalize_expiration(" 05 Jan 2025 12:00:00 ").as_deref(),
            Some("05 Jan 2025 12:00:00")
        );
        assert_eq!(normalize_expiration("2025-02-30"), None);
        assert_eq!(normalize_expiration("tomorrow"), None);
        assert_eq!(normalize_expiration(""), None);
    }

    #[test]
    fn test_check_length() {
        assert!(check_length("username", "alice", 64).is_ok());
        assert!(check_length("username", "", 64).is_err());
        assert!(check_length("username", &"a".repeat(65), 64).is_err());
        assert!(check_length("username", &"é".repeat(64), 64).is_ok());
    }

    #[test]
    fn test_check_page() {
        assert_eq!(check_page(10, 20).unwrap(), Page::new(10, 20));
        assert!(check_page(0, 0).is_err());
        assert!(check_page(1001, 0).is_err());
    }

    #[test]
    fn test_nas_create_defaults() {
        let nas: NasCreate =
            serde_json::from_str(r#"{"nasname":"10.0.0.1","shortname":"core","secret":"s"}"#).unwrap();
        assert_eq!(nas.nas_type, "other");
        assert_eq!(nas.description, "RADIUS Client");
        assert!(nas.validate().is_ok());
    }

    #[test]
    fn test_session_coa_flattens_change() {
        let body: SessionCoa = serde_json::from_str(
            r#"{"session":"81200004","nas":"10.0.0.1","rate_limit":"5M/5M"}"#,
        )
        .unwrap();
        assert_eq!(body.change.rate_limit.as_deref(), Some("5M/5M"));
        assert!(body.change.session_timeout.is_none());
    }
}
