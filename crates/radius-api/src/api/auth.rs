//! Bearer token check for management routes

use super::error::ApiError;
use super::AppState;
use crate::audit::{AuditEntry, AuditEventType};
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

/// Reject requests without `Authorization: Bearer <api_key>`
///
/// No credentials at all is 403, a wrong token is 401.
pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string);

    let Some(token) = token else {
        return Err(ApiError::NotAuthenticated);
    };

    if !constant_time_eq(token.as_bytes(), state.api_key.as_bytes()) {
        let path = request.uri().path().to_string();
        warn!(path = %path, "Rejected request with invalid API token");
        state
            .audit
            .log(
                AuditEntry::new(AuditEventType::AuthRejected)
                    .with_details(format!("invalid token for {}", path)),
            )
            .await;
        return Err(ApiError::InvalidToken);
    }

    Ok(next.run(request).await)
}

/// Token from an `Authorization` value; the scheme is case-insensitive
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer   abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer"), None);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"token", b"token"));
        assert!(!constant_time_eq(b"token", b"tokem"));
        assert!(!constant_time_eq(b"token", b"token2"));
    }
}
