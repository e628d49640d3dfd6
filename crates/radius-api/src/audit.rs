//! Audit trail of management actions
//!
//! One JSON object per line, so the file can be shipped to a SIEM as-is.
//! Records who changed subscriber data and which sessions were torn down.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    PackageCreated,
    PackageDeleted,
    UserCreated,
    UserDeleted,
    NasCreated,
    NasDeleted,
    SessionDisconnected,
    DisconnectFailed,
    AuthorizationChanged,
    CoaFailed,
    /// Ghost sessions closed by a sweep or a NAS reset
    SessionsReconciled,
    /// Bearer token mismatch
    AuthRejected,
    ServiceStart,
    ServiceStop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unix epoch seconds
    pub timestamp: i64,
    pub timestamp_iso: String,
    pub event_type: AuditEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nas: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub service_version: String,
}

impl AuditEntry {
    pub fn new(event_type: AuditEventType) -> Self {
        let now = Utc::now();
        AuditEntry {
            timestamp: now.timestamp(),
            timestamp_iso: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            event_type,
            username: None,
            package: None,
            nas: None,
            session_id: None,
            details: None,
            service_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    pub fn with_nas(mut self, nas: impl Into<String>) -> Self {
        self.nas = Some(nas.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Append-only JSON-lines writer; a no-op when no path is configured
#[derive(Debug, Default)]
pub struct AuditLogger {
    file_path: Option<String>,
    file: Option<Arc<Mutex<std::fs::File>>>,
}

impl AuditLogger {
    pub fn new(file_path: Option<String>) -> std::io::Result<Self> {
        let file = match file_path {
            Some(ref path) => {
                let f = OpenOptions::new().create(true).append(true).open(path)?;
                Some(Arc::new(Mutex::new(f)))
            }
            None => None,
        };

        Ok(AuditLogger { file_path, file })
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub async fn log(&self, entry: AuditEntry) {
        let Some(ref file) = self.file else {
            return;
        };

        match serde_json::to_string(&entry) {
            Ok(json) => {
                let mut f = file.lock().await;
                if let Err(e) = writeln!(f, "{}", json) {
                    error!(error = %e, "Failed to write audit log");
                }
            }
            Err(e) => error!(error = %e, "Failed to serialize audit entry"),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }
}
