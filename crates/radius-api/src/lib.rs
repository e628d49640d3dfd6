//! RADIUS Management API
//!
//! HTTP control plane for a FreeRADIUS deployment backed by MySQL. The
//! RADIUS daemon keeps authenticating and accounting on its own; this crate
//! edits the tables it reads and talks to NAS devices directly when a
//! session has to be cut or re-shaped.
//!
//! # Features
//!
//! - Packages (group check/reply attributes) and users
//! - NAS client registry with shared secrets
//! - Online session view with a short-lived cache (in-memory or Valkey)
//! - Packet of Disconnect and CoA-Request (RFC 5176)
//! - Ghost-session reconciliation and monthly partition upkeep
//! - JSON-lines audit log
//!
//! # Example
//!
//! ```rust,no_run
//! use radius_api::{api, AuditLogger, Config, MySqlStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config.json")?;
//!     let store = Arc::new(MySqlStore::connect_lazy(&config.database));
//!     let cache = radius_api::state::connect(&config.state).await?;
//!     let audit = Arc::new(AuditLogger::disabled());
//!
//!     let state = api::AppState::new(store, cache, audit, &config);
//!     let listener = tokio::net::TcpListener::bind(config.socket_addr()?).await?;
//!     axum::serve(listener, api::router(state)).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod audit;
pub mod coa;
pub mod config;
pub mod health;
pub mod online;
pub mod partition;
pub mod reconcile;
pub mod state;
pub mod store;

pub use audit::{AuditEntry, AuditEventType, AuditLogger};
pub use coa::{AuthorizationChange, CoaClient, CoaConfig, CoaError};
pub use config::{Config, ConfigError};
pub use online::OnlineTracker;
pub use reconcile::{ReconcileConfig, ReconcileReport, Reconciler};
pub use store::{DatabaseConfig, MemoryStore, MySqlStore, RadiusStore, StoreError};
