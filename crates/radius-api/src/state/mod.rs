//! Shared cache backend for the online-session snapshot
//!
//! A single API instance can keep the snapshot in process memory. Several
//! replicas behind a load balancer should share it through Valkey/Redis so
//! a disconnect on one replica invalidates the view everywhere.
//!
//! ```rust
//! use radius_api::state::{StateBackendType, StateConfig};
//!
//! let config = StateConfig::default();
//! assert_eq!(config.backend, StateBackendType::InMemory);
//! ```

pub mod config;
pub mod error;
pub mod memory;

#[cfg(feature = "valkey")]
pub mod valkey;

pub use config::{StateBackendType, StateConfig};
#[cfg(feature = "valkey")]
pub use config::ValkeyConfig;
pub use error::StateError;
pub use memory::MemoryStateBackend;

#[cfg(feature = "valkey")]
pub use valkey::ValkeyStateBackend;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Key/value storage with per-key expiry
///
/// Keys are flat strings such as `online:snapshot`; distributed backends add
/// their own namespace prefix.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Returns `Ok(None)` for missing or expired keys
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateError>;

    /// Store a value; `None` means no expiry
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StateError>;

    /// Succeeds whether or not the key existed
    async fn delete(&self, key: &str) -> Result<(), StateError>;

    /// Connectivity check used by the health endpoints
    async fn ping(&self) -> Result<(), StateError>;

    /// Short name reported by the health endpoint
    fn backend_type(&self) -> &'static str;
}

/// Build the backend selected in the configuration
pub async fn connect(config: &StateConfig) -> Result<Arc<dyn StateBackend>, StateError> {
    match config.backend {
        StateBackendType::InMemory => Ok(Arc::new(MemoryStateBackend::new())),
        #[cfg(feature = "valkey")]
        StateBackendType::Valkey => {
            let valkey = config.valkey.clone().ok_or_else(|| {
                StateError::ConfigError("backend is valkey but no valkey section is set".to_string())
            })?;
            Ok(Arc::new(ValkeyStateBackend::new(valkey).await?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_in_memory() {
        let backend = connect(&StateConfig::default()).await.unwrap();
        assert_eq!(backend.backend_type(), "memory");
        backend.ping().await.unwrap();
    }
}
