//! Valkey/Redis cache backend

use super::config::ValkeyConfig;
use super::{StateBackend, StateError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

/// Valkey/Redis cache backend
///
/// Every API replica reads and writes the same online snapshot.
///
/// # Features
///
/// - Reconnection handled by `ConnectionManager`
/// - Per-command timeout with a bounded number of retries
/// - Key prefix so several deployments can share one server
///
/// ```no_run
/// use radius_api::state::{ValkeyConfig, ValkeyStateBackend};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ValkeyConfig::new("redis://localhost:6379").with_key_prefix("isp1:");
/// let backend = ValkeyStateBackend::new(config).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ValkeyStateBackend {
    conn: ConnectionManager,
    config: ValkeyConfig,
}

type RedisFuture<T> = Pin<Box<dyn Future<Output = Result<T, RedisError>> + Send>>;

impl ValkeyStateBackend {
    /// Connect to the configured server
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The URL is invalid
    /// - The server does not answer within `connect_timeout_ms`
    /// - The connection or authentication fails
    pub async fn new(config: ValkeyConfig) -> Result<Self, StateError> {
        let client = Client::open(config.url.clone())
            .map_err(|e| StateError::ConfigError(format!("Invalid Valkey URL: {}", e)))?;

        let conn = tokio::time::timeout(config.connect_timeout(), ConnectionManager::new(client))
            .await
            .map_err(|_| StateError::Timeout(format!("Connecting to {} timed out", config.url)))?
            .map_err(|e| StateError::ConnectionError(format!("Failed to connect to Valkey: {}", e)))?;

        Ok(Self { conn, config })
    }

    fn prefixed_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    /// Run a command with the configured timeout, retrying on failure
    async fn with_retry<F, T>(&self, mut f: F) -> Result<T, StateError>
    where
        F: FnMut(ConnectionManager) -> RedisFuture<T>,
    {
        let mut last_error = StateError::BackendError("no attempt made".to_string());

        for attempt in 0..=self.config.max_retries {
            match tokio::time::timeout(self.config.command_timeout(), f(self.conn.clone())).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => last_error = e.into(),
                Err(_) => {
                    last_error = StateError::Timeout(format!(
                        "command exceeded {:?}",
                        self.config.command_timeout()
                    ))
                }
            }

            if attempt < self.config.max_retries {
                debug!(attempt = attempt + 1, error = %last_error, "Retrying Valkey command");
                tokio::time::sleep(self.config.retry_delay()).await;
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl StateBackend for ValkeyStateBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateError> {
        let key = self.prefixed_key(key);
        self.with_retry(|mut conn| {
            let key = key.clone();
            Box::pin(async move { conn.get(&key).await })
        })
        .await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StateError> {
        let key = self.prefixed_key(key);
        let value = value.to_vec();

        self.with_retry(|mut conn| {
            let key = key.clone();
            let value = value.clone();
            Box::pin(async move {
                match ttl {
                    // PX keeps sub-second TTLs intact
                    Some(ttl) => {
                        let ttl_ms = (ttl.as_millis() as u64).max(1);
                        redis::cmd("SET")
                            .arg(&key)
                            .arg(&value)
                            .arg("PX")
                            .arg(ttl_ms)
                            .query_async(&mut conn)
                            .await
                    }
                    None => conn.set(&key, &value).await,
                }
            })
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StateError> {
        let key = self.prefixed_key(key);
        self.with_retry(|mut conn| {
            let key = key.clone();
            Box::pin(async move { conn.del(&key).await })
        })
        .await
    }

    async fn ping(&self) -> Result<(), StateError> {
        self.with_retry(|mut conn| {
            Box::pin(async move { redis::cmd("PING").query_async(&mut conn).await })
        })
        .await
    }

    fn backend_type(&self) -> &'static str {
        "valkey"
    }
}

impl std::fmt::Debug for ValkeyStateBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValkeyStateBackend")
            .field("url", &self.config.url)
            .field("key_prefix", &self.config.key_prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // docker run -d -p 6379:6379 valkey/valkey:latest
    async fn create_test_backend() -> ValkeyStateBackend {
        let config = ValkeyConfig::new("redis://localhost:6379").with_key_prefix("radius-api-test:");
        ValkeyStateBackend::new(config).await.unwrap()
    }

    #[tokio::test]
    #[ignore] // Requires Valkey server
    async fn test_connection() {
        let backend = create_test_backend().await;
        backend.ping().await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Valkey server
    async fn test_set_get_delete() {
        let backend = create_test_backend().await;

        backend.set("online:snapshot", b"[]", None).await.unwrap();
        assert_eq!(backend.get("online:snapshot").await.unwrap(), Some(b"[]".to_vec()));

        backend.delete("online:snapshot").await.unwrap();
        assert_eq!(backend.get("online:snapshot").await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore] // Requires Valkey server
    async fn test_ttl() {
        let backend = create_test_backend().await;

        backend
            .set("ttl_key", b"value", Some(Duration::from_millis(200)))
            .await
            .unwrap();
        assert!(backend.get("ttl_key").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(backend.get("ttl_key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_url_is_config_error() {
        let result = ValkeyStateBackend::new(ValkeyConfig::new("not a url")).await;
        assert!(matches!(result, Err(StateError::ConfigError(_))));
    }
}
