//! Cache backend configuration

use serde::{Deserialize, Serialize};
#[cfg(feature = "valkey")]
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StateBackendType {
    /// Process-local cache (default)
    #[default]
    InMemory,

    /// Shared Valkey/Redis cache for multi-replica deployments
    #[cfg(feature = "valkey")]
    Valkey,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StateConfig {
    #[serde(default)]
    pub backend: StateBackendType,

    /// Required when `backend` is `valkey`
    #[cfg(feature = "valkey")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valkey: Option<ValkeyConfig>,
}

impl StateConfig {
    /// Process-local cache; each replica keeps its own snapshot
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Shared Valkey/Redis cache
    #[cfg(feature = "valkey")]
    pub fn valkey(config: ValkeyConfig) -> Self {
        Self {
            backend: StateBackendType::Valkey,
            valkey: Some(config),
        }
    }
}

/// Valkey/Redis connection configuration
#[cfg(feature = "valkey")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValkeyConfig {
    /// `redis://host:port[/db]`, `rediss://` for TLS, or `unix:///path`
    pub url: String,

    /// Namespace for every key written by this service
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[cfg(feature = "valkey")]
fn default_key_prefix() -> String {
    "radius-api:".to_string()
}

#[cfg(feature = "valkey")]
fn default_connect_timeout_ms() -> u64 {
    5000
}

#[cfg(feature = "valkey")]
fn default_command_timeout_ms() -> u64 {
    2000
}

#[cfg(feature = "valkey")]
fn default_max_retries() -> u32 {
    2
}

#[cfg(feature = "valkey")]
fn default_retry_delay_ms() -> u64 {
    100
}

#[cfg(feature = "valkey")]
impl Default for ValkeyConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            key_prefix: default_key_prefix(),
            connect_timeout_ms: default_connect_timeout_ms(),
            command_timeout_ms: default_command_timeout_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[cfg(feature = "valkey")]
impl ValkeyConfig {
    /// Default timeouts and key prefix for the server at `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Replace the `radius-api:` key namespace
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Limit for a single command, retries not included
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Extra attempts after a failed or timed out command
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_config() {
        let config = StateConfig::default();
        assert_eq!(config.backend, StateBackendType::InMemory);
    }

    #[test]
    fn test_backend_parses_from_snake_case() {
        let config: StateConfig = serde_json::from_str(r#"{"backend":"in_memory"}"#).unwrap();
        assert_eq!(config.backend, StateBackendType::InMemory);

        let empty: StateConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.backend, StateBackendType::InMemory);
    }

    #[cfg(feature = "valkey")]
    #[test]
    fn test_valkey_config_builder() {
        let config = ValkeyConfig::new("redis://cache:6379")
            .with_key_prefix("test:")
            .with_command_timeout(Duration::from_millis(500))
            .with_max_retries(0);

        assert_eq!(config.url, "redis://cache:6379");
        assert_eq!(config.key_prefix, "test:");
        assert_eq!(config.command_timeout(), Duration::from_millis(500));
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
    }

    #[cfg(feature = "valkey")]
    #[test]
    fn test_serde_valkey() {
        let json = r#"{"backend":"valkey","valkey":{"url":"redis://10.0.0.5:6379"}}"#;
        let config: StateConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.backend, StateBackendType::Valkey);
        let valkey = config.valkey.unwrap();
        assert_eq!(valkey.key_prefix, "radius-api:");
        assert_eq!(valkey.retry_delay(), Duration::from_millis(100));
    }
}
