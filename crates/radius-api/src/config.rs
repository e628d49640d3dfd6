use crate::coa::{CoaConfig, MAX_RETRIES, MAX_TIMEOUT_MS};
use crate::partition::PartitionConfig;
use crate::reconcile::{ReconcileConfig, MAX_STALE_AFTER_SECS};
use crate::state::StateConfig;
#[cfg(feature = "valkey")]
use crate::state::{StateBackendType, ValkeyConfig};
use crate::store::DatabaseConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Longest period accepted for background task intervals: one week
const MAX_INTERVAL_SECS: u64 = 7 * 24 * 3600;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Service configuration
///
/// Loaded from JSON, then overridden by the environment variables the
/// container images set (`DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASS`,
/// `DB_NAME`, `API_KEY`, `VALKEY_URL`/`REDIS_URL`, `LOG_LEVEL`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Bearer token every management request must present
    #[serde(default)]
    pub api_key: String,

    /// trace, debug, info, warn, error; `RUST_LOG` takes precedence
    #[serde(default)]
    pub log_level: Option<String>,

    /// JSON-lines audit log; disabled when unset
    #[serde(default)]
    pub audit_log_path: Option<String>,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub state: StateConfig,

    /// Lifetime of the cached online snapshot; 0 disables caching
    #[serde(default = "default_online_cache_ttl_secs")]
    pub online_cache_ttl_secs: u64,

    #[serde(default)]
    pub coa: CoaConfig,

    #[serde(default)]
    pub reconcile: ReconcileConfig,

    #[serde(default)]
    pub partitions: PartitionConfig,
}

fn default_listen_address() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    8000
}

fn default_online_cache_ttl_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_address: default_listen_address(),
            listen_port: default_listen_port(),
            api_key: String::new(),
            log_level: None,
            audit_log_path: None,
            database: DatabaseConfig::default(),
            state: StateConfig::default(),
            online_cache_ttl_secs: default_online_cache_ttl_secs(),
            coa: CoaConfig::default(),
            reconcile: ReconcileConfig::default(),
            partitions: PartitionConfig::default(),
        }
    }
}

impl Config {
    /// Load a JSON file, apply environment overrides and validate
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&contents)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment, for deployments without a config file
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Override fields from `lookup`, normally `std::env::var`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(host) = get("DB_HOST") {
            self.database.host = host;
        }
        if let Some(port) = get("DB_PORT").and_then(|p| p.parse().ok()) {
            self.database.port = port;
        }
        if let Some(user) = get("DB_USER") {
            self.database.user = user;
        }
        if let Some(password) = get("DB_PASS") {
            self.database.password = password;
        }
        if let Some(name) = get("DB_NAME") {
            self.database.name = name;
        }
        if let Some(api_key) = get("API_KEY") {
            self.api_key = api_key;
        }
        if let Some(level) = get("LOG_LEVEL") {
            self.log_level = Some(level);
        }

        #[cfg(feature = "valkey")]
        if let Some(url) = get("VALKEY_URL").or_else(|| get("REDIS_URL")) {
            let valkey = match self.state.valkey.take() {
                Some(existing) => ValkeyConfig { url, ..existing },
                None => ValkeyConfig::new(url),
            };
            self.state.backend = StateBackendType::Valkey;
            self.state.valkey = Some(valkey);
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr: IpAddr = self.listen_address.parse().map_err(|_| {
            ConfigError::Invalid(format!("Invalid listen address: {}", self.listen_address))
        })?;
        Ok(SocketAddr::new(addr, self.listen_port))
    }

    pub fn online_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.online_cache_ttl_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;

        if self.listen_port == 0 {
            return Err(ConfigError::Invalid("Port cannot be 0".to_string()));
        }

        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "api_key cannot be empty (set it in the file or via API_KEY)".to_string(),
            ));
        }

        if self.database.name.is_empty() || self.database.user.is_empty() {
            return Err(ConfigError::Invalid(
                "database name and user cannot be empty".to_string(),
            ));
        }

        if !(1..=MAX_TIMEOUT_MS).contains(&self.coa.timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "coa.timeout_ms must be between 1 and {}",
                MAX_TIMEOUT_MS
            )));
        }
        if self.coa.retries > MAX_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "coa.retries must be at most {}",
                MAX_RETRIES
            )));
        }

        if !(60..=MAX_STALE_AFTER_SECS).contains(&self.reconcile.stale_after_secs) {
            return Err(ConfigError::Invalid(format!(
                "reconcile.stale_after_secs must be between 60 and {}",
                MAX_STALE_AFTER_SECS
            )));
        }
        if !(1..=MAX_INTERVAL_SECS).contains(&self.reconcile.interval_secs) {
            return Err(ConfigError::Invalid(format!(
                "reconcile.interval_secs must be between 1 and {}",
                MAX_INTERVAL_SECS
            )));
        }
        if self.reconcile.terminate_cause.is_empty() || self.reconcile.terminate_cause.len() > 32 {
            return Err(ConfigError::Invalid(
                "reconcile.terminate_cause must be 1 to 32 characters".to_string(),
            ));
        }

        if !(60..=MAX_INTERVAL_SECS).contains(&self.partitions.check_interval_secs) {
            return Err(ConfigError::Invalid(format!(
                "partitions.check_interval_secs must be between 60 and {}",
                MAX_INTERVAL_SECS
            )));
        }
        if !(1..=24).contains(&self.partitions.months_ahead) {
            return Err(ConfigError::Invalid(
                "partitions.months_ahead must be between 1 and 24".to_string(),
            ));
        }
        if let Some(table) = self
            .partitions
            .tables
            .iter()
            .find(|t| !crate::partition::is_valid_table_name(t))
        {
            return Err(ConfigError::Invalid(format!("Invalid partition table name: {}", table)));
        }

        #[cfg(feature = "valkey")]
        if self.state.backend == StateBackendType::Valkey && self.state.valkey.is_none() {
            return Err(ConfigError::Invalid(
                "state.backend is valkey but state.valkey is missing".to_string(),
            ));
        }

        Ok(())
    }

    /// Configuration written when none exists yet
    pub fn example() -> Self {
        Config {
            api_key: "change-me-to-a-long-random-token".to_string(),
            log_level: Some("info".to_string()),
            audit_log_path: Some("/var/log/radius-api/audit.log".to_string()),
            database: DatabaseConfig {
                host: "db".to_string(),
                password: "radpass".to_string(),
                ..DatabaseConfig::default()
            },
            coa: CoaConfig {
                default_secret: Some("testing123".to_string()),
                ..CoaConfig::default()
            },
            ..Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config: Config = serde_json::from_str(r#"{"api_key":"k"}"#).unwrap();
        assert_eq!(config.listen_port, 8000);
        assert_eq!(config.online_cache_ttl(), Duration::from_secs(10));
        assert_eq!(config.coa.port, 3799);
        assert_eq!(config.coa.retries, 1);
        assert_eq!(config.reconcile.stale_after_secs, 360);
        assert_eq!(config.reconcile.terminate_cause, "Stale-Session");
        assert_eq!(config.database.port, 3306);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            ("DB_HOST", "mysql.internal"),
            ("DB_PORT", "3307"),
            ("DB_USER", "freerad"),
            ("DB_PASS", "pw"),
            ("DB_NAME", "raddb"),
            ("API_KEY", "token"),
            ("LOG_LEVEL", "debug"),
        ]));

        assert_eq!(config.database.host, "mysql.internal");
        assert_eq!(config.database.port, 3307);
        assert_eq!(config.database.user, "freerad");
        assert_eq!(config.database.password, "pw");
        assert_eq!(config.database.name, "raddb");
        assert_eq!(config.api_key, "token");
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_env_ignores_empty_and_bad_values() {
        let mut config = Config::example();
        config.apply_env_overrides(env(&[("DB_HOST", ""), ("DB_PORT", "not-a-port")]));
        assert_eq!(config.database.host, "db");
        assert_eq!(config.database.port, 3306);
    }

    #[cfg(feature = "valkey")]
    #[test]
    fn test_env_selects_valkey() {
        let mut config = Config::example();
        config.apply_env_overrides(env(&[("REDIS_URL", "redis://cache:6379")]));
        assert_eq!(config.state.backend, StateBackendType::Valkey);
        assert_eq!(config.state.valkey.as_ref().unwrap().url, "redis://cache:6379");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = Config::example();
        assert!(config.validate().is_ok());

        config.api_key = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::example();
        config.listen_address = "not-an-ip".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::example();
        config.reconcile.stale_after_secs = 30;
        assert!(config.validate().is_err());

        let mut config = Config::example();
        config.partitions.months_ahead = 0;
        assert!(config.validate().is_err());

        let mut config = Config::example();
        config.partitions.tables = vec!["radacct; drop".to_string()];
        assert!(config.validate().is_err());

        let mut config = Config::example();
        config.coa.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_upper_bounds() {
        let mut config = Config::example();
        config.reconcile.stale_after_secs = MAX_STALE_AFTER_SECS;
        config.coa.retries = MAX_RETRIES;
        config.coa.timeout_ms = MAX_TIMEOUT_MS;
        config.reconcile.interval_secs = MAX_INTERVAL_SECS;
        config.partitions.check_interval_secs = MAX_INTERVAL_SECS;
        assert!(config.validate().is_ok());

        let mut config = Config::example();
        config.reconcile.stale_after_secs = u64::MAX;
        assert!(config.validate().is_err());

        let mut config = Config::example();
        config.reconcile.stale_after_secs = MAX_STALE_AFTER_SECS + 1;
        assert!(config.validate().is_err());

        let mut config = Config::example();
        config.coa.retries = u32::MAX;
        assert!(config.validate().is_err());

        let mut config = Config::example();
        config.coa.timeout_ms = MAX_TIMEOUT_MS + 1;
        assert!(config.validate().is_err());

        let mut config = Config::example();
        config.reconcile.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::example();
        config.partitions.check_interval_secs = u64::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let example = Config::example();
        example.to_file(file.path()).unwrap();

        let loaded = Config::from_file(file.path()).unwrap();
        assert_eq!(loaded.coa.default_secret.as_deref(), Some("testing123"));
        assert_eq!(loaded.partitions.tables, vec!["radacct", "radpostauth"]);
    }

    #[test]
    fn test_socket_addr() {
        let config = Config::example();
        assert_eq!(config.socket_addr().unwrap().port(), 8000);
    }
}
