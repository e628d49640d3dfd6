//! Error types for cache backend operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    /// Valkey/Redis unreachable
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Backend error: {0}")]
    BackendError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::SerializationError(format!("JSON error: {}", err))
    }
}

#[cfg(feature = "valkey")]
impl From<redis::RedisError> for StateError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() {
            StateError::ConnectionError(format!("Redis connection error: {}", err))
        } else if err.is_timeout() {
            StateError::Timeout(format!("Redis timeout: {}", err))
        } else {
            StateError::BackendError(format!("Redis error: {}", err))
        }
    }
}
