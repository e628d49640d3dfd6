//! In-memory cache backend

use super::{StateBackend, StateError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Process-local backend for single-instance deployments and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryStateBackend {
    entries: Arc<DashMap<String, StoredValue>>,
}

#[derive(Debug, Clone)]
struct StoredValue {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

impl MemoryStateBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries
    pub fn cleanup_expired(&self) {
        self.entries.retain(|_, value| !value.is_expired());
    }

    /// Number of stored keys, expired ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl StateBackend for MemoryStateBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateError> {
        match self.entries.get(key) {
            None => return Ok(None),
            Some(value) if !value.is_expired() => return Ok(Some(value.data.clone())),
            Some(_) => {}
        }

        self.entries.remove_if(key, |_, value| value.is_expired());
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StateError> {
        self.entries.insert(
            key.to_string(),
            StoredValue {
                data: value.to_vec(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StateError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StateError> {
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get() {
        let backend = MemoryStateBackend::new();
        assert!(backend.is_empty());

        backend.set("key1", b"value1", None).await.unwrap();

        assert_eq!(backend.get("key1").await.unwrap(), Some(b"value1".to_vec()));
        assert_eq!(backend.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete() {
        let backend = MemoryStateBackend::new();

        backend.set("key1", b"value1", None).await.unwrap();
        backend.delete("key1").await.unwrap();
        backend.delete("key1").await.unwrap();

        assert_eq!(backend.get("key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let backend = MemoryStateBackend::new();

        backend
            .set("key1", b"value1", Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(backend.get("key1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(backend.get("key1").await.unwrap(), None);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let backend = MemoryStateBackend::new();

        backend.set("short", b"a", Some(Duration::from_millis(10))).await.unwrap();
        backend.set("long", b"b", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(backend.len(), 2);
        backend.cleanup_expired();
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_overwrite_resets_ttl() {
        let backend = MemoryStateBackend::new();

        backend.set("key", b"old", Some(Duration::from_millis(10))).await.unwrap();
        backend.set("key", b"new", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(backend.get("key").await.unwrap(), Some(b"new".to_vec()));
    }
}
