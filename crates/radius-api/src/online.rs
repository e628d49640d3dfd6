//! Online-session view backed by a short-lived cache
//!
//! Counting open `radacct` rows is a full scan on busy installations, and
//! dashboards poll `/online` and `/onlinecount` constantly. The tracker keeps
//! one serialized snapshot in the cache backend and refreshes it from the
//! store when it expires or is invalidated.

use crate::state::StateBackend;
use crate::store::{OnlineSession, RadiusStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const SNAPSHOT_KEY: &str = "online:snapshot";

pub struct OnlineTracker {
    store: Arc<dyn RadiusStore>,
    cache: Arc<dyn StateBackend>,
    ttl: Duration,
}

impl OnlineTracker {
    pub fn new(store: Arc<dyn RadiusStore>, cache: Arc<dyn StateBackend>, ttl: Duration) -> Self {
        Self { store, cache, ttl }
    }

    pub fn cache(&self) -> &Arc<dyn StateBackend> {
        &self.cache
    }

    /// All open sessions; cache failures fall back to the store
    pub async fn sessions(&self) -> Result<Vec<OnlineSession>, StoreError> {
        if self.ttl.is_zero() {
            return self.store.online_sessions().await;
        }

        match self.cache.get(SNAPSHOT_KEY).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<Vec<OnlineSession>>(&bytes) {
                Ok(sessions) => {
                    debug!(sessions = sessions.len(), "Online snapshot served from cache");
                    return Ok(sessions);
                }
                Err(e) => warn!(error = %e, "Discarding unreadable online snapshot"),
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Online cache unavailable, reading from database"),
        }

        let sessions = self.store.online_sessions().await?;
        self.store_snapshot(&sessions).await;
        Ok(sessions)
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.sessions().await?.len())
    }

    pub async fn is_online(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.sessions().await?.iter().any(|s| s.username == username))
    }

    /// Drop the snapshot after sessions were closed
    pub async fn invalidate(&self) {
        if let Err(e) = self.cache.delete(SNAPSHOT_KEY).await {
            warn!(error = %e, "Failed to invalidate online snapshot");
        }
    }

    async fn store_snapshot(&self, sessions: &[OnlineSession]) {
        let bytes = match serde_json::to_vec(sessions) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Failed to serialize online snapshot");
                return;
            }
        };

        if let Err(e) = self.cache.set(SNAPSHOT_KEY, &bytes, Some(self.ttl)).await {
            warn!(error = %e, "Failed to cache online snapshot");
        }
    }
}
