//! Ghost-session reconciliation
//!
//! A session whose Stop was lost stays "online" in `radacct` forever,
//! which blocks Simultaneous-Use and skews usage reports. Interim updates
//! arrive every `Acct-Interim-Interval` seconds, so a session that has been
//! silent for several intervals is closed at its last sign of life.

use crate::audit::{AuditEntry, AuditEventType, AuditLogger};
use crate::online::OnlineTracker;
use crate::store::{OnlineSession, RadiusStore, StoreError};
use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use radius_proto::AcctTerminateCause;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Silence after which an open session counts as a ghost
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// Written to `acctterminatecause` of swept sessions
    #[serde(default = "default_terminate_cause")]
    pub terminate_cause: String,
}

fn default_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    300
}

/// Three missed interim updates at the 120 s interval packages push
fn default_stale_after_secs() -> u64 {
    360
}

fn default_terminate_cause() -> String {
    "Stale-Session".to_string()
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval_secs(),
            stale_after_secs: default_stale_after_secs(),
            terminate_cause: default_terminate_cause(),
        }
    }
}

/// Upper bound for `stale_after_secs`: thirty days
pub const MAX_STALE_AFTER_SECS: u64 = 30 * 24 * 3600;

impl ReconcileConfig {
    /// Silence threshold, capped at [`MAX_STALE_AFTER_SECS`]
    pub fn stale_after(&self) -> ChronoDuration {
        let secs = self.stale_after_secs.min(MAX_STALE_AFTER_SECS);
        ChronoDuration::seconds(i64::try_from(secs).unwrap_or(MAX_STALE_AFTER_SECS as i64))
    }
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Sessions selected for closing
    pub examined: usize,
    /// Rows actually closed; lower than `examined` when a Stop arrived meanwhile
    pub closed: u64,
    pub sessions: Vec<OnlineSession>,
}

pub struct Reconciler {
    store: Arc<dyn RadiusStore>,
    online: Arc<OnlineTracker>,
    audit: Arc<AuditLogger>,
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn RadiusStore>,
        online: Arc<OnlineTracker>,
        audit: Arc<AuditLogger>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            store,
            online,
            audit,
            config,
        }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Close every open session silent since `now - stale_after`
    pub async fn sweep(&self, now: NaiveDateTime) -> Result<ReconcileReport, StoreError> {
        let cutoff = now - self.config.stale_after();
        let stale = self.store.stale_sessions(cutoff).await?;
        if stale.is_empty() {
            debug!(cutoff = %cutoff, "No ghost sessions");
            return Ok(ReconcileReport::default());
        }

        let ids: Vec<i64> = stale.iter().map(|s| s.radacctid).collect();
        let closed = self
            .store
            .close_sessions(&ids, &self.config.terminate_cause)
            .await?;
        self.online.invalidate().await;

        info!(
            examined = stale.len(),
            closed,
            cutoff = %cutoff,
            cause = %self.config.terminate_cause,
            "Closed ghost sessions"
        );
        self.audit
            .log(
                AuditEntry::new(AuditEventType::SessionsReconciled).with_details(format!(
                    "closed {} of {} sessions silent since {}",
                    closed,
                    stale.len(),
                    cutoff
                )),
            )
            .await;

        Ok(ReconcileReport {
            examined: stale.len(),
            closed,
            sessions: stale,
        })
    }

    /// Close every open session of a NAS that rebooted, as Accounting-On would
    pub async fn reset_nas(
        &self,
        nas_ip: &str,
        now: NaiveDateTime,
    ) -> Result<ReconcileReport, StoreError> {
        let sessions: Vec<OnlineSession> = self
            .store
            .online_sessions()
            .await?
            .into_iter()
            .filter(|s| s.nasipaddress == nas_ip)
            .collect();

        let closed = self
            .store
            .close_nas_sessions(nas_ip, AcctTerminateCause::NasReboot.as_str(), now)
            .await?;
        self.online.invalidate().await;

        info!(nas = %nas_ip, closed, "Closed sessions of NAS");
        self.audit
            .log(
                AuditEntry::new(AuditEventType::SessionsReconciled)
                    .with_nas(nas_ip)
                    .with_details(format!("closed {} sessions with NAS-Reboot", closed)),
            )
            .await;

        Ok(ReconcileReport {
            examined: sessions.len(),
            closed,
            sessions,
        })
    }

    /// Sweep every `interval_secs` until shutdown
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = Duration::from_secs(self.config.interval_secs.max(1));
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First tick completes immediately; skip it so startup is not a sweep
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.sweep(Utc::now().naive_utc()).await {
                            error!(error = %e, "Ghost session sweep failed");
                        }
                    }
                    _ = shutdown.changed() => {
                        debug!("Reconciler stopped");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStateBackend;
    use crate::store::{AcctRecord, MemoryStore};
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn open(
        user: &str,
        nas: &str,
        start: NaiveDateTime,
        update: Option<NaiveDateTime>,
    ) -> AcctRecord {
        AcctRecord {
            radacctid: 0,
            username: user.to_string(),
            acctsessionid: format!("{}-1", user),
            acctterminatecause: String::new(),
            callingstationid: String::new(),
            nasipaddress: nas.to_string(),
            acctstarttime: Some(start),
            acctupdatetime: update,
            acctstoptime: None,
            acctsessiontime: None,
            acctinputoctets: None,
            acctoutputoctets: None,
            framedipaddress: String::new(),
        }
    }

    fn reconciler(store: Arc<MemoryStore>) -> (Reconciler, Arc<OnlineTracker>) {
        let online = Arc::new(OnlineTracker::new(
            store.clone(),
            Arc::new(MemoryStateBackend::new()),
            Duration::from_secs(60),
        ));
        let reconciler = Reconciler::new(
            store,
            online.clone(),
            Arc::new(AuditLogger::disabled()),
            ReconcileConfig::default(),
        );
        (reconciler, online)
    }

    #[tokio::test]
    async fn test_sweep_closes_only_silent_sessions() {
        let store = Arc::new(MemoryStore::new());
        let ghost = store
            .insert_accounting(open("alice", "10.0.0.1", at(8, 0), Some(at(9, 0))))
            .await;
        store
            .insert_accounting(open("bob", "10.0.0.1", at(8, 0), Some(at(9, 58))))
            .await;

        let (reconciler, online) = reconciler(store.clone());
        assert_eq!(online.count().await.unwrap(), 2);

        // cutoff is 09:54
        let report = reconciler.sweep(at(10, 0)).await.unwrap();
        assert_eq!(report.examined, 1);
        assert_eq!(report.closed, 1);
        assert_eq!(report.sessions[0].radacctid, ghost);

        let closed = store.accounting_record(ghost).await.unwrap();
        assert_eq!(closed.acctstoptime, Some(at(9, 0)));
        assert_eq!(closed.acctterminatecause, "Stale-Session");
        assert_eq!(closed.acctsessiontime, Some(3600));

        // cache was invalidated
        assert_eq!(online.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sweep_without_ghosts() {
        let store = Arc::new(MemoryStore::new());
        store.insert_accounting(open("alice", "10.0.0.1", at(9, 59), None)).await;

        let (reconciler, _) = reconciler(store);
        let report = reconciler.sweep(at(10, 0)).await.unwrap();
        assert_eq!(report.examined, 0);
        assert_eq!(report.closed, 0);
    }

    #[tokio::test]
    async fn test_reset_nas_uses_nas_reboot() {
        let store = Arc::new(MemoryStore::new());
        let a = store.insert_accounting(open("alice", "10.0.0.1", at(8, 0), None)).await;
        store.insert_accounting(open("bob", "10.0.0.2", at(8, 0), None)).await;

        let (reconciler, _) = reconciler(store.clone());
        let report = reconciler.reset_nas("10.0.0.1", at(10, 0)).await.unwrap();
        assert_eq!(report.closed, 1);
        assert_eq!(report.sessions.len(), 1);

        let closed = store.accounting_record(a).await.unwrap();
        assert_eq!(closed.acctterminatecause, "NAS-Reboot");
        assert_eq!(closed.acctstoptime, Some(at(10, 0)));
        assert_eq!(closed.acctsessiontime, Some(7200));
    }

    #[tokio::test]
    async fn test_reset_nas_never_stops_before_start() {
        let store = Arc::new(MemoryStore::new());
        // NAS clock ahead of ours
        let id = store.insert_accounting(open("alice", "10.0.0.1", at(10, 0), None)).await;

        let (reconciler, _) = reconciler(store.clone());
        let report = reconciler.reset_nas("10.0.0.1", at(8, 0)).await.unwrap();
        assert_eq!(report.closed, 1);

        let closed = store.accounting_record(id).await.unwrap();
        assert_eq!(closed.acctstoptime, Some(at(10, 0)));
        assert_eq!(closed.acctsessiontime, Some(0));
        assert!(closed.acctstoptime >= closed.acctstarttime);
    }

    #[tokio::test]
    async fn test_sweep_with_oversized_threshold() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_accounting(open("alice", "10.0.0.1", at(8, 0), Some(at(9, 0))))
            .await;

        let (_, online) = reconciler(store.clone());
        let config = ReconcileConfig {
            stale_after_secs: u64::MAX,
            ..ReconcileConfig::default()
        };
        assert_eq!(config.stale_after(), ChronoDuration::seconds(MAX_STALE_AFTER_SECS as i64));

        let reconciler =
            Reconciler::new(store, online, Arc::new(AuditLogger::disabled()), config);
        let report = reconciler.sweep(at(10, 0)).await.unwrap();
        assert_eq!(report.examined, 0);
        assert_eq!(report.closed, 0);
    }

    #[tokio::test]
    async fn test_spawn_stops_on_shutdown() {
        let store = Arc::new(MemoryStore::new());
        let (reconciler, _) = reconciler(store);
        let (tx, rx) = watch::channel(false);

        let handle = Arc::new(reconciler).spawn(rx);
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
