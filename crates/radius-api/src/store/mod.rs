//! Relational store over the FreeRADIUS SQL schema
//!
//! FreeRADIUS reads `radcheck`/`radreply`/`radgroup*`/`radusergroup`/`nas`
//! and writes `radacct`/`radpostauth`. This service manages the first set
//! and queries (and occasionally repairs) `radacct`.

pub mod memory;
pub mod mysql;

pub use memory::MemoryStore;
pub use mysql::{DatabaseConfig, MySqlStore};

use crate::partition::MonthlyPartition;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Check item every package carries
pub const SIMULTANEOUS_USE: &str = "1";
/// Interim update interval pushed to the NAS, in seconds
pub const ACCT_INTERIM_INTERVAL: &str = "120";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    /// The row to create is already there
    #[error("{0}")]
    AlreadyExists(String),

    /// The row is still referenced elsewhere
    #[error("{0}")]
    InUse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// LIMIT/OFFSET window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }

    pub(crate) fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

/// One page of rows plus the total row count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub count: i64,
    pub data: Vec<T>,
}

#[derive(Debug, Clone)]
pub struct NewPackage {
    pub package: String,
    pub pool: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSummary {
    pub groupname: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub passwd: String,
    /// Already in FreeRADIUS `DD Mon YYYY HH:MM:SS` form
    pub expdate: String,
    pub package: String,
}

/// A `radcheck` row as returned by `GET /user/:username`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckItem {
    pub username: String,
    pub attribute: String,
    pub value: String,
}

/// Attribute row of `radcheck`, `radreply`, `radgroupcheck` or `radgroupreply`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRow {
    /// `username` or `groupname` depending on the table
    pub owner: String,
    pub attribute: String,
    pub op: String,
    pub value: String,
}

impl AttributeRow {
    pub fn new(owner: &str, attribute: &str, op: &str, value: &str) -> Self {
        Self {
            owner: owner.to_string(),
            attribute: attribute.to_string(),
            op: op.to_string(),
            value: value.to_string(),
        }
    }
}

/// `radacct` row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcctRecord {
    pub radacctid: i64,
    pub username: String,
    pub acctsessionid: String,
    pub acctterminatecause: String,
    pub callingstationid: String,
    pub nasipaddress: String,
    pub acctstarttime: Option<NaiveDateTime>,
    pub acctupdatetime: Option<NaiveDateTime>,
    pub acctstoptime: Option<NaiveDateTime>,
    pub acctsessiontime: Option<i64>,
    pub acctinputoctets: Option<i64>,
    pub acctoutputoctets: Option<i64>,
    pub framedipaddress: String,
}

impl AcctRecord {
    pub fn is_open(&self) -> bool {
        self.acctstoptime.is_none()
    }

    /// Interim update time, falling back to the start time
    pub fn last_seen(&self) -> Option<NaiveDateTime> {
        self.acctupdatetime.or(self.acctstarttime)
    }
}

/// Open `radacct` row as shown by the online endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineSession {
    pub radacctid: i64,
    pub username: String,
    pub acctsessionid: String,
    pub nasipaddress: String,
    pub callingstationid: String,
    pub framedipaddress: String,
    pub acctstarttime: Option<NaiveDateTime>,
    pub acctupdatetime: Option<NaiveDateTime>,
}

impl From<&AcctRecord> for OnlineSession {
    fn from(record: &AcctRecord) -> Self {
        Self {
            radacctid: record.radacctid,
            username: record.username.clone(),
            acctsessionid: record.acctsessionid.clone(),
            nasipaddress: record.nasipaddress.clone(),
            callingstationid: record.callingstationid.clone(),
            framedipaddress: record.framedipaddress.clone(),
            acctstarttime: record.acctstarttime,
            acctupdatetime: record.acctupdatetime,
        }
    }
}

/// `nas` row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NasClient {
    pub nasname: String,
    pub shortname: String,
    #[serde(rename = "type")]
    pub nas_type: String,
    pub secret: String,
    pub description: String,
}

/// `nas` row without the shared secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NasSummary {
    pub nasname: String,
    pub shortname: String,
    #[serde(rename = "type")]
    pub nas_type: String,
    pub description: String,
}

impl From<NasClient> for NasSummary {
    fn from(nas: NasClient) -> Self {
        Self {
            nasname: nas.nasname,
            shortname: nas.shortname,
            nas_type: nas.nas_type,
            description: nas.description,
        }
    }
}

/// Storage operations the management API needs
///
/// Every method fails with [`StoreError::Database`] when the backend is
/// unreachable; the variants listed per method are the domain failures.
#[async_trait]
pub trait RadiusStore: Send + Sync {
    /// Cheap round trip used by the readiness endpoint
    async fn ping(&self) -> Result<(), StoreError>;

    /// Create a group with its default check and reply items
    ///
    /// # Errors
    ///
    /// [`StoreError::AlreadyExists`] if the group has check items already.
    async fn create_package(&self, package: &NewPackage) -> Result<(), StoreError>;

    /// Groups ordered by name, with the total count before paging
    async fn list_packages(&self, page: Page) -> Result<Paginated<PackageSummary>, StoreError>;

    /// A package exists when it has at least one `radgroupcheck` row
    async fn package_exists(&self, package: &str) -> Result<bool, StoreError>;

    /// Remove the group's check and reply items in one transaction
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the package does not exist
    /// - [`StoreError::InUse`] if any user is still assigned to it
    async fn delete_package(&self, package: &str) -> Result<(), StoreError>;

    /// Create a user with password, expiration and group membership
    ///
    /// # Errors
    ///
    /// [`StoreError::AlreadyExists`] if the username has `radcheck` rows.
    async fn create_user(&self, user: &NewUser) -> Result<(), StoreError>;
    async fn user_exists(&self, username: &str) -> Result<bool, StoreError>;

    /// `radcheck` rows of the user; empty when the user does not exist
    async fn user_check_items(&self, username: &str) -> Result<Vec<CheckItem>, StoreError>;

    /// Remove check items, reply items and group membership
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the user does not exist.
    async fn delete_user(&self, username: &str) -> Result<(), StoreError>;

    /// Accounting history of one user in `radacctid` order
    async fn accounting(
        &self,
        username: &str,
        page: Page,
    ) -> Result<Paginated<AcctRecord>, StoreError>;

    /// Every `radacct` row without a stop time
    async fn online_sessions(&self) -> Result<Vec<OnlineSession>, StoreError>;

    /// Open session with this Acct-Session-Id on this NAS, if any
    async fn find_open_session(
        &self,
        acct_session_id: &str,
        nas_ip: &str,
    ) -> Result<Option<OnlineSession>, StoreError>;

    /// # Errors
    ///
    /// [`StoreError::AlreadyExists`] if a row with the same `nasname` exists.
    async fn create_nas(&self, nas: &NasClient) -> Result<(), StoreError>;

    /// NAS row by `nasname`, secret included
    async fn find_nas(&self, nasname: &str) -> Result<Option<NasClient>, StoreError>;
    async fn list_nas(&self, page: Page) -> Result<Paginated<NasSummary>, StoreError>;

    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no row has this `nasname`.
    async fn delete_nas(&self, nasname: &str) -> Result<(), StoreError>;

    /// Open sessions with no sign of life since `cutoff`
    async fn stale_sessions(&self, cutoff: NaiveDateTime) -> Result<Vec<OnlineSession>, StoreError>;

    /// Close open sessions at their last sign of life; returns rows changed
    async fn close_sessions(&self, ids: &[i64], cause: &str) -> Result<u64, StoreError>;

    /// Close every open session of a NAS at `at`; returns rows changed
    ///
    /// A session that started after `at` is stopped at its start time, so the
    /// stop time is never earlier than the start.
    async fn close_nas_sessions(
        &self,
        nas_ip: &str,
        cause: &str,
        at: NaiveDateTime,
    ) -> Result<u64, StoreError>;

    /// Add the monthly partitions that do not exist yet; returns how many were added
    async fn ensure_partitions(
        &self,
        table: &str,
        plan: &[MonthlyPartition],
    ) -> Result<usize, StoreError>;
}

/// Seconds between two timestamps, clamped at zero
pub(crate) fn seconds_between(start: Option<NaiveDateTime>, stop: NaiveDateTime) -> Option<i64> {
    start.map(|start| (stop - start).num_seconds().max(0))
}
