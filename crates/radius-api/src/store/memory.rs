//! In-memory store for tests and local development
//!
//! Mirrors the semantics of the SQL queries in [`super::mysql`] closely
//! enough that the HTTP layer can be exercised without a database.

use super::{
    seconds_between, AcctRecord, AttributeRow, CheckItem, NasClient, NasSummary, NewPackage,
    NewUser, OnlineSession, Page, Paginated, PackageSummary, RadiusStore, StoreError,
    ACCT_INTERIM_INTERVAL, SIMULTANEOUS_USE,
};
use crate::partition::MonthlyPartition;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    radcheck: Vec<AttributeRow>,
    radreply: Vec<AttributeRow>,
    radgroupcheck: Vec<AttributeRow>,
    radgroupreply: Vec<AttributeRow>,
    /// (username, groupname)
    radusergroup: Vec<(String, String)>,
    radacct: Vec<AcctRecord>,
    nas: Vec<NasClient>,
    next_radacctid: i64,
}

impl Tables {
    fn group_exists(&self, groupname: &str) -> bool {
        self.radgroupcheck.iter().any(|row| row.owner == groupname)
    }

    fn user_exists(&self, username: &str) -> bool {
        self.radcheck.iter().any(|row| row.owner == username)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a `radacct` row the way FreeRADIUS would; a zero id is assigned
    pub async fn insert_accounting(&self, mut record: AcctRecord) -> i64 {
        let mut tables = self.tables.write().await;
        if record.radacctid == 0 {
            tables.next_radacctid += 1;
            record.radacctid = tables.next_radacctid;
        } else {
            tables.next_radacctid = tables.next_radacctid.max(record.radacctid);
        }
        let id = record.radacctid;
        tables.radacct.push(record);
        id
    }

    pub async fn accounting_record(&self, radacctid: i64) -> Option<AcctRecord> {
        let tables = self.tables.read().await;
        tables.radacct.iter().find(|r| r.radacctid == radacctid).cloned()
    }

    /// `radgroupcheck` and `radgroupreply` rows of a group
    pub async fn group_attributes(&self, groupname: &str) -> (Vec<AttributeRow>, Vec<AttributeRow>) {
        let tables = self.tables.read().await;
        let pick = |rows: &[AttributeRow]| {
            rows.iter()
                .filter(|row| row.owner == groupname)
                .cloned()
                .collect::<Vec<_>>()
        };
        (pick(&tables.radgroupcheck), pick(&tables.radgroupreply))
    }

    pub async fn user_groups(&self, username: &str) -> Vec<String> {
        let tables = self.tables.read().await;
        tables
            .radusergroup
            .iter()
            .filter(|(user, _)| user == username)
            .map(|(_, group)| group.clone())
            .collect()
    }
}

#[async_trait]
impl RadiusStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create_package(&self, package: &NewPackage) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.group_exists(&package.package) {
            return Err(StoreError::AlreadyExists("Package already exists".to_string()));
        }

        let name = package.package.as_str();
        tables
            .radgroupcheck
            .push(AttributeRow::new(name, "Simultaneous-Use", ":=", SIMULTANEOUS_USE));
        tables
            .radgroupreply
            .push(AttributeRow::new(name, "Framed-Pool", "=", &package.pool));
        tables
            .radgroupreply
            .push(AttributeRow::new(name, "Acct-Interim-Interval", "=", ACCT_INTERIM_INTERVAL));
        Ok(())
    }

    async fn list_packages(&self, page: Page) -> Result<Paginated<PackageSummary>, StoreError> {
        let tables = self.tables.read().await;
        let names: BTreeSet<&str> = tables.radgroupcheck.iter().map(|r| r.owner.as_str()).collect();
        let all: Vec<PackageSummary> = names
            .into_iter()
            .map(|name| PackageSummary {
                groupname: name.to_string(),
            })
            .collect();

        Ok(Paginated {
            count: all.len() as i64,
            data: page.slice(&all),
        })
    }

    async fn package_exists(&self, package: &str) -> Result<bool, StoreError> {
        Ok(self.tables.read().await.group_exists(package))
    }

    async fn delete_package(&self, package: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.group_exists(package) {
            return Err(StoreError::NotFound("Package not found".to_string()));
        }
        let members = tables.radusergroup.iter().filter(|(_, g)| g == package).count();
        if members > 0 {
            return Err(StoreError::InUse(format!(
                "Package is assigned to {} user(s)",
                members
            )));
        }

        tables.radgroupcheck.retain(|row| row.owner != package);
        tables.radgroupreply.retain(|row| row.owner != package);
        Ok(())
    }

    async fn create_user(&self, user: &NewUser) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.user_exists(&user.username) {
            return Err(StoreError::AlreadyExists("User already exists".to_string()));
        }

        let name = user.username.as_str();
        tables
            .radcheck
            .push(AttributeRow::new(name, "Cleartext-Password", ":=", &user.passwd));
        tables
            .radcheck
            .push(AttributeRow::new(name, "Expiration", ":=", &user.expdate));
        tables
            .radusergroup
            .push((user.username.clone(), user.package.clone()));
        Ok(())
    }

    async fn user_exists(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.tables.read().await.user_exists(username))
    }

    async fn user_check_items(&self, username: &str) -> Result<Vec<CheckItem>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .radcheck
            .iter()
            .filter(|row| row.owner == username)
            .map(|row| CheckItem {
                username: row.owner.clone(),
                attribute: row.attribute.clone(),
                value: row.value.clone(),
            })
            .collect())
    }

    async fn delete_user(&self, username: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.user_exists(username) {
            return Err(StoreError::NotFound("User not found".to_string()));
        }

        tables.radcheck.retain(|row| row.owner != username);
        tables.radreply.retain(|row| row.owner != username);
        tables.radusergroup.retain(|(user, _)| user != username);
        Ok(())
    }

    async fn accounting(&self, username: &str, page: Page) -> Result<Paginated<AcctRecord>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<AcctRecord> = tables
            .radacct
            .iter()
            .filter(|r| r.username == username)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.radacctid);

        Ok(Paginated {
            count: rows.len() as i64,
            data: page.slice(&rows),
        })
    }

    async fn online_sessions(&self) -> Result<Vec<OnlineSession>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .radacct
            .iter()
            .filter(|r| r.is_open())
            .map(OnlineSession::from)
            .collect())
    }

    async fn find_open_session(
        &self,
        acct_session_id: &str,
        nas_ip: &str,
    ) -> Result<Option<OnlineSession>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .radacct
            .iter()
            .filter(|r| r.is_open() && r.acctsessionid == acct_session_id && r.nasipaddress == nas_ip)
            .max_by_key(|r| r.radacctid)
            .map(OnlineSession::from))
    }

    async fn create_nas(&self, nas: &NasClient) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.nas.iter().any(|n| n.nasname == nas.nasname) {
            return Err(StoreError::AlreadyExists("NAS already exists".to_string()));
        }
        tables.nas.push(nas.clone());
        Ok(())
    }

    async fn find_nas(&self, nasname: &str) -> Result<Option<NasClient>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.nas.iter().find(|n| n.nasname == nasname).cloned())
    }

    async fn list_nas(&self, page: Page) -> Result<Paginated<NasSummary>, StoreError> {
        let tables = self.tables.read().await;
        let mut all = tables.nas.clone();
        all.sort_by(|a, b| a.nasname.cmp(&b.nasname));
        let all: Vec<NasSummary> = all.into_iter().map(NasSummary::from).collect();

        Ok(Paginated {
            count: all.len() as i64,
            data: page.slice(&all),
        })
    }

    async fn delete_nas(&self, nasname: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.nas.len();
        tables.nas.retain(|n| n.nasname != nasname);
        if tables.nas.len() == before {
            return Err(StoreError::NotFound("NAS not found".to_string()));
        }
        Ok(())
    }

    async fn stale_sessions(&self, cutoff: NaiveDateTime) -> Result<Vec<OnlineSession>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .radacct
            .iter()
            .filter(|r| r.is_open() && r.last_seen().is_some_and(|seen| seen < cutoff))
            .map(OnlineSession::from)
            .collect())
    }

    async fn close_sessions(&self, ids: &[i64], cause: &str) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let mut closed = 0;

        for record in tables.radacct.iter_mut() {
            if !record.is_open() || !ids.contains(&record.radacctid) {
                continue;
            }
            let Some(stop) = record.last_seen() else {
                continue;
            };
            record.acctstoptime = Some(stop);
            record.acctsessiontime = seconds_between(record.acctstarttime, stop);
            record.acctterminatecause = cause.to_string();
            closed += 1;
        }

        Ok(closed)
    }

    async fn close_nas_sessions(
        &self,
        nas_ip: &str,
        cause: &str,
        at: NaiveDateTime,
    ) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let mut closed = 0;

        for record in tables
            .radacct
            .iter_mut()
            .filter(|r| r.is_open() && r.nasipaddress == nas_ip)
        {
            let stop = record.acctstarttime.map_or(at, |start| start.max(at));
            record.acctstoptime = Some(stop);
            record.acctsessiontime = seconds_between(record.acctstarttime, stop);
            record.acctterminatecause = cause.to_string();
            closed += 1;
        }

        Ok(closed)
    }

    async fn ensure_partitions(
        &self,
        _table: &str,
        _plan: &[MonthlyPartition],
    ) -> Result<usize, StoreError> {
        Ok(0)
    }
}
