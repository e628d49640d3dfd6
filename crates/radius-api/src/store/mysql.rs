//! MySQL/MariaDB store over the stock FreeRADIUS schema

use super::{
    AcctRecord, CheckItem, NasClient, NasSummary, NewPackage, NewUser, OnlineSession, Page,
    Paginated, PackageSummary, RadiusStore, StoreError, ACCT_INTERIM_INTERVAL, SIMULTANEOUS_USE,
};
use crate::partition::{self, MonthlyPartition, CATCH_ALL};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{QueryBuilder, Row};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Database connection settings
///
/// Field names follow the `DB_*` environment variables the service has
/// always been deployed with.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Seconds to wait for a pooled connection
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_user() -> String {
    "radius".to_string()
}

fn default_name() -> String {
    "radius".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: String::new(),
            name: default_name(),
            max_connections: default_max_connections(),
            acquire_timeout: default_acquire_timeout(),
        }
    }
}

impl DatabaseConfig {
    /// `user@host:port/name`, safe to log
    pub fn display_target(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.name)
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("target", &self.display_target())
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

/// Columns selected for [`AcctRecord`]
const ACCT_COLUMNS: &str = "radacctid, COALESCE(username, '') AS username, \
     acctsessionid, COALESCE(acctterminatecause, '') AS acctterminatecause, \
     COALESCE(callingstationid, '') AS callingstationid, nasipaddress, \
     acctstarttime, acctupdatetime, acctstoptime, \
     CAST(acctsessiontime AS SIGNED) AS acctsessiontime, \
     acctinputoctets, acctoutputoctets, \
     COALESCE(framedipaddress, '') AS framedipaddress";

/// Columns selected for [`OnlineSession`]
const ONLINE_COLUMNS: &str = "radacctid, COALESCE(username, '') AS username, acctsessionid, \
     nasipaddress, COALESCE(callingstationid, '') AS callingstationid, \
     COALESCE(framedipaddress, '') AS framedipaddress, acctstarttime, acctupdatetime";

pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Build the pool without waiting for the server
    ///
    /// Connections are opened on first use so the API can come up (and
    /// report an unhealthy database) before MySQL is ready.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        debug!(target_db = %config.display_target(), "Creating MySQL connection pool");

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .connect_lazy_with(config.connect_options());

        info!(
            target_db = %config.display_target(),
            max_connections = config.max_connections,
            "MySQL connection pool created"
        );

        Self { pool }
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn count(&self, sql: &str, arg: Option<&str>) -> Result<i64, StoreError> {
        let mut query = sqlx::query(sql);
        if let Some(arg) = arg {
            query = query.bind(arg);
        }
        let row = query.fetch_one(&self.pool).await?;
        Ok(row.try_get("n")?)
    }
}

fn acct_from_row(row: &MySqlRow) -> Result<AcctRecord, sqlx::Error> {
    Ok(AcctRecord {
        radacctid: row.try_get("radacctid")?,
        username: row.try_get("username")?,
        acctsessionid: row.try_get("acctsessionid")?,
        acctterminatecause: row.try_get("acctterminatecause")?,
        callingstationid: row.try_get("callingstationid")?,
        nasipaddress: row.try_get("nasipaddress")?,
        acctstarttime: row.try_get("acctstarttime")?,
        acctupdatetime: row.try_get("acctupdatetime")?,
        acctstoptime: row.try_get("acctstoptime")?,
        acctsessiontime: row.try_get("acctsessiontime")?,
        acctinputoctets: row.try_get("acctinputoctets")?,
        acctoutputoctets: row.try_get("acctoutputoctets")?,
        framedipaddress: row.try_get("framedipaddress")?,
    })
}

fn online_from_row(row: &MySqlRow) -> Result<OnlineSession, sqlx::Error> {
    Ok(OnlineSession {
        radacctid: row.try_get("radacctid")?,
        username: row.try_get("username")?,
        acctsessionid: row.try_get("acctsessionid")?,
        nasipaddress: row.try_get("nasipaddress")?,
        callingstationid: row.try_get("callingstationid")?,
        framedipaddress: row.try_get("framedipaddress")?,
        acctstarttime: row.try_get("acctstarttime")?,
        acctupdatetime: row.try_get("acctupdatetime")?,
    })
}

fn nas_from_row(row: &MySqlRow) -> Result<NasClient, sqlx::Error> {
    Ok(NasClient {
        nasname: row.try_get("nasname")?,
        shortname: row.try_get("shortname")?,
        nas_type: row.try_get("type")?,
        secret: row.try_get("secret")?,
        description: row.try_get("description")?,
    })
}

#[async_trait]
impl RadiusStore for MySqlStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_package(&self, package: &NewPackage) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let existing: i64 = sqlx::query("SELECT COUNT(*) AS n FROM radgroupcheck WHERE groupname = ?")
            .bind(&package.package)
            .fetch_one(&mut *tx)
            .await?
            .try_get("n")?;
        if existing > 0 {
            return Err(StoreError::AlreadyExists("Package already exists".to_string()));
        }

        sqlx::query(
            "INSERT INTO radgroupcheck (groupname, attribute, op, value) \
             VALUES (?, 'Simultaneous-Use', ':=', ?)",
        )
        .bind(&package.package)
        .bind(SIMULTANEOUS_USE)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO radgroupreply (groupname, attribute, op, value) \
             VALUES (?, 'Framed-Pool', '=', ?), (?, 'Acct-Interim-Interval', '=', ?)",
        )
        .bind(&package.package)
        .bind(&package.pool)
        .bind(&package.package)
        .bind(ACCT_INTERIM_INTERVAL)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_packages(&self, page: Page) -> Result<Paginated<PackageSummary>, StoreError> {
        let count = self
            .count("SELECT COUNT(DISTINCT groupname) AS n FROM radgroupcheck", None)
            .await?;

        let rows = sqlx::query(
            "SELECT DISTINCT groupname FROM radgroupcheck ORDER BY groupname LIMIT ? OFFSET ?",
        )
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        let data = rows
            .iter()
            .map(|row| {
                Ok(PackageSummary {
                    groupname: row.try_get("groupname")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(Paginated { count, data })
    }

    async fn package_exists(&self, package: &str) -> Result<bool, StoreError> {
        let n = self
            .count("SELECT COUNT(*) AS n FROM radgroupcheck WHERE groupname = ?", Some(package))
            .await?;
        Ok(n > 0)
    }

    async fn delete_package(&self, package: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // FOR UPDATE holds the group rows until commit
        let checks: i64 = sqlx::query(
            "SELECT COUNT(*) AS n FROM radgroupcheck WHERE groupname = ? FOR UPDATE",
        )
        .bind(package)
        .fetch_one(&mut *tx)
        .await?
        .try_get("n")?;
        if checks == 0 {
            return Err(StoreError::NotFound("Package not found".to_string()));
        }

        let members: i64 = sqlx::query(
            "SELECT COUNT(*) AS n FROM radusergroup WHERE groupname = ? FOR UPDATE",
        )
        .bind(package)
        .fetch_one(&mut *tx)
        .await?
        .try_get("n")?;
        if members > 0 {
            return Err(StoreError::InUse(format!(
                "Package is assigned to {} user(s)",
                members
            )));
        }

        sqlx::query("DELETE FROM radgroupcheck WHERE groupname = ?")
            .bind(package)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM radgroupreply WHERE groupname = ?")
            .bind(package)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn create_user(&self, user: &NewUser) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let existing: i64 = sqlx::query("SELECT COUNT(*) AS n FROM radcheck WHERE username = ?")
            .bind(&user.username)
            .fetch_one(&mut *tx)
            .await?
            .try_get("n")?;
        if existing > 0 {
            return Err(StoreError::AlreadyExists("User already exists".to_string()));
        }

        sqlx::query(
            "INSERT INTO radcheck (username, attribute, op, value) \
             VALUES (?, 'Cleartext-Password', ':=', ?), (?, 'Expiration', ':=', ?)",
        )
        .bind(&user.username)
        .bind(&user.passwd)
        .bind(&user.username)
        .bind(&user.expdate)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO radusergroup (username, groupname) VALUES (?, ?)")
            .bind(&user.username)
            .bind(&user.package)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn user_exists(&self, username: &str) -> Result<bool, StoreError> {
        let n = self
            .count("SELECT COUNT(*) AS n FROM radcheck WHERE username = ?", Some(username))
            .await?;
        Ok(n > 0)
    }

    async fn user_check_items(&self, username: &str) -> Result<Vec<CheckItem>, StoreError> {
        let rows = sqlx::query(
            "SELECT username, attribute, value FROM radcheck WHERE username = ? ORDER BY id",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .iter()
            .map(|row| {
                Ok(CheckItem {
                    username: row.try_get("username")?,
                    attribute: row.try_get("attribute")?,
                    value: row.try_get("value")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(items)
    }

    async fn delete_user(&self, username: &str) -> Result<(), StoreError> {
        if !self.user_exists(username).await? {
            return Err(StoreError::NotFound("User not found".to_string()));
        }

        let mut tx = self.pool.begin().await?;
        for sql in [
            "DELETE FROM radcheck WHERE username = ?",
            "DELETE FROM radreply WHERE username = ?",
            "DELETE FROM radusergroup WHERE username = ?",
        ] {
            sqlx::query(sql).bind(username).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn accounting(&self, username: &str, page: Page) -> Result<Paginated<AcctRecord>, StoreError> {
        let count = self
            .count("SELECT COUNT(*) AS n FROM radacct WHERE username = ?", Some(username))
            .await?;

        let sql = format!(
            "SELECT {} FROM radacct WHERE username = ? ORDER BY radacctid LIMIT ? OFFSET ?",
            ACCT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(username)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;

        let data = rows
            .iter()
            .map(acct_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Paginated { count, data })
    }

    async fn online_sessions(&self) -> Result<Vec<OnlineSession>, StoreError> {
        let sql = format!(
            "SELECT {} FROM radacct WHERE acctstoptime IS NULL ORDER BY radacctid",
            ONLINE_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(online_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn find_open_session(
        &self,
        acct_session_id: &str,
        nas_ip: &str,
    ) -> Result<Option<OnlineSession>, StoreError> {
        let sql = format!(
            "SELECT {} FROM radacct \
             WHERE acctsessionid = ? AND nasipaddress = ? AND acctstoptime IS NULL \
             ORDER BY radacctid DESC LIMIT 1",
            ONLINE_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(acct_session_id)
            .bind(nas_ip)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(online_from_row).transpose()?)
    }

    async fn create_nas(&self, nas: &NasClient) -> Result<(), StoreError> {
        let existing = self
            .count("SELECT COUNT(*) AS n FROM nas WHERE nasname = ?", Some(&nas.nasname))
            .await?;
        if existing > 0 {
            return Err(StoreError::AlreadyExists("NAS already exists".to_string()));
        }

        sqlx::query(
            "INSERT INTO nas (nasname, shortname, type, secret, description) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&nas.nasname)
        .bind(&nas.shortname)
        .bind(&nas.nas_type)
        .bind(&nas.secret)
        .bind(&nas.description)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_nas(&self, nasname: &str) -> Result<Option<NasClient>, StoreError> {
        let row = sqlx::query(
            "SELECT nasname, COALESCE(shortname, '') AS shortname, \
             COALESCE(type, 'other') AS type, secret, \
             COALESCE(description, '') AS description FROM nas WHERE nasname = ? LIMIT 1",
        )
        .bind(nasname)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(nas_from_row).transpose()?)
    }

    async fn list_nas(&self, page: Page) -> Result<Paginated<NasSummary>, StoreError> {
        let count = self.count("SELECT COUNT(*) AS n FROM nas", None).await?;

        let rows = sqlx::query(
            "SELECT nasname, COALESCE(shortname, '') AS shortname, \
             COALESCE(type, 'other') AS type, COALESCE(description, '') AS description \
             FROM nas ORDER BY nasname LIMIT ? OFFSET ?",
        )
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        let data = rows
            .iter()
            .map(|row| {
                Ok(NasSummary {
                    nasname: row.try_get("nasname")?,
                    shortname: row.try_get("shortname")?,
                    nas_type: row.try_get("type")?,
                    description: row.try_get("description")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(Paginated { count, data })
    }

    async fn delete_nas(&self, nasname: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM nas WHERE nasname = ?")
            .bind(nasname)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("NAS not found".to_string()));
        }
        Ok(())
    }

    async fn stale_sessions(&self, cutoff: NaiveDateTime) -> Result<Vec<OnlineSession>, StoreError> {
        let sql = format!(
            "SELECT {} FROM radacct \
             WHERE acctstoptime IS NULL AND COALESCE(acctupdatetime, acctstarttime) < ? \
             ORDER BY radacctid",
            ONLINE_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(cutoff).fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(online_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn close_sessions(&self, ids: &[i64], cause: &str) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        // acctstoptime IS NULL lets a Stop that raced the sweep win
        let mut builder: QueryBuilder<MySql> = QueryBuilder::new(
            "UPDATE radacct SET \
             acctstoptime = COALESCE(acctupdatetime, acctstarttime), \
             acctsessiontime = GREATEST(0, TIMESTAMPDIFF(SECOND, acctstarttime, COALESCE(acctupdatetime, acctstarttime))), \
             acctterminatecause = ",
        );
        builder.push_bind(cause);
        builder.push(
            " WHERE acctstoptime IS NULL \
             AND COALESCE(acctupdatetime, acctstarttime) IS NOT NULL \
             AND radacctid IN (",
        );
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn close_nas_sessions(
        &self,
        nas_ip: &str,
        cause: &str,
        at: NaiveDateTime,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE radacct SET \
             acctstoptime = GREATEST(COALESCE(acctstarttime, ?), ?), \
             acctsessiontime = GREATEST(0, TIMESTAMPDIFF(SECOND, acctstarttime, ?)), \
             acctterminatecause = ? \
             WHERE acctstoptime IS NULL AND nasipaddress = ?",
        )
        .bind(at)
        .bind(at)
        .bind(at)
        .bind(cause)
        .bind(nas_ip)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn ensure_partitions(
        &self,
        table: &str,
        plan: &[MonthlyPartition],
    ) -> Result<usize, StoreError> {
        if !partition::is_valid_table_name(table) {
            return Err(StoreError::InvalidInput(format!("table name {:?}", table)));
        }

        let rows = sqlx::query(
            "SELECT PARTITION_NAME AS name FROM information_schema.PARTITIONS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND PARTITION_NAME IS NOT NULL",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;
        let existing = rows
            .iter()
            .map(|row| row.try_get::<String, _>("name"))
            .collect::<Result<Vec<_>, _>>()?;

        if existing.is_empty() {
            warn!(table = %table, "Table is not partitioned; skipping partition maintenance");
            return Ok(0);
        }

        let missing = partition::missing(plan, &existing);
        if missing.is_empty() {
            return Ok(0);
        }

        let ddl = if existing.iter().any(|name| name == CATCH_ALL) {
            partition::reorganize_statement(table, &missing)
        } else {
            partition::add_statement(table, &missing)
        };
        debug!(table = %table, ddl = %ddl, "Adding partitions");
        sqlx::raw_sql(&ddl).execute(&self.pool).await?;

        Ok(missing.len())
    }
}
