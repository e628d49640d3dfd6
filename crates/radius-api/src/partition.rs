//! Monthly partition maintenance for `radacct` and `radpostauth`
//!
//! Both tables are `PARTITION BY RANGE (TO_DAYS(...))` with one partition
//! per month plus a catch-all `pmax`. New months are split off `pmax`
//! ahead of time so rows never pile up in the catch-all.

use crate::store::{RadiusStore, StoreError};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

/// Name of the MAXVALUE partition
pub const CATCH_ALL: &str = "pmax";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Months to create beyond the current one
    #[serde(default = "default_months_ahead")]
    pub months_ahead: u32,

    #[serde(default = "default_tables")]
    pub tables: Vec<String>,

    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_months_ahead() -> u32 {
    2
}

fn default_tables() -> Vec<String> {
    vec!["radacct".to_string(), "radpostauth".to_string()]
}

fn default_check_interval_secs() -> u64 {
    86400
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            months_ahead: default_months_ahead(),
            tables: default_tables(),
            check_interval_secs: default_check_interval_secs(),
        }
    }
}

/// Partition holding one calendar month
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyPartition {
    /// `pYYYYMM`
    pub name: String,
    /// First day of the following month
    pub less_than: NaiveDate,
}

impl MonthlyPartition {
    pub fn for_month(year: i32, month: u32) -> Option<Self> {
        let (next_year, next_month) = next_month(year, month);
        let less_than = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
        Some(Self {
            name: format!("p{:04}{:02}", year, month),
            less_than,
        })
    }

    fn year_month(&self) -> (i32, u32) {
        let (year, month) = (self.less_than.year(), self.less_than.month());
        if month == 1 {
            (year - 1, 12)
        } else {
            (year, month - 1)
        }
    }

    fn definition(&self) -> String {
        format!(
            "PARTITION {} VALUES LESS THAN (TO_DAYS('{}'))",
            self.name,
            self.less_than.format("%Y-%m-%d")
        )
    }
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// Current month followed by `months_ahead` months
pub fn plan(today: NaiveDate, months_ahead: u32) -> Vec<MonthlyPartition> {
    let (mut year, mut month) = (today.year(), today.month());
    let mut partitions = Vec::with_capacity(months_ahead as usize + 1);

    for _ in 0..=months_ahead {
        if let Some(partition) = MonthlyPartition::for_month(year, month) {
            partitions.push(partition);
        }
        (year, month) = next_month(year, month);
    }

    partitions
}

/// `pYYYYMM` back to (year, month)
pub fn parse_name(name: &str) -> Option<(i32, u32)> {
    let digits = name.strip_prefix('p')?;
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = digits[..4].parse().ok()?;
    let month = digits[4..].parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

/// Planned partitions newer than every existing monthly partition
///
/// Older gaps cannot be filled by splitting `pmax`, so they are skipped.
pub fn missing(plan: &[MonthlyPartition], existing: &[String]) -> Vec<MonthlyPartition> {
    let latest = existing.iter().filter_map(|name| parse_name(name)).max();

    plan.iter()
        .filter(|p| !existing.iter().any(|name| name == &p.name))
        .filter(|p| latest.map_or(true, |latest| p.year_month() > latest))
        .cloned()
        .collect()
}

/// Only plain identifiers are interpolated into DDL
pub fn is_valid_table_name(table: &str) -> bool {
    !table.is_empty() && table.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Split new months off the catch-all partition
pub fn reorganize_statement(table: &str, missing: &[MonthlyPartition]) -> String {
    let mut parts: Vec<String> = missing.iter().map(MonthlyPartition::definition).collect();
    parts.push(format!("PARTITION {} VALUES LESS THAN MAXVALUE", CATCH_ALL));

    format!(
        "ALTER TABLE {} REORGANIZE PARTITION {} INTO ({})",
        table,
        CATCH_ALL,
        parts.join(", ")
    )
}

/// Append months to a table that has no catch-all partition
pub fn add_statement(table: &str, missing: &[MonthlyPartition]) -> String {
    let parts: Vec<String> = missing.iter().map(MonthlyPartition::definition).collect();
    format!("ALTER TABLE {} ADD PARTITION ({})", table, parts.join(", "))
}

/// Bring every configured table up to date; returns partitions added
pub async fn run_once(
    store: &dyn RadiusStore,
    config: &PartitionConfig,
    today: NaiveDate,
) -> Result<usize, StoreError> {
    let planned = plan(today, config.months_ahead);
    let mut added = 0;

    for table in &config.tables {
        let count = store.ensure_partitions(table, &planned).await?;
        if count > 0 {
            info!(table = %table, added = count, "Created monthly partitions");
        } else {
            debug!(table = %table, "Partitions up to date");
        }
        added += count;
    }

    Ok(added)
}

/// Run partition maintenance now and then every `check_interval_secs`
pub fn spawn_maintenance(
    store: Arc<dyn RadiusStore>,
    config: PartitionConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(config.check_interval_secs.max(60)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = run_once(store.as_ref(), &config, Utc::now().date_naive()).await {
                        error!(error = %e, "Partition maintenance failed");
                    }
                }
                _ = shutdown.changed() => {
                    debug!("Partition maintenance stopped");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_plan_crosses_year_boundary() {
        let partitions = plan(date(2024, 11, 17), 2);
        let names: Vec<&str> = partitions.iter().map(|p| p.name.as_str()).collect();

        assert_eq!(names, vec!["p202411", "p202412", "p202501"]);
        assert_eq!(partitions[0].less_than, date(2024, 12, 1));
        assert_eq!(partitions[1].less_than, date(2025, 1, 1));
        assert_eq!(partitions[2].less_than, date(2025, 2, 1));
    }

    #[test]
    fn test_plan_zero_months_ahead_is_current_month() {
        let partitions = plan(date(2024, 2, 29), 0);
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].name, "p202402");
        assert_eq!(partitions[0].less_than, date(2024, 3, 1));
    }

    #[test]
    fn test_parse_name() {
        assert_eq!(parse_name("p202412"), Some((2024, 12)));
        assert_eq!(parse_name("pmax"), None);
        assert_eq!(parse_name("p202413"), None);
        assert_eq!(parse_name("p20241"), None);
    }

    #[test]
    fn test_missing_skips_existing_and_older_months() {
        let planned = plan(date(2024, 5, 2), 2);
        let existing = vec!["p202404".to_string(), "p202405".to_string(), "pmax".to_string()];

        let names: Vec<String> = missing(&planned, &existing).into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["p202406", "p202407"]);

        let ahead = vec!["p202409".to_string(), "pmax".to_string()];
        assert!(missing(&planned, &ahead).is_empty());

        assert_eq!(missing(&planned, &[]).len(), 3);
    }

    #[test]
    fn test_reorganize_statement() {
        let sql = reorganize_statement("radacct", &plan(date(2024, 12, 1), 1));
        assert_eq!(
            sql,
            "ALTER TABLE radacct REORGANIZE PARTITION pmax INTO (\
             PARTITION p202412 VALUES LESS THAN (TO_DAYS('2025-01-01')), \
             PARTITION p202501 VALUES LESS THAN (TO_DAYS('2025-02-01')), \
             PARTITION pmax VALUES LESS THAN MAXVALUE)"
        );
    }

    #[test]
    fn test_add_statement() {
        let sql = add_statement("radpostauth", &plan(date(2024, 3, 10), 0));
        assert_eq!(
            sql,
            "ALTER TABLE radpostauth ADD PARTITION (PARTITION p202403 VALUES LESS THAN (TO_DAYS('2024-04-01')))"
        );
    }

    #[test]
    fn test_table_name_validation() {
        assert!(is_valid_table_name("radacct"));
        assert!(is_valid_table_name("rad_post_auth2"));
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("radacct; DROP TABLE nas"));
        assert!(!is_valid_table_name("db.radacct"));
    }

    #[test]
    fn test_default_config() {
        let config: PartitionConfig = serde_json::from_str("{}").unwrap();
        assert!(config.enabled);
        assert_eq!(config.months_ahead, 2);
        assert_eq!(config.tables, vec!["radacct", "radpostauth"]);
        assert_eq!(config.check_interval_secs, 86400);
    }
}
