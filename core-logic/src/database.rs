use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::{ConfigError, DatabaseError};

/// Format used for `last_run_*` columns. Lexicographic order matches
/// chronological order.
pub const LAST_RUN_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row of the `wallets` table.
#[derive(Clone, PartialEq)]
pub struct WalletRecord {
    pub address: String,
    pub private_key: String,
    pub proxy: Option<String>,
    pub balance: Option<f64>,
    /// Keyed by task key (`bean`, `kinza`, ...), `None` when never run.
    pub last_runs: BTreeMap<String, Option<NaiveDateTime>>,
}

impl fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletRecord")
            .field("address", &self.address)
            .field("private_key", &"***REDACTED***")
            .field("proxy", &self.proxy.as_ref().map(|_| "***"))
            .field("balance", &self.balance)
            .field("last_runs", &self.last_runs)
            .finish()
    }
}

impl WalletRecord {
    pub fn last_run(&self, task: &str) -> Option<NaiveDateTime> {
        self.last_runs.get(task).copied().flatten()
    }

    pub fn has_proxy(&self) -> bool {
        self.proxy.as_deref().is_some_and(|p| !p.trim().is_empty())
    }

    pub fn balance_or_zero(&self) -> f64 {
        self.balance.unwrap_or(0.0)
    }

    /// Task keys ordered never-run first, then oldest run first.
    /// Ties keep the order of `keys`.
    pub fn tasks_by_staleness<'a>(&self, keys: &[&'a str]) -> Vec<&'a str> {
        let mut ordered: Vec<&'a str> = keys.to_vec();
        // Option ordering puts None before Some, sort_by_key is stable
        ordered.sort_by_key(|k| self.last_run(k));
        ordered
    }
}

/// A single row of the `task_metrics` history table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskRun {
    pub id: i64,
    pub wallet_address: String,
    pub task_name: String,
    pub status: String,
    pub message: String,
    pub duration_ms: i64,
    pub timestamp: i64,
}

#[derive(Debug, Default)]
pub struct DbMetrics {
    pub total_queries: AtomicU64,
    pub total_errors: AtomicU64,
    pub total_inserts: AtomicU64,
    pub total_selects: AtomicU64,
    pub total_updates: AtomicU64,
    pub avg_query_time_ms: AtomicU64,
    pub query_count_for_avg: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
enum QueryKind {
    Insert,
    Select,
    Update,
}

/// SQLite-backed wallet store.
///
/// The `wallets` table carries one `last_run_<task>` column per task key
/// passed to [`DatabaseManager::new`]; missing columns are added on open.
#[derive(Debug)]
pub struct DatabaseManager {
    pool: SqlitePool,
    metrics: Arc<DbMetrics>,
    task_keys: Vec<String>,
}

impl DatabaseManager {
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 20;
    pub const DEFAULT_TIMEOUT_MS: u64 = 30000;

    pub async fn new(db_path: &str, task_keys: &[&str]) -> Result<Self> {
        for key in task_keys {
            validate_task_key(key)?;
        }

        if !Path::new(db_path).exists() {
            std::fs::File::create(db_path).map_err(|e| ConfigError::IoError {
                path: db_path.to_string(),
                msg: e.to_string(),
            })?;
            info!("Created new database file: {}", db_path);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(Self::DEFAULT_MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_millis(Self::DEFAULT_TIMEOUT_MS))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode=WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA synchronous=NORMAL;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(&format!("sqlite://{}", db_path))
            .await
            .map_err(|e| DatabaseError::TransactionFailed { msg: e.to_string() })?;

        let manager = Self {
            pool,
            metrics: Arc::new(DbMetrics::default()),
            task_keys: task_keys.iter().map(|k| k.to_string()).collect(),
        };
        manager.init_schema().await?;
        manager.ensure_task_columns().await?;
        info!(
            "Database initialized with pool size {} (WAL Mode)",
            Self::DEFAULT_MAX_CONNECTIONS
        );
        Ok(manager)
    }

    pub fn task_keys(&self) -> &[String] {
        &self.task_keys
    }

    async fn init_schema(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|_| DatabaseError::PoolExhausted {
                max_size: Self::DEFAULT_MAX_CONNECTIONS,
            })?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS wallets (
                address TEXT PRIMARY KEY,
                private_key TEXT NOT NULL,
                proxy TEXT,
                balance REAL
            );
            CREATE TABLE IF NOT EXISTS task_metrics (
                id INTEGER PRIMARY KEY,
                wallet_address TEXT,
                task_name TEXT,
                status TEXT,
                message TEXT,
                duration_ms INTEGER,
                timestamp INTEGER
            );",
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| DatabaseError::MigrationFailed { msg: e.to_string() })?;

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_task_metrics_wallet ON task_metrics(wallet_address);",
            "CREATE INDEX IF NOT EXISTS idx_task_metrics_task ON task_metrics(task_name);",
        ];
        for idx_sql in indexes {
            if let Err(e) = sqlx::query(idx_sql).execute(&self.pool).await {
                debug!("Index creation skipped (may exist): {}", e);
            }
        }

        Ok(())
    }

    async fn ensure_task_columns(&self) -> Result<()> {
        let rows = sqlx::query("PRAGMA table_info(wallets)")
            .fetch_all(&self.pool)
            .await
            .context("Failed to read wallets schema")?;

        let existing: Vec<String> = rows
            .iter()
            .filter_map(|r| r.try_get::<String, _>("name").ok())
            .collect();

        for key in &self.task_keys {
            let column = last_run_column(key);
            if existing.iter().any(|c| c == &column) {
                continue;
            }
            sqlx::query(&format!("ALTER TABLE wallets ADD COLUMN {} TEXT", column))
                .execute(&self.pool)
                .await
                .map_err(|e| DatabaseError::MigrationFailed {
                    msg: format!("{}: {}", column, e),
                })?;
            info!("Added column {} to wallets", column);
        }
        Ok(())
    }

    /// Inserts a wallet. Returns `false` when the address is already stored;
    /// existing rows are never overwritten.
    pub async fn insert_wallet(
        &self,
        address: &str,
        private_key: &str,
        proxy: Option<&str>,
    ) -> Result<bool> {
        let start = std::time::Instant::now();
        let result = sqlx::query(
            "INSERT OR IGNORE INTO wallets (address, private_key, proxy) VALUES (?, ?, ?)",
        )
        .bind(address)
        .bind(private_key)
        .bind(proxy)
        .execute(&self.pool)
        .await;

        let done = self.track(start, QueryKind::Insert, result, "Failed to insert wallet")?;
        Ok(done.rows_affected() == 1)
    }

    pub async fn get_all_wallets(&self) -> Result<Vec<WalletRecord>> {
        let start = std::time::Instant::now();
        let rows = sqlx::query("SELECT * FROM wallets ORDER BY rowid")
            .fetch_all(&self.pool)
            .await;

        let rows = self.track(start, QueryKind::Select, rows, "Failed to load wallets")?;
        rows.iter().map(|r| self.row_to_record(r)).collect()
    }

    pub async fn get_wallet(&self, address: &str) -> Result<Option<WalletRecord>> {
        let start = std::time::Instant::now();
        let row = sqlx::query("SELECT * FROM wallets WHERE address = ?")
            .bind(address)
            .fetch_optional(&self.pool)
            .await;

        let row = self.track(start, QueryKind::Select, row, "Failed to load wallet")?;
        row.as_ref().map(|r| self.row_to_record(r)).transpose()
    }

    pub async fn count_wallets(&self) -> Result<i64> {
        let start = std::time::Instant::now();
        let row = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM wallets")
            .fetch_one(&self.pool)
            .await;

        let (count,) = self.track(start, QueryKind::Select, row, "Failed to count wallets")?;
        Ok(count)
    }

    pub async fn update_balance(&self, address: &str, balance: f64) -> Result<()> {
        let start = std::time::Instant::now();
        let result = sqlx::query("UPDATE wallets SET balance = ? WHERE address = ?")
            .bind(balance)
            .bind(address)
            .execute(&self.pool)
            .await;

        self.track(start, QueryKind::Update, result, "Failed to update balance")?;
        Ok(())
    }

    /// Stamps `last_run_<task>` with the current local time.
    pub async fn update_last_run(&self, task: &str, address: &str) -> Result<()> {
        self.update_last_run_at(task, address, Local::now().naive_local())
            .await
    }

    pub async fn update_last_run_at(
        &self,
        task: &str,
        address: &str,
        at: NaiveDateTime,
    ) -> Result<()> {
        if !self.task_keys.iter().any(|k| k == task) {
            return Err(DatabaseError::UnknownTask {
                task: task.to_string(),
            }
            .into());
        }

        let start = std::time::Instant::now();
        let query = format!(
            "UPDATE wallets SET {} = ? WHERE address = ?",
            last_run_column(task)
        );
        let result = sqlx::query(&query)
            .bind(at.format(LAST_RUN_FORMAT).to_string())
            .bind(address)
            .execute(&self.pool)
            .await;

        let done = self.track(start, QueryKind::Update, result, "Failed to update last run")?;
        if done.rows_affected() == 0 {
            warn!("update_last_run: no wallet {} in database", address);
        }
        Ok(())
    }

    /// Sets the proxy only when the wallet has none. Returns whether the row
    /// changed.
    pub async fn set_proxy_if_empty(&self, address: &str, proxy: &str) -> Result<bool> {
        let start = std::time::Instant::now();
        let result = sqlx::query(
            "UPDATE wallets SET proxy = ? WHERE address = ? AND (proxy IS NULL OR proxy = '')",
        )
        .bind(proxy)
        .bind(address)
        .execute(&self.pool)
        .await;

        let done = self.track(start, QueryKind::Update, result, "Failed to set proxy")?;
        Ok(done.rows_affected() > 0)
    }

    pub async fn clear_wallets(&self) -> Result<u64> {
        let start = std::time::Instant::now();
        let result = sqlx::query("DELETE FROM wallets").execute(&self.pool).await;

        let done = self.track(start, QueryKind::Update, result, "Failed to clear wallets")?;
        info!("Removed {} wallets from database", done.rows_affected());
        Ok(done.rows_affected())
    }

    pub async fn log_task_result(
        &self,
        wallet: &str,
        task: &str,
        success: bool,
        message: &str,
        duration_ms: u64,
    ) -> Result<()> {
        let start = std::time::Instant::now();
        let status = if success { "SUCCESS" } else { "FAILED" };
        let timestamp = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            "INSERT INTO task_metrics (wallet_address, task_name, status, message, duration_ms, timestamp) VALUES (?, ?, ?, ?, ?, ?)"
        )
        .bind(wallet)
        .bind(task)
        .bind(status)
        .bind(message)
        .bind(duration_ms as i64)
        .bind(timestamp)
        .execute(&self.pool)
        .await;

        self.track(start, QueryKind::Insert, result, "Failed to insert task metric")?;
        Ok(())
    }

    pub async fn get_task_history(&self, wallet: &str, limit: i64) -> Result<Vec<TaskRun>> {
        let start = std::time::Instant::now();
        let rows = sqlx::query_as::<_, TaskRun>(
            "SELECT id, wallet_address, task_name, status, message, duration_ms, timestamp FROM task_metrics WHERE wallet_address = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(wallet)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;

        self.track(start, QueryKind::Select, rows, "Failed to query task history")
    }

    pub async fn get_success_count(&self, wallet: &str) -> Result<i64> {
        let start = std::time::Instant::now();
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM task_metrics WHERE wallet_address = ? AND status = 'SUCCESS'",
        )
        .bind(wallet)
        .fetch_one(&self.pool)
        .await;

        let (count,) = self.track(
            start,
            QueryKind::Select,
            row,
            "Failed to count successful tasks",
        )?;
        Ok(count)
    }

    pub fn get_metrics(&self) -> DbMetricsSnapshot {
        DbMetricsSnapshot {
            total_queries: self.metrics.total_queries.load(Ordering::SeqCst),
            total_errors: self.metrics.total_errors.load(Ordering::SeqCst),
            total_inserts: self.metrics.total_inserts.load(Ordering::SeqCst),
            total_selects: self.metrics.total_selects.load(Ordering::SeqCst),
            total_updates: self.metrics.total_updates.load(Ordering::SeqCst),
            avg_query_time_ms: self.metrics.avg_query_time_ms.load(Ordering::SeqCst),
            timed_queries: self.metrics.query_count_for_avg.load(Ordering::SeqCst),
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database shutdown complete");
    }

    fn row_to_record(&self, row: &SqliteRow) -> Result<WalletRecord> {
        let mut last_runs = BTreeMap::new();
        for key in &self.task_keys {
            let raw: Option<String> = row
                .try_get(last_run_column(key).as_str())
                .with_context(|| format!("Missing column for task {}", key))?;
            last_runs.insert(key.clone(), raw.as_deref().and_then(parse_last_run));
        }

        Ok(WalletRecord {
            address: row.try_get("address")?,
            private_key: row.try_get("private_key")?,
            proxy: row.try_get("proxy")?,
            balance: row.try_get("balance")?,
            last_runs,
        })
    }

    fn track<T>(
        &self,
        start: std::time::Instant,
        kind: QueryKind,
        result: std::result::Result<T, sqlx::Error>,
        context: &'static str,
    ) -> Result<T> {
        let counter = match kind {
            QueryKind::Insert => &self.metrics.total_inserts,
            QueryKind::Select => &self.metrics.total_selects,
            QueryKind::Update => &self.metrics.total_updates,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        self.record_query_time(start, result.is_ok());

        match result {
            Ok(v) => {
                self.metrics.total_queries.fetch_add(1, Ordering::SeqCst);
                Ok(v)
            }
            Err(e) => {
                self.metrics.total_errors.fetch_add(1, Ordering::SeqCst);
                error!("{}: {}", context, e);
                Err(e).context(context)
            }
        }
    }

    fn record_query_time(&self, start: std::time::Instant, success: bool) {
        let elapsed_ms = start.elapsed().as_millis() as u64;
        let count = self.metrics.query_count_for_avg.load(Ordering::SeqCst);
        let current_avg = self.metrics.avg_query_time_ms.load(Ordering::SeqCst);

        if success {
            let new_count = count + 1;
            let new_avg = if count == 0 {
                elapsed_ms
            } else {
                (current_avg * count + elapsed_ms) / new_count
            };
            self.metrics
                .query_count_for_avg
                .store(new_count, Ordering::SeqCst);
            self.metrics
                .avg_query_time_ms
                .store(new_avg, Ordering::SeqCst);
        }
    }
}

#[derive(Debug, Clone)]
pub struct DbMetricsSnapshot {
    pub total_queries: u64,
    pub total_errors: u64,
    pub total_inserts: u64,
    pub total_selects: u64,
    pub total_updates: u64,
    /// Running mean over successful queries.
    pub avg_query_time_ms: u64,
    pub timed_queries: u64,
}

impl DbMetricsSnapshot {
    pub fn error_rate(&self) -> f64 {
        if self.total_queries == 0 {
            0.0
        } else {
            self.total_errors as f64 / self.total_queries as f64 * 100.0
        }
    }
}

fn last_run_column(task: &str) -> String {
    format!("last_run_{}", task)
}

/// Task keys end up in column names, so only `[a-z0-9_]` is accepted.
fn validate_task_key(key: &str) -> Result<(), ConfigError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field: "task_key".to_string(),
            reason: format!("'{}' must match [a-z0-9_]+", key),
        })
    }
}

fn parse_last_run(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, LAST_RUN_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn record(runs: &[(&str, Option<NaiveDateTime>)]) -> WalletRecord {
        WalletRecord {
            address: "0xabc".to_string(),
            private_key: "secret".to_string(),
            proxy: Some("1.2.3.4:80".to_string()),
            balance: Some(1.0),
            last_runs: runs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    #[test]
    fn test_validate_task_key() {
        assert!(validate_task_key("bean").is_ok());
        assert!(validate_task_key("nft_2").is_ok());
        assert!(validate_task_key("").is_err());
        assert!(validate_task_key("bean; DROP TABLE wallets").is_err());
        assert!(validate_task_key("Bean").is_err());
    }

    #[test]
    fn test_parse_last_run_formats() {
        assert_eq!(parse_last_run("2025-03-01 05:00:00"), Some(at(5)));
        assert_eq!(parse_last_run("2025-03-01T05:00:00"), Some(at(5)));
        assert_eq!(parse_last_run("yesterday"), None);
    }

    #[test]
    fn test_tasks_by_staleness_never_run_first() {
        let w = record(&[
            ("bean", Some(at(9))),
            ("kinza", None),
            ("magma", Some(at(3))),
            ("nft", None),
        ]);
        let order = w.tasks_by_staleness(&["bean", "kinza", "magma", "nft"]);
        assert_eq!(order, vec!["kinza", "nft", "magma", "bean"]);
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let w = record(&[]);
        let dbg = format!("{:?}", w);
        assert!(!dbg.contains("secret"));
        assert!(dbg.contains("REDACTED"));
    }

    #[test]
    fn test_has_proxy_ignores_blank() {
        let mut w = record(&[]);
        assert!(w.has_proxy());
        w.proxy = Some("  ".to_string());
        assert!(!w.has_proxy());
        w.proxy = None;
        assert!(!w.has_proxy());
    }
}
