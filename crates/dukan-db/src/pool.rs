//! # Database Handle
//!
//! The `Database` struct owns the SQLite pool and hands out the ledger
//! services. Callers never touch connections directly.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig::new(path)                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← opens pool, runs migrations             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  db.orders() / db.debts() / db.stock() / …  ← event-source services    │
//! │       │                                                                 │
//! │       ▼  each mutation = one transaction on one connection             │
//! │  SQLite file (WAL mode)                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! WAL journaling lets reads proceed while a mutation is writing, and
//! SQLite's single-writer model gives each service transaction the
//! per-entity serialization the ledger needs: two mutations of the same
//! product or account can never interleave.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::service::cash::CashService;
use crate::service::debt::DebtService;
use crate::service::order::OrderService;
use crate::service::product::ProductService;
use crate::service::refund::RefundService;
use crate::service::stock::StockService;
use crate::service::store::StoreService;

// =============================================================================
// Configuration
// =============================================================================

/// Pool settings, built with the usual chained setters:
///
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/dukan.db").max_connections(5);
/// ```
///
/// The defaults suit a single-shop back office; nothing here needs
/// tuning until several stores share one file.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file location.
    pub database_path: PathBuf,

    /// Pool size ceiling. Defaults to 5.
    pub max_connections: u32,

    /// Connections kept warm. Defaults to 1.
    pub min_connections: u32,

    /// How long `acquire` waits before giving up. Defaults to 30s.
    pub connect_timeout: Duration,

    /// Idle time before a pooled connection is dropped. Defaults to 10min.
    pub idle_timeout: Duration,

    /// Apply pending migrations during `Database::new`. Defaults to true.
    pub run_migrations: bool,
}

impl DbConfig {
    /// Configuration with defaults for the given file path.
    /// The file is created on first connect if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Configuration backed by an in-memory database. Each call gets
    /// an isolated database, which is what tests want.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1, // a second connection would open a different empty database
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Entry point to the persistence layer.
///
/// Cloning is cheap (the pool is reference-counted); every caller that
/// needs persistence holds a `Database` and asks it for the service it
/// wants.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool against the configured file and applies any
    /// pending migrations. WAL journaling and foreign key enforcement
    /// are switched on here; the rest of the crate assumes both.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        // mode=rwc so a missing file is created instead of rejected
        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            // reads keep going while a transaction is writing
            .journal_mode(SqliteJournalMode::Wal)
            // NORMAL cannot corrupt the file; a crash may lose the last commit
            .synchronous(SqliteSynchronous::Normal)
            // off by default in SQLite
            .foreign_keys(true)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending migrations. `new()` already does this unless the
    /// config says otherwise.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    ///
    /// For advanced queries not covered by the services. Prefer service
    /// methods when available.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Store onboarding (store + its cash account).
    pub fn stores(&self) -> StoreService {
        StoreService::new(self.pool.clone())
    }

    /// Product catalog operations.
    pub fn products(&self) -> ProductService {
        ProductService::new(self.pool.clone())
    }

    /// Manual stock transfers and purchase imports.
    pub fn stock(&self) -> StockService {
        StockService::new(self.pool.clone())
    }

    /// Retail orders.
    pub fn orders(&self) -> OrderService {
        OrderService::new(self.pool.clone())
    }

    /// Debtors and debt documents.
    pub fn debts(&self) -> DebtService {
        DebtService::new(self.pool.clone())
    }

    /// Refunds against order and debt lines.
    pub fn refunds(&self) -> RefundService {
        RefundService::new(self.pool.clone())
    }

    /// Manual cash movements and balance auditing.
    pub fn cash(&self) -> CashService {
        CashService::new(self.pool.clone())
    }

    /// Closes the database connection pool.
    ///
    /// After calling close, all service operations will fail.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let config = DbConfig::in_memory();
        let db = Database::new(config).await.unwrap();

        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
    }
}
