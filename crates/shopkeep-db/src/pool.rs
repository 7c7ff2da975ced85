//! # Connection Pool
//!
//! One `SqlitePool` is opened when the server starts and every request
//! shares it.
//!
//! ## Who Holds What
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  main.rs                                                               │
//! │    DbConfig (path, max_connections) ──► Database::new                  │
//! │                                             │ open pool, apply schema  │
//! │                                             ▼                          │
//! │  AppState { db: Database }  ◄──── cloned into every axum handler       │
//! │       │                                                                 │
//! │       ├── db.batches()    ─┐  each accessor wraps a clone of the same  │
//! │       ├── db.invoices()    │  pool; a repository borrows a connection  │
//! │       ├── db.debts()       │  per query, or holds one for the length   │
//! │       └── db.orders() ... ─┘  of a checkout / return / payment tx      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Connection Settings
//! - `journal_mode = WAL` (files only): reports and the storefront keep
//!   reading while a checkout transaction writes.
//! - `synchronous = NORMAL`: a crash can lose the last commit, never corrupt
//!   the file.
//! - `foreign_keys = ON`: an invoice item must belong to an invoice, a debt
//!   to its invoice and its customer or supplier, a payment to its debt.
//!   SQLite leaves these unchecked unless asked per connection.
//! - `busy_timeout`: a second writer waits for the lock instead of failing.
//!
//! An in-memory database lives inside its one connection, so that
//! connection is never recycled.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations::{self, MigrationStatus};
use crate::repository::{
    BatchRepository, CustomerRepository, DebtRepository, InvoiceRepository, OrderRepository,
    ReportRepository, SupplierRepository,
};

/// Where the shop's data lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    /// Throwaway database for tests and demos.
    Memory,
}

/// How to open the shop database.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/shopkeep/shop.db").max_connections(8);
/// let db = Database::new(config).await?;
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub location: DbLocation,
    pub max_connections: u32,
    /// How long a handler waits for a free connection.
    pub acquire_timeout: Duration,
    /// How long a writer waits on SQLite's lock.
    pub busy_timeout: Duration,
    /// Apply embedded migrations on open.
    pub run_migrations: bool,
}

impl DbConfig {
    /// A database file, created on first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            location: DbLocation::File(path.into()),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(10),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    pub fn in_memory() -> Self {
        DbConfig {
            location: DbLocation::Memory,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            ..DbConfig::new(":memory:")
        }
    }

    /// Ignored for in-memory databases, which keep a single connection.
    pub fn max_connections(mut self, max: u32) -> Self {
        if self.location != DbLocation::Memory {
            self.max_connections = max.max(1);
        }
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = match &self.location {
            DbLocation::Memory => SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?,
            DbLocation::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal),
        };

        Ok(options
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout))
    }

    fn describe(&self) -> String {
        match &self.location {
            DbLocation::File(path) => path.display().to_string(),
            DbLocation::Memory => ":memory:".to_string(),
        }
    }
}

/// Shared handle to the shop database.
///
/// Clones share the pool. Handlers reach the data through the repository
/// accessors:
///
/// ```rust,ignore
/// let groups = group_batches(state.db.batches().list_active().await?, threshold);
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and, unless disabled, brings the schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(database = %config.describe(), "Opening shop database");

        let mut options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout);
        if config.location == DbLocation::Memory {
            options = options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = options
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        debug!(max_connections = config.max_connections, "Pool ready");

        let db = Database { pool };
        if config.run_migrations {
            migrations::run_migrations(&db.pool).await?;
        }
        Ok(db)
    }

    /// The raw pool, for queries no repository covers.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Inventory batches, grouping and the storefront listing.
    pub fn batches(&self) -> BatchRepository {
        BatchRepository::new(self.pool.clone())
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone())
    }

    pub fn suppliers(&self) -> SupplierRepository {
        SupplierRepository::new(self.pool.clone())
    }

    /// Checkout and returns.
    pub fn invoices(&self) -> InvoiceRepository {
        InvoiceRepository::new(self.pool.clone())
    }

    /// Customer and supplier debts and their payments.
    pub fn debts(&self) -> DebtRepository {
        DebtRepository::new(self.pool.clone())
    }

    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone())
    }

    /// Read-only aggregates for the analytics endpoints.
    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.pool.clone())
    }

    /// Whether a trivial query still succeeds.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// Embedded migrations against those recorded in this database.
    pub async fn migration_status(&self) -> DbResult<MigrationStatus> {
        migrations::migration_status(&self.pool).await
    }

    /// Waits for in-flight queries, then closes every connection.
    pub async fn close(&self) {
        info!("Closing shop database");
        self.pool.close().await;
    }
}
