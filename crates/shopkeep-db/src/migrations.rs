//! # Schema Migrations
//!
//! The schema ships inside the binary. `sqlx::migrate!` embeds every file
//! under `migrations/sqlite/` at compile time, and `Database::new` applies
//! the ones a database file has not recorded yet.
//!
//! ```text
//! migrations/sqlite/
//! └── 001_initial_schema.sql   batches, customers, suppliers,
//!                              invoices + invoice_items, debts + debt_payments,
//!                              orders + order_items, returns + return_lines,
//!                              document_counters
//! ```
//!
//! Applied files are kept in `_sqlx_migrations` with a checksum. Editing a
//! released file makes startup fail; schema changes go in the next number.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Embedded migrations against the ones recorded in the database.
///
/// Reported by `GET /health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub known: usize,
    pub applied: usize,
}

impl MigrationStatus {
    pub fn pending(&self) -> usize {
        self.known.saturating_sub(self.applied)
    }

    pub fn is_current(&self) -> bool {
        self.pending() == 0
    }
}

/// Applies whatever the database has not seen yet.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let before = migration_status(pool).await?;
    if before.is_current() {
        debug!(applied = before.applied, "Schema is current");
        return Ok(());
    }

    info!(pending = before.pending(), "Applying schema migrations");
    MIGRATOR.run(pool).await?;
    info!(known = before.known, "Schema migrated");
    Ok(())
}

/// Counts successful migrations recorded in `_sqlx_migrations`.
///
/// A database that was never migrated has no such table and reports zero.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<MigrationStatus> {
    let tracked: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;

    let applied: i64 = if tracked {
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?
    } else {
        0
    };

    Ok(MigrationStatus {
        known: MIGRATOR.migrations.len(),
        applied: applied.max(0) as usize,
    })
}
