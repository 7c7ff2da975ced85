//! # Repository Module
//!
//! Database repository implementations for Shopkeep.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  HTTP handler                                                          │
//! │       │                                                                 │
//! │       │  db.invoices().create(&draft)                                  │
//! │       ▼                                                                 │
//! │  InvoiceRepository                                                     │
//! │  ├── shopkeep-core drafts the numbers (pure)                           │
//! │  └── one sqlx transaction persists them (all-or-nothing)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`BatchRepository`] - Inventory batches, numbering, stock
//! - [`CustomerRepository`] - Customers and loyalty standing
//! - [`SupplierRepository`] - Suppliers
//! - [`InvoiceRepository`] - Checkout transaction, invoice reads, returns
//! - [`DebtRepository`] - Debts, FIFO payments, supplier credit
//! - [`OrderRepository`] - Storefront orders and completion
//! - [`ReportRepository`] - Read-only analytics inputs

pub mod batch;
pub mod customer;
pub mod debt;
pub mod invoice;
pub mod order;
pub mod report;
pub mod supplier;

pub use batch::BatchRepository;
pub use customer::CustomerRepository;
pub use debt::DebtRepository;
pub use invoice::InvoiceRepository;
pub use order::OrderRepository;
pub use report::ReportRepository;
pub use supplier::SupplierRepository;

use chrono::{DateTime, Utc};
use shopkeep_core::invoice::document_number;
use sqlx::SqliteConnection;

use crate::error::DbResult;

/// Allocates the next daily business number for `prefix`.
///
/// The counter row is bumped inside the caller's transaction so numbers are
/// never handed out twice, and a rolled-back sale releases its number.
pub(crate) async fn next_document_number(
    conn: &mut SqliteConnection,
    prefix: &str,
    now: DateTime<Utc>,
) -> DbResult<String> {
    let day = now.date_naive();

    let sequence: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO document_counters (prefix, day, last_value)
        VALUES (?1, ?2, 1)
        ON CONFLICT (prefix, day) DO UPDATE SET last_value = last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(prefix)
    .bind(day.format("%Y%m%d").to_string())
    .fetch_one(&mut *conn)
    .await?;

    Ok(document_number(prefix, day, sequence))
}

/// Generates a new entity ID.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
