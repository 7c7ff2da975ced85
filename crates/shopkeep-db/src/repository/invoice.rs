//! # Invoice Repository
//!
//! The checkout transaction, invoice reads and partial returns.
//!
//! ## Checkout Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   1. re-read every batch      → inactive / short stock aborts          │
//! │   2. decrement stock          (quantity + delta >= 0 guarded in SQL)   │
//! │   3. INV-YYYYMMDD-NNNN        (daily counter row)                      │
//! │   4. INSERT invoice + items   (name/variant/cost/price snapshots)      │
//! │   5. debt > 0 → INSERT debt   (linked to the invoice)                  │
//! │   6. customer standing        (spend += paid, points, tier)            │
//! │  COMMIT                       any error → ROLLBACK, nothing persisted  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Return Transaction
//! ```text
//!  plan_return (core) ──► returned_quantity ──► restock ──► invoice totals
//!                     ──► linked debt reduced ──► standing debited ──► record
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::batch::{change_stock, fetch_batch};
use crate::repository::customer::{require_customer, save_standing};
use crate::repository::debt::{insert_debt, reduce_invoice_debt};
use crate::repository::{new_id, next_document_number};
use shopkeep_core::invoice::{InvoiceDraft, INVOICE_PREFIX};
use shopkeep_core::loyalty::{LoyaltyPolicy, Standing};
use shopkeep_core::returns::{plan_return, ReturnRequestLine};
use shopkeep_core::{
    CoreError, Customer, DebtParty, Invoice, InvoiceItem, InvoiceSource, InvoiceStatus, Money,
    ReturnLine, ReturnRecord,
};

macro_rules! select_invoice {
    () => {
        r#"
        SELECT id, invoice_number, customer_id, customer_name, source, order_id,
               subtotal_cents, item_discount_cents, tier_discount_cents, total_cents,
               paid_cents, remaining_cents, points_awarded, status, note,
               created_at, updated_at
        FROM invoices
        "#
    };
}

macro_rules! select_item {
    () => {
        r#"
        SELECT id, invoice_id, batch_id, name, color, size, unit, batch_number,
               unit_price_cents, cost_price_cents, quantity, discount_cents,
               returned_quantity
        FROM invoice_items
        "#
    };
}

const ITEM_CHUNK: usize = 500;

/// Invoice header row; items are loaded separately.
#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: String,
    invoice_number: String,
    customer_id: Option<String>,
    customer_name: Option<String>,
    source: InvoiceSource,
    order_id: Option<String>,
    subtotal_cents: i64,
    item_discount_cents: i64,
    tier_discount_cents: i64,
    total_cents: i64,
    paid_cents: i64,
    remaining_cents: i64,
    points_awarded: i64,
    status: InvoiceStatus,
    note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InvoiceRow {
    fn into_invoice(self, items: Vec<InvoiceItem>) -> Invoice {
        Invoice {
            id: self.id,
            invoice_number: self.invoice_number,
            customer_id: self.customer_id,
            customer_name: self.customer_name,
            source: self.source,
            order_id: self.order_id,
            subtotal_cents: self.subtotal_cents,
            item_discount_cents: self.item_discount_cents,
            tier_discount_cents: self.tier_discount_cents,
            total_cents: self.total_cents,
            paid_cents: self.paid_cents,
            remaining_cents: self.remaining_cents,
            points_awarded: self.points_awarded,
            status: self.status,
            note: self.note,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReturnRow {
    id: String,
    invoice_id: String,
    refund_cents: i64,
    debt_reduction_cents: i64,
    cash_refund_cents: i64,
    points_reversed: i64,
    created_at: DateTime<Utc>,
}

// =============================================================================
// Receipts
// =============================================================================

/// Result of a completed checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub invoice: Invoice,
    pub change_cents: i64,
    /// Debt opened for the unpaid remainder.
    pub debt_id: Option<String>,
    /// Customer after the standing update.
    pub customer: Option<Customer>,
}

/// Result of a return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnReceipt {
    pub record: ReturnRecord,
    pub invoice: Invoice,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for invoices, checkout and returns.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Persists a drafted sale atomically.
    pub async fn create(
        &self,
        draft: &InvoiceDraft,
        policy: &LoyaltyPolicy,
    ) -> DbResult<CheckoutReceipt> {
        let mut tx = self.pool.begin().await?;
        let receipt = create_in(&mut tx, draft, policy).await?;
        tx.commit().await?;

        info!(
            invoice_number = %receipt.invoice.invoice_number,
            total = receipt.invoice.total_cents,
            paid = receipt.invoice.paid_cents,
            "Invoice created"
        );
        Ok(receipt)
    }

    /// Gets an invoice with its items.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        let mut conn = self.pool.acquire().await?;
        load_invoice(&mut conn, id).await
    }

    /// Most recent invoices first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(concat!(
            select_invoice!(),
            "ORDER BY julianday(created_at) DESC, rowid DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    /// A customer's invoices, newest first.
    pub async fn list_by_customer(&self, customer_id: &str) -> DbResult<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(concat!(
            select_invoice!(),
            "WHERE customer_id = ?1 ORDER BY julianday(created_at) DESC, rowid DESC"
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    /// Every invoice sold to a registered customer, oldest first.
    pub async fn list_attributed(&self) -> DbResult<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(concat!(
            select_invoice!(),
            "WHERE customer_id IS NOT NULL ORDER BY julianday(created_at), rowid"
        ))
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    /// Invoices created in `[from, to)`, oldest first.
    pub async fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(concat!(
            select_invoice!(),
            r#"
            WHERE julianday(created_at) >= julianday(?1)
              AND julianday(created_at) < julianday(?2)
            ORDER BY julianday(created_at), rowid
            "#
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    /// Applies a partial or full return atomically.
    pub async fn apply_return(
        &self,
        invoice_id: &str,
        request: &[ReturnRequestLine],
        policy: &LoyaltyPolicy,
    ) -> DbResult<ReturnReceipt> {
        let mut tx = self.pool.begin().await?;

        let invoice = load_invoice(&mut tx, invoice_id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", invoice_id))?;
        let plan = plan_return(&invoice, request).map_err(|e| {
            warn!(invoice_id = %invoice_id, error = %e, "Return rejected");
            e
        })?;
        let now = Utc::now();

        for (item_id, returned) in &plan.item_updates {
            sqlx::query("UPDATE invoice_items SET returned_quantity = ?2 WHERE id = ?1")
                .bind(item_id)
                .bind(returned)
                .execute(&mut *tx)
                .await?;
        }

        for line in &plan.lines {
            let batch = fetch_batch(&mut tx, &line.batch_id)
                .await?
                .ok_or_else(|| DbError::not_found("Batch", &line.batch_id))?;
            change_stock(&mut tx, &batch, line.quantity).await?;
        }

        sqlx::query(
            r#"
            UPDATE invoices SET
                total_cents = ?2,
                paid_cents = ?3,
                remaining_cents = ?4,
                status = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(invoice_id)
        .bind(plan.total_after_cents)
        .bind(plan.paid_after_cents)
        .bind(plan.remaining_after_cents)
        .bind(plan.status_after)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if plan.debt_reduction_cents > 0 {
            reduce_invoice_debt(&mut tx, invoice_id, Money::from_cents(plan.debt_reduction_cents))
                .await?;
        }

        let mut points_reversed = 0;
        if let Some(customer_id) = invoice.customer_id.as_deref() {
            if plan.cash_refund_cents > 0 {
                let customer = require_customer(&mut tx, customer_id).await?;
                let (standing, reversed) = policy.debit(
                    Standing::of(&customer),
                    Money::from_cents(plan.cash_refund_cents),
                );
                save_standing(&mut tx, customer_id, standing).await?;
                points_reversed = reversed;
            }
        }

        let record = ReturnRecord {
            id: new_id(),
            invoice_id: invoice_id.to_string(),
            refund_cents: plan.refund_cents,
            debt_reduction_cents: plan.debt_reduction_cents,
            cash_refund_cents: plan.cash_refund_cents,
            points_reversed,
            lines: plan.lines.clone(),
            created_at: now,
        };
        insert_return(&mut tx, &record).await?;

        let invoice = load_invoice(&mut tx, invoice_id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", invoice_id))?;

        tx.commit().await?;

        info!(
            invoice_number = %invoice.invoice_number,
            refund = record.refund_cents,
            cash = record.cash_refund_cents,
            "Return applied"
        );
        Ok(ReturnReceipt { record, invoice })
    }

    /// Returns recorded against an invoice, oldest first.
    pub async fn returns_for(&self, invoice_id: &str) -> DbResult<Vec<ReturnRecord>> {
        let rows = sqlx::query_as::<_, ReturnRow>(
            r#"
            SELECT id, invoice_id, refund_cents, debt_reduction_cents, cash_refund_cents,
                   points_reversed, created_at
            FROM returns
            WHERE invoice_id = ?1
            ORDER BY julianday(created_at), rowid
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let lines = sqlx::query_as::<_, ReturnLine>(
                "SELECT batch_id, quantity, refund_cents FROM return_lines WHERE return_id = ?1",
            )
            .bind(&row.id)
            .fetch_all(&self.pool)
            .await?;

            records.push(ReturnRecord {
                id: row.id,
                invoice_id: row.invoice_id,
                refund_cents: row.refund_cents,
                debt_reduction_cents: row.debt_reduction_cents,
                cash_refund_cents: row.cash_refund_cents,
                points_reversed: row.points_reversed,
                lines,
                created_at: row.created_at,
            });
        }
        Ok(records)
    }

    /// Loads the items of every row in one query and assembles invoices.
    async fn hydrate(&self, rows: Vec<InvoiceRow>) -> DbResult<Vec<Invoice>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        // Stay well under SQLite's bound-parameter limit
        let mut items = Vec::new();
        for chunk in rows.chunks(ITEM_CHUNK) {
            let placeholders = (1..=chunk.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "{} WHERE invoice_id IN ({}) ORDER BY rowid",
                select_item!(),
                placeholders
            );

            let mut query = sqlx::query_as::<_, InvoiceItem>(&sql);
            for row in chunk {
                query = query.bind(&row.id);
            }
            items.extend(query.fetch_all(&self.pool).await?);
        }

        let mut by_invoice: HashMap<String, Vec<InvoiceItem>> = HashMap::new();
        for item in items {
            by_invoice
                .entry(item.invoice_id.clone())
                .or_default()
                .push(item);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let items = by_invoice.remove(&row.id).unwrap_or_default();
                row.into_invoice(items)
            })
            .collect())
    }
}

// =============================================================================
// Connection-level helpers (shared with the order and debt transactions)
// =============================================================================

/// Runs checkout steps 1-6 on an open transaction.
pub(crate) async fn create_in(
    conn: &mut SqliteConnection,
    draft: &InvoiceDraft,
    policy: &LoyaltyPolicy,
) -> DbResult<CheckoutReceipt> {
    if draft.lines.is_empty() {
        return Err(CoreError::EmptyCart.into());
    }
    if draft.debt_cents > 0 && draft.customer_id.is_none() {
        return Err(CoreError::DebtWithoutCustomer {
            short_cents: draft.debt_cents,
        }
        .into());
    }

    let customer = match draft.customer_id.as_deref() {
        Some(id) => Some(require_customer(conn, id).await?),
        None => None,
    };

    // 1-2. Live stock check and decrement
    for line in &draft.lines {
        let batch = fetch_batch(conn, &line.batch_id)
            .await?
            .filter(|b| b.is_active)
            .ok_or_else(|| CoreError::BatchNotFound(line.batch_id.clone()))?;

        if line.quantity > batch.quantity {
            warn!(batch = %batch.label(), available = batch.quantity, "Checkout short on stock");
            return Err(CoreError::InsufficientStock {
                item: batch.label(),
                available: batch.quantity,
                requested: line.quantity,
            }
            .into());
        }
        change_stock(conn, &batch, -line.quantity).await?;
    }

    // 3. Number
    let now = Utc::now();
    let invoice_number = next_document_number(conn, INVOICE_PREFIX, now).await?;
    let invoice_id = new_id();

    debug!(invoice_number = %invoice_number, lines = draft.lines.len(), "Inserting invoice");

    // 4. Invoice and items
    sqlx::query(
        r#"
        INSERT INTO invoices (
            id, invoice_number, customer_id, customer_name, source, order_id,
            subtotal_cents, item_discount_cents, tier_discount_cents, total_cents,
            paid_cents, remaining_cents, points_awarded, status, note,
            created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6,
            ?7, ?8, ?9, ?10,
            ?11, ?12, ?13, ?14, ?15,
            ?16, ?16
        )
        "#,
    )
    .bind(&invoice_id)
    .bind(&invoice_number)
    .bind(&draft.customer_id)
    .bind(&draft.customer_name)
    .bind(draft.source)
    .bind(&draft.order_id)
    .bind(draft.subtotal_cents)
    .bind(draft.item_discount_cents)
    .bind(draft.tier_discount_cents)
    .bind(draft.total_cents)
    .bind(draft.paid_cents)
    .bind(draft.debt_cents)
    .bind(draft.points_awarded)
    .bind(draft.status)
    .bind(&draft.note)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let mut items = Vec::with_capacity(draft.lines.len());
    for line in &draft.lines {
        let item = InvoiceItem {
            id: new_id(),
            invoice_id: invoice_id.clone(),
            batch_id: line.batch_id.clone(),
            name: line.name.clone(),
            color: line.color.clone(),
            size: line.size.clone(),
            unit: line.unit.clone(),
            batch_number: line.batch_number,
            unit_price_cents: line.unit_price_cents,
            cost_price_cents: line.cost_price_cents,
            quantity: line.quantity,
            discount_cents: line.discount_cents,
            returned_quantity: 0,
        };

        sqlx::query(
            r#"
            INSERT INTO invoice_items (
                id, invoice_id, batch_id, name, color, size, unit, batch_number,
                unit_price_cents, cost_price_cents, quantity, discount_cents, returned_quantity
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 0)
            "#,
        )
        .bind(&item.id)
        .bind(&item.invoice_id)
        .bind(&item.batch_id)
        .bind(&item.name)
        .bind(&item.color)
        .bind(&item.size)
        .bind(&item.unit)
        .bind(item.batch_number)
        .bind(item.unit_price_cents)
        .bind(item.cost_price_cents)
        .bind(item.quantity)
        .bind(item.discount_cents)
        .execute(&mut *conn)
        .await?;

        items.push(item);
    }

    // 5. Debt for the unpaid remainder
    let debt_id = match &customer {
        Some(customer) if draft.debt_cents > 0 => {
            let debt = insert_debt(
                conn,
                DebtParty::Customer,
                &customer.id,
                Some(&invoice_id),
                draft.debt(),
                Some(format!("Invoice {}", invoice_number)),
                now,
            )
            .await?;
            Some(debt.id)
        }
        _ => None,
    };

    // 6. Loyalty standing
    let customer = match customer {
        Some(customer) => {
            let (standing, _) = policy.credit(Standing::of(&customer), draft.paid());
            save_standing(conn, &customer.id, standing).await?;
            Some(Customer {
                total_spent_cents: standing.total_spent_cents,
                loyalty_points: standing.loyalty_points,
                vip_tier: standing.vip_tier,
                updated_at: now,
                ..customer
            })
        }
        None => None,
    };

    let invoice = Invoice {
        id: invoice_id,
        invoice_number,
        customer_id: draft.customer_id.clone(),
        customer_name: draft.customer_name.clone(),
        source: draft.source,
        order_id: draft.order_id.clone(),
        subtotal_cents: draft.subtotal_cents,
        item_discount_cents: draft.item_discount_cents,
        tier_discount_cents: draft.tier_discount_cents,
        total_cents: draft.total_cents,
        paid_cents: draft.paid_cents,
        remaining_cents: draft.debt_cents,
        points_awarded: draft.points_awarded,
        status: draft.status,
        note: draft.note.clone(),
        items,
        created_at: now,
        updated_at: now,
    };

    Ok(CheckoutReceipt {
        invoice,
        change_cents: draft.change_cents,
        debt_id,
        customer,
    })
}

pub(crate) async fn load_invoice(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Invoice>> {
    let Some(row) = sqlx::query_as::<_, InvoiceRow>(concat!(select_invoice!(), "WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, InvoiceItem>(concat!(
        select_item!(),
        "WHERE invoice_id = ?1 ORDER BY rowid"
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(row.into_invoice(items)))
}

/// Records money received against an invoice's remainder.
pub(crate) async fn apply_invoice_payment(
    conn: &mut SqliteConnection,
    invoice_id: &str,
    amount: Money,
) -> DbResult<()> {
    let row = sqlx::query_as::<_, InvoiceRow>(concat!(select_invoice!(), "WHERE id = ?1"))
        .bind(invoice_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Invoice", invoice_id))?;

    let paid = row.paid_cents + amount.cents();
    let remaining = (row.remaining_cents - amount.cents()).max(0);
    let status = match row.status {
        InvoiceStatus::Returned => InvoiceStatus::Returned,
        _ => InvoiceStatus::from_amounts(paid, remaining),
    };

    sqlx::query(
        r#"
        UPDATE invoices SET paid_cents = ?2, remaining_cents = ?3, status = ?4, updated_at = ?5
        WHERE id = ?1
        "#,
    )
    .bind(invoice_id)
    .bind(paid)
    .bind(remaining)
    .bind(status)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_return(conn: &mut SqliteConnection, record: &ReturnRecord) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO returns (
            id, invoice_id, refund_cents, debt_reduction_cents, cash_refund_cents,
            points_reversed, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&record.id)
    .bind(&record.invoice_id)
    .bind(record.refund_cents)
    .bind(record.debt_reduction_cents)
    .bind(record.cash_refund_cents)
    .bind(record.points_reversed)
    .bind(record.created_at)
    .execute(&mut *conn)
    .await?;

    for line in &record.lines {
        sqlx::query(
            "INSERT INTO return_lines (return_id, batch_id, quantity, refund_cents) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&record.id)
        .bind(&line.batch_id)
        .bind(line.quantity)
        .bind(line.refund_cents)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::batch::NewBatch;
    use crate::repository::customer::NewCustomer;
    use shopkeep_core::cart::Cart;
    use shopkeep_core::{Batch, DebtStatus, VipTier};

    async fn setup() -> (Database, Batch, Batch, Customer) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let scarf = db
            .batches()
            .insert(&NewBatch {
                name: "Silk Scarf".to_string(),
                color: "Red".to_string(),
                unit: "pc".to_string(),
                cost_price_cents: 4_000,
                sale_price_cents: 10_000,
                quantity: 10,
                ..NewBatch::default()
            })
            .await
            .unwrap();
        let tote = db
            .batches()
            .insert(&NewBatch {
                name: "Canvas Tote".to_string(),
                unit: "pc".to_string(),
                cost_price_cents: 1_000,
                sale_price_cents: 5_000,
                quantity: 2,
                ..NewBatch::default()
            })
            .await
            .unwrap();
        let customer = db
            .customers()
            .create(&NewCustomer {
                name: "Mai".to_string(),
                phone: Some("0912345678".to_string()),
                address: None,
            })
            .await
            .unwrap();
        (db, scarf, tote, customer)
    }

    fn draft(cart: &Cart, customer: Option<&Customer>, paid: i64) -> InvoiceDraft {
        InvoiceDraft::from_cart(
            cart,
            customer,
            Money::from_cents(paid),
            &LoyaltyPolicy::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_checkout_paid_in_full() {
        let (db, scarf, tote, _) = setup().await;
        let mut cart = Cart::new();
        cart.add_item(&scarf, 3).unwrap();
        cart.add_item(&tote, 1).unwrap();

        let receipt = db
            .invoices()
            .create(&draft(&cart, None, 40_000), &LoyaltyPolicy::default())
            .await
            .unwrap();

        assert_eq!(receipt.invoice.total_cents, 35_000);
        assert_eq!(receipt.change_cents, 5_000);
        assert_eq!(receipt.debt_id, None);
        assert!(receipt.invoice.invoice_number.starts_with("INV-"));
        assert!(receipt.invoice.invoice_number.ends_with("-0001"));

        let scarf_after = db.batches().get_by_id(&scarf.id).await.unwrap().unwrap();
        assert_eq!(scarf_after.quantity, 7);

        let stored = db
            .invoices()
            .get_by_id(&receipt.invoice.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.items.len(), 2);
        assert_eq!(stored.status, InvoiceStatus::Paid);
    }

    #[tokio::test]
    async fn test_checkout_on_credit_opens_debt_and_updates_standing() {
        let (db, scarf, _, customer) = setup().await;
        let mut cart = Cart::new();
        cart.add_item(&scarf, 6).unwrap();

        let receipt = db
            .invoices()
            .create(&draft(&cart, Some(&customer), 20_000), &LoyaltyPolicy::default())
            .await
            .unwrap();

        assert_eq!(receipt.invoice.status, InvoiceStatus::Partial);
        assert_eq!(receipt.invoice.remaining_cents, 40_000);
        assert!(receipt.debt_id.is_some());

        let debts = db
            .debts()
            .list_open(DebtParty::Customer, &customer.id)
            .await
            .unwrap();
        assert_eq!(debts.len(), 1);
        assert_eq!(debts[0].remaining_cents, 40_000);
        assert_eq!(debts[0].invoice_id.as_deref(), Some(receipt.invoice.id.as_str()));

        let after = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(after.total_spent_cents, 20_000);
        assert_eq!(after.loyalty_points, 2);
        assert_eq!(after.vip_tier, VipTier::Regular);
    }

    #[tokio::test]
    async fn test_checkout_rolls_back_on_short_stock() {
        let (db, scarf, tote, _) = setup().await;
        let mut cart = Cart::new();
        cart.add_item(&scarf, 2).unwrap();
        cart.add_item(&tote, 2).unwrap();

        // Someone else sells a tote first
        db.batches().adjust_stock(&tote.id, -1).await.unwrap();

        let err = db
            .invoices()
            .create(&draft(&cart, None, 100_000), &LoyaltyPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InsufficientStock { available: 1, .. })
        ));

        // Scarf stock untouched, no invoice, counter not consumed
        let scarf_after = db.batches().get_by_id(&scarf.id).await.unwrap().unwrap();
        assert_eq!(scarf_after.quantity, 10);
        assert!(db.invoices().list_recent(10).await.unwrap().is_empty());

        let mut ok = Cart::new();
        ok.add_item(&scarf, 1).unwrap();
        let receipt = db
            .invoices()
            .create(&draft(&ok, None, 10_000), &LoyaltyPolicy::default())
            .await
            .unwrap();
        assert!(receipt.invoice.invoice_number.ends_with("-0001"));
    }

    #[tokio::test]
    async fn test_return_reduces_debt_then_refunds_cash() {
        let (db, scarf, _, customer) = setup().await;
        let policy = LoyaltyPolicy::default();
        let mut cart = Cart::new();
        cart.add_item(&scarf, 4).unwrap();

        // 400.00 total, 300.00 paid, 100.00 owed
        let receipt = db
            .invoices()
            .create(&draft(&cart, Some(&customer), 30_000), &policy)
            .await
            .unwrap();

        let returned = db
            .invoices()
            .apply_return(
                &receipt.invoice.id,
                &[ReturnRequestLine {
                    batch_id: scarf.id.clone(),
                    quantity: 2,
                }],
                &policy,
            )
            .await
            .unwrap();

        assert_eq!(returned.record.refund_cents, 20_000);
        assert_eq!(returned.record.debt_reduction_cents, 10_000);
        assert_eq!(returned.record.cash_refund_cents, 10_000);
        assert_eq!(returned.record.points_reversed, 1);
        assert_eq!(returned.invoice.total_cents, 20_000);
        assert_eq!(returned.invoice.remaining_cents, 0);
        assert_eq!(returned.invoice.paid_cents, 20_000);
        assert_eq!(returned.invoice.status, InvoiceStatus::Paid);
        assert_eq!(returned.invoice.items[0].returned_quantity, 2);

        let scarf_after = db.batches().get_by_id(&scarf.id).await.unwrap().unwrap();
        assert_eq!(scarf_after.quantity, 8);

        let debts = db.debts().list_for(DebtParty::Customer, &customer.id).await.unwrap();
        assert_eq!(debts[0].status, DebtStatus::Settled);

        let after = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(after.total_spent_cents, 20_000);
        assert_eq!(after.loyalty_points, 2);

        let records = db.invoices().returns_for(&receipt.invoice.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].lines.len(), 1);

        // Return the rest: invoice is fully returned
        let last = db
            .invoices()
            .apply_return(
                &receipt.invoice.id,
                &[ReturnRequestLine {
                    batch_id: scarf.id.clone(),
                    quantity: 2,
                }],
                &policy,
            )
            .await
            .unwrap();
        assert_eq!(last.invoice.status, InvoiceStatus::Returned);
        assert_eq!(last.invoice.total_cents, 0);

        assert!(matches!(
            db.invoices()
                .apply_return(
                    &receipt.invoice.id,
                    &[ReturnRequestLine {
                        batch_id: scarf.id.clone(),
                        quantity: 1,
                    }],
                    &policy,
                )
                .await,
            Err(DbError::Core(CoreError::AlreadyReturned(_)))
        ));
    }

    #[tokio::test]
    async fn test_list_by_customer_and_between() {
        let (db, scarf, _, customer) = setup().await;
        let policy = LoyaltyPolicy::default();
        let mut cart = Cart::new();
        cart.add_item(&scarf, 1).unwrap();

        let start = Utc::now() - chrono::Duration::seconds(1);
        db.invoices()
            .create(&draft(&cart, Some(&customer), 10_000), &policy)
            .await
            .unwrap();
        db.invoices()
            .create(&draft(&cart, None, 10_000), &policy)
            .await
            .unwrap();
        let end = Utc::now() + chrono::Duration::seconds(1);

        let mine = db.invoices().list_by_customer(&customer.id).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].items.len(), 1);

        let all = db.invoices().list_between(start, end).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[1].invoice_number.ends_with("-0002"));
        assert!(db
            .invoices()
            .list_between(end, end + chrono::Duration::days(1))
            .await
            .unwrap()
            .is_empty());
    }
}
