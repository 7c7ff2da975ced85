//! # Order Repository
//!
//! Storefront orders from placement to completion.
//!
//! ## Lifecycle
//! ```text
//!   place ──► Pending ──► Confirmed ──► complete() ──► Completed
//!                │            │                          (invoice)
//!                │            ▼
//!                └──► CancelRequested ──► Cancelled
//! ```
//!
//! Stock is not held while an order waits; it is decremented by the
//! invoice created at completion, so a sold-out line fails completion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::batch::fetch_batch;
use crate::repository::customer::find_or_create_by_phone;
use crate::repository::invoice::{create_in, CheckoutReceipt};
use crate::repository::{new_id, next_document_number};
use shopkeep_core::cart::Cart;
use shopkeep_core::invoice::{InvoiceDraft, ORDER_PREFIX};
use shopkeep_core::loyalty::LoyaltyPolicy;
use shopkeep_core::order::transition;
use shopkeep_core::storefront::{validate_order_lines, OrderContact, OrderLineRequest};
use shopkeep_core::validation::normalize_phone;
use shopkeep_core::{Batch, CoreError, Money, Order, OrderItem, OrderStatus};

macro_rules! select_order {
    () => {
        r#"
        SELECT id, order_number, customer_name, customer_phone, customer_address,
               customer_id, total_cents, status, invoice_id, note, created_at, updated_at
        FROM orders
        "#
    };
}

macro_rules! select_item {
    () => {
        r#"
        SELECT id, order_id, batch_id, name, color, size, unit, unit_price_cents, quantity
        FROM order_items
        "#
    };
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    order_number: String,
    customer_name: String,
    customer_phone: String,
    customer_address: Option<String>,
    customer_id: Option<String>,
    total_cents: i64,
    status: OrderStatus,
    invoice_id: Option<String>,
    note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            order_number: self.order_number,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            customer_address: self.customer_address,
            customer_id: self.customer_id,
            items,
            total_cents: self.total_cents,
            status: self.status,
            invoice_id: self.invoice_id,
            note: self.note,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Order placed through the storefront.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub contact: OrderContact,
    pub lines: Vec<OrderLineRequest>,
    pub note: Option<String>,
}

/// A completed order and the invoice it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCompletion {
    pub order: Order,
    pub receipt: CheckoutReceipt,
}

/// Repository for storefront orders.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Validates an order against live storefront stock and stores it as
    /// `Pending`.
    pub async fn place(&self, request: &PlaceOrder) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;

        let mut batches = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            if batches.iter().any(|b: &Batch| b.id == line.batch_id) {
                continue;
            }
            if let Some(batch) = fetch_batch(&mut tx, &line.batch_id).await? {
                batches.push(batch);
            }
        }

        let (mut items, total) = validate_order_lines(&batches, &request.contact, &request.lines)
            .map_err(|e| {
                warn!(error = %e, "Order rejected");
                e
            })?;

        let now = Utc::now();
        let order_number = next_document_number(&mut tx, ORDER_PREFIX, now).await?;
        let order_id = new_id();
        let phone = normalize_phone(&request.contact.phone);
        let address = request
            .contact
            .address
            .clone()
            .filter(|a| !a.trim().is_empty());
        let note = request.note.clone().filter(|n| !n.trim().is_empty());

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, customer_name, customer_phone, customer_address,
                customer_id, total_cents, status, invoice_id, note, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7, NULL, ?8, ?9, ?9)
            "#,
        )
        .bind(&order_id)
        .bind(&order_number)
        .bind(request.contact.name.trim())
        .bind(&phone)
        .bind(&address)
        .bind(total.cents())
        .bind(OrderStatus::Pending)
        .bind(&note)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for item in &mut items {
            item.id = new_id();
            item.order_id = order_id.clone();
            insert_item(&mut tx, item).await?;
        }

        tx.commit().await?;

        info!(order_number = %order_number, total = total.cents(), "Order placed");
        Ok(Order {
            id: order_id,
            order_number,
            customer_name: request.contact.name.trim().to_string(),
            customer_phone: phone,
            customer_address: address,
            customer_id: None,
            items,
            total_cents: total.cents(),
            status: OrderStatus::Pending,
            invoice_id: None,
            note,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        load_order(&mut conn, id).await
    }

    /// Orders newest first, optionally restricted to one status.
    pub async fn list(&self, status: Option<OrderStatus>) -> DbResult<Vec<Order>> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, OrderRow>(concat!(
                    select_order!(),
                    "WHERE status = ?1 ORDER BY julianday(created_at) DESC, rowid DESC"
                ))
                .bind(status)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, OrderRow>(concat!(
                    select_order!(),
                    "ORDER BY julianday(created_at) DESC, rowid DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let items = fetch_items(&self.pool, &row.id).await?;
            orders.push(row.into_order(items));
        }
        Ok(orders)
    }

    /// Moves an order along the state machine.
    ///
    /// `Completed` is only reachable through [`OrderRepository::complete`],
    /// which also produces the invoice.
    pub async fn set_status(&self, id: &str, to: OrderStatus) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;
        let order = load_order(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))?;

        if to == OrderStatus::Completed {
            return Err(CoreError::InvalidOrderTransition {
                from: order.status,
                to,
            }
            .into());
        }
        let next = transition(order.status, to).map_err(|e| {
            warn!(order = %order.order_number, error = %e, "Status change rejected");
            e
        })?;

        let now = Utc::now();
        sqlx::query("UPDATE orders SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(next)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(order = %order.order_number, from = ?order.status, to = ?next, "Order status changed");
        Ok(Order {
            status: next,
            updated_at: now,
            ..order
        })
    }

    /// Turns a confirmed order into an invoice in one transaction.
    ///
    /// The customer is found (or registered) by phone, the cart is rebuilt
    /// from the live batches at the prices frozen on the order, and `paid`
    /// defaults to the full total.
    pub async fn complete(
        &self,
        id: &str,
        paid: Option<Money>,
        policy: &LoyaltyPolicy,
    ) -> DbResult<OrderCompletion> {
        let mut tx = self.pool.begin().await?;
        let order = load_order(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))?;

        transition(order.status, OrderStatus::Completed).map_err(|e| {
            warn!(order = %order.order_number, status = ?order.status, "Completion rejected");
            e
        })?;

        let customer = find_or_create_by_phone(
            &mut tx,
            &order.customer_name,
            &order.customer_phone,
            order.customer_address.as_deref(),
        )
        .await?;

        let mut cart = Cart::new();
        for item in &order.items {
            let batch = fetch_batch(&mut tx, &item.batch_id)
                .await?
                .ok_or_else(|| CoreError::BatchNotFound(item.batch_id.clone()))?;
            cart.add_item(&batch, item.quantity)?;
            if let Some(line) = cart.lines.iter_mut().find(|l| l.batch_id == item.batch_id) {
                line.unit_price_cents = item.unit_price_cents;
            }
        }

        let total = Money::from_cents(
            cart.totals(policy.discount_rate(customer.vip_tier))
                .total_cents,
        );
        let draft = InvoiceDraft::from_cart(&cart, Some(&customer), paid.unwrap_or(total), policy)?
            .for_order(order.id.clone())
            .with_note(order.note.clone());

        debug!(order = %order.order_number, total = total.cents(), "Completing order");
        let receipt = create_in(&mut tx, &draft, policy).await?;

        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE orders SET status = ?2, invoice_id = ?3, customer_id = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(OrderStatus::Completed)
        .bind(&receipt.invoice.id)
        .bind(&customer.id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            order = %order.order_number,
            invoice = %receipt.invoice.invoice_number,
            "Order completed"
        );
        Ok(OrderCompletion {
            order: Order {
                status: OrderStatus::Completed,
                invoice_id: Some(receipt.invoice.id.clone()),
                customer_id: Some(customer.id),
                updated_at: now,
                ..order
            },
            receipt,
        })
    }
}

async fn load_order(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
    let Some(row) = sqlx::query_as::<_, OrderRow>(concat!(select_order!(), "WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, OrderItem>(concat!(
        select_item!(),
        "WHERE order_id = ?1 ORDER BY rowid"
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(row.into_order(items)))
}

async fn fetch_items(pool: &SqlitePool, order_id: &str) -> DbResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(concat!(
        select_item!(),
        "WHERE order_id = ?1 ORDER BY rowid"
    ))
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(items)
}

async fn insert_item(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, batch_id, name, color, size, unit, unit_price_cents, quantity
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(&item.batch_id)
    .bind(&item.name)
    .bind(&item.color)
    .bind(&item.size)
    .bind(&item.unit)
    .bind(item.unit_price_cents)
    .bind(item.quantity)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
