//! # Report Repository
//!
//! Loads the rows the analytics functions in `shopkeep_core::analytics`
//! work on. Nothing here writes.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::invoice::InvoiceRepository;
use shopkeep_core::analytics::{
    customer_segments, sales_by_hour, sales_summary, slow_moving, top_products, CustomerSegment,
    HourlySales, ProductSales, SaleRecord, SalesSummary, SlowMover,
};
use shopkeep_core::{Batch, Customer, InvoiceItem};

/// Read-only analytics queries.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    fn invoices(&self) -> InvoiceRepository {
        InvoiceRepository::new(self.pool.clone())
    }

    /// Units kept by customers per sale, optionally only since a moment.
    pub async fn sales_records(&self, since: Option<DateTime<Utc>>) -> DbResult<Vec<SaleRecord>> {
        let records = match since {
            Some(since) => {
                sqlx::query_as::<_, SaleRecord>(
                    r#"
                    SELECT ii.batch_id, ii.quantity - ii.returned_quantity AS quantity,
                           i.created_at AS sold_at
                    FROM invoice_items ii
                    JOIN invoices i ON i.id = ii.invoice_id
                    WHERE ii.quantity > ii.returned_quantity
                      AND julianday(i.created_at) >= julianday(?1)
                    ORDER BY julianday(i.created_at)
                    "#,
                )
                .bind(since)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, SaleRecord>(
                    r#"
                    SELECT ii.batch_id, ii.quantity - ii.returned_quantity AS quantity,
                           i.created_at AS sold_at
                    FROM invoice_items ii
                    JOIN invoices i ON i.id = ii.invoice_id
                    WHERE ii.quantity > ii.returned_quantity
                    ORDER BY julianday(i.created_at)
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(records)
    }

    /// Invoice lines sold in `[from, to)`.
    pub async fn items_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<InvoiceItem>> {
        let items = sqlx::query_as::<_, InvoiceItem>(
            r#"
            SELECT ii.id, ii.invoice_id, ii.batch_id, ii.name, ii.color, ii.size, ii.unit,
                   ii.batch_number, ii.unit_price_cents, ii.cost_price_cents, ii.quantity,
                   ii.discount_cents, ii.returned_quantity
            FROM invoice_items ii
            JOIN invoices i ON i.id = ii.invoice_id
            WHERE julianday(i.created_at) >= julianday(?1)
              AND julianday(i.created_at) < julianday(?2)
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Stocked batches that have barely sold within the window.
    pub async fn slow_moving(
        &self,
        now: DateTime<Utc>,
        window_days: i64,
        max_units: i64,
    ) -> DbResult<Vec<SlowMover>> {
        let batches = sqlx::query_as::<_, Batch>(
            r#"
            SELECT id, name, color, quality, size, unit, batch_number, cost_price_cents,
                   sale_price_cents, quantity, storefront_visible, description, image_url,
                   supplier_id, is_active, created_at, updated_at
            FROM batches
            WHERE is_active = 1 AND quantity > 0
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        let sales = self.sales_records(None).await?;

        debug!(batches = batches.len(), sales = sales.len(), window_days, "Slow-moving scan");
        Ok(slow_moving(&batches, &sales, now, window_days, max_units))
    }

    pub async fn summary(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> DbResult<SalesSummary> {
        let invoices = self.invoices().list_between(from, to).await?;
        Ok(sales_summary(&invoices))
    }

    pub async fn hourly(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        utc_offset_minutes: i32,
    ) -> DbResult<Vec<HourlySales>> {
        let invoices = self.invoices().list_between(from, to).await?;
        Ok(sales_by_hour(&invoices, utc_offset_minutes))
    }

    /// Recency/frequency/monetary segment of every active customer.
    pub async fn segments(&self, now: DateTime<Utc>) -> DbResult<Vec<CustomerSegment>> {
        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, phone, address, total_spent_cents, loyalty_points,
                   vip_tier, is_active, created_at, updated_at
            FROM customers
            WHERE is_active = 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        let invoices = self.invoices().list_attributed().await?;

        Ok(customer_segments(&customers, &invoices, now))
    }

    pub async fn top_products(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> DbResult<Vec<ProductSales>> {
        let items = self.items_between(from, to).await?;
        Ok(top_products(&items, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::batch::NewBatch;
    use crate::repository::customer::NewCustomer;
    use chrono::Duration;
    use shopkeep_core::analytics::Segment;
    use shopkeep_core::cart::Cart;
    use shopkeep_core::invoice::InvoiceDraft;
    use shopkeep_core::loyalty::LoyaltyPolicy;

    async fn sell(db: &Database, batch: &Batch, qty: i64, customer: Option<&Customer>) {
        let policy = LoyaltyPolicy::default();
        let mut cart = Cart::new();
        cart.add_item(batch, qty).unwrap();
        let total = cart.subtotal();
        let draft = InvoiceDraft::from_cart(&cart, customer, total, &policy).unwrap();
        db.invoices().create(&draft, &policy).await.unwrap();
    }

    #[tokio::test]
    async fn test_summary_and_top_products() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let shirt = db
            .batches()
            .insert(&NewBatch {
                name: "Oxford Shirt".to_string(),
                cost_price_cents: 3_000,
                sale_price_cents: 9_000,
                quantity: 20,
                ..NewBatch::default()
            })
            .await
            .unwrap();
        let belt = db
            .batches()
            .insert(&NewBatch {
                name: "Leather Belt".to_string(),
                cost_price_cents: 2_000,
                sale_price_cents: 6_000,
                quantity: 20,
                ..NewBatch::default()
            })
            .await
            .unwrap();

        let from = Utc::now() - Duration::minutes(1);
        sell(&db, &shirt, 3, None).await;
        sell(&db, &belt, 1, None).await;
        let to = Utc::now() + Duration::minutes(1);

        let summary = db.reports().summary(from, to).await.unwrap();
        assert_eq!(summary.invoice_count, 2);
        assert_eq!(summary.revenue_cents, 33_000);
        assert_eq!(summary.cost_cents, 11_000);
        assert_eq!(summary.gross_profit_cents, 22_000);
        assert_eq!(summary.units_sold, 4);
        assert_eq!(summary.average_ticket_cents, 16_500);

        let top = db.reports().top_products(from, to, 1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].name, "Oxford Shirt");
        assert_eq!(top[0].units, 3);

        let hourly = db.reports().hourly(from, to, 0).await.unwrap();
        assert_eq!(hourly.len(), 24);
        assert_eq!(hourly.iter().map(|h| h.invoice_count).sum::<i64>(), 2);

        let records = db.reports().sales_records(Some(from)).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(db.reports().sales_records(Some(to)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_slow_moving_and_segments() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let scarf = db
            .batches()
            .insert(&NewBatch {
                name: "Wool Scarf".to_string(),
                cost_price_cents: 1_500,
                sale_price_cents: 4_000,
                quantity: 10,
                ..NewBatch::default()
            })
            .await
            .unwrap();
        let customer = db
            .customers()
            .create(&NewCustomer {
                name: "Linh".to_string(),
                ..NewCustomer::default()
            })
            .await
            .unwrap();
        sell(&db, &scarf, 1, Some(&customer)).await;

        // Seen from 60 days on, the batch is older than a 30 day window and
        // its one sale falls outside it.
        let later = Utc::now() + Duration::days(60);
        let slow = db.reports().slow_moving(later, 30, 0).await.unwrap();
        assert_eq!(slow.len(), 1);
        assert_eq!(slow[0].batch_id, scarf.id);
        assert_eq!(slow[0].quantity, 9);
        assert!(slow[0].last_sold_at.is_some());

        // Too young for the window today
        assert!(db.reports().slow_moving(Utc::now(), 30, 0).await.unwrap().is_empty());

        let segments = db.reports().segments(Utc::now()).await.unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].segment, Segment::New);
        assert_eq!(segments[0].frequency, 1);
        assert_eq!(segments[0].monetary_cents, 4_000);
    }
}
