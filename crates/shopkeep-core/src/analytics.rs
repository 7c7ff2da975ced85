//! # Analytics Derivations
//!
//! Reporting computed from invoice history. Everything here is a pure
//! function over rows the report repository loads, so the same numbers come
//! out whether the caller is the API or a test.
//!
//! ## Customer Segments (first match wins)
//! ```text
//! ┌──────────┬──────────────────────────────────────────────┐
//! │ Vip      │ tier Gold or Platinum                        │
//! │ New      │ no purchase yet, or one within 30 days       │
//! │ Lost     │ last purchase more than 90 days ago          │
//! │ AtRisk   │ last purchase more than 30 days ago          │
//! │ Loyal    │ 5 or more purchases                          │
//! │ Active   │ everyone else                                │
//! └──────────┴──────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, FixedOffset, Offset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Batch, Customer, Invoice, InvoiceItem, InvoiceStatus, VipTier};

/// Days without a purchase before a customer is at risk.
pub const AT_RISK_AFTER_DAYS: i64 = 30;

/// Days without a purchase before a customer is lost.
pub const LOST_AFTER_DAYS: i64 = 90;

/// Purchases that make a customer loyal.
pub const LOYAL_PURCHASES: usize = 5;

// =============================================================================
// Slow-Moving Stock
// =============================================================================

/// Units of one batch sold at one moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleRecord {
    pub batch_id: String,
    pub quantity: i64,
    #[ts(as = "String")]
    pub sold_at: DateTime<Utc>,
}

/// A batch that is not selling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SlowMover {
    pub batch_id: String,
    pub label: String,
    pub quantity: i64,
    pub stock_value_cents: i64,
    pub days_in_stock: i64,
    pub units_sold_in_window: i64,
    #[ts(as = "Option<String>")]
    pub last_sold_at: Option<DateTime<Utc>>,
    pub days_since_last_sale: Option<i64>,
}

/// Active, stocked batches older than `window_days` that sold at most
/// `max_units` inside the window.
///
/// Never-sold batches come first, then the longest since the last sale.
pub fn slow_moving(
    batches: &[Batch],
    sales: &[SaleRecord],
    now: DateTime<Utc>,
    window_days: i64,
    max_units: i64,
) -> Vec<SlowMover> {
    let window_start = now - Duration::days(window_days);

    let mut sold_in_window: HashMap<&str, i64> = HashMap::new();
    let mut last_sold: HashMap<&str, DateTime<Utc>> = HashMap::new();
    for sale in sales {
        if sale.sold_at > window_start && sale.sold_at <= now {
            *sold_in_window.entry(sale.batch_id.as_str()).or_insert(0) += sale.quantity;
        }
        let last = last_sold.entry(sale.batch_id.as_str()).or_insert(sale.sold_at);
        if sale.sold_at > *last {
            *last = sale.sold_at;
        }
    }

    let mut movers: Vec<SlowMover> = batches
        .iter()
        .filter(|b| b.is_active && b.quantity > 0 && b.created_at <= window_start)
        .filter_map(|b| {
            let units = sold_in_window.get(b.id.as_str()).copied().unwrap_or(0);
            if units > max_units {
                return None;
            }
            let last = last_sold.get(b.id.as_str()).copied();
            Some(SlowMover {
                batch_id: b.id.clone(),
                label: b.label(),
                quantity: b.quantity,
                stock_value_cents: b.cost_price().multiply_quantity(b.quantity).cents(),
                days_in_stock: (now - b.created_at).num_days(),
                units_sold_in_window: units,
                last_sold_at: last,
                days_since_last_sale: last.map(|at| (now - at).num_days()),
            })
        })
        .collect();

    movers.sort_by(|a, b| {
        let key = |m: &SlowMover| m.days_since_last_sale.unwrap_or(i64::MAX);
        key(b)
            .cmp(&key(a))
            .then_with(|| b.stock_value_cents.cmp(&a.stock_value_cents))
            .then_with(|| a.label.cmp(&b.label))
    });
    movers
}

// =============================================================================
// Hourly Sales
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct HourlySales {
    /// Local hour, 0..=23.
    pub hour: u32,
    pub invoice_count: i64,
    pub revenue_cents: i64,
}

/// 24 buckets of invoice count and revenue by local hour.
///
/// Fully returned invoices are skipped. An offset outside ±24h is treated
/// as UTC.
pub fn sales_by_hour(invoices: &[Invoice], utc_offset_minutes: i32) -> Vec<HourlySales> {
    let offset = FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix());

    let mut buckets: Vec<HourlySales> = (0..24)
        .map(|hour| HourlySales {
            hour,
            invoice_count: 0,
            revenue_cents: 0,
        })
        .collect();

    for invoice in invoices.iter().filter(|i| i.status != InvoiceStatus::Returned) {
        let hour = invoice.created_at.with_timezone(&offset).hour() as usize;
        buckets[hour].invoice_count += 1;
        buckets[hour].revenue_cents += invoice.total_cents;
    }
    buckets
}

// =============================================================================
// Customer Segments
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Vip,
    New,
    Lost,
    AtRisk,
    Loyal,
    Active,
}

/// Recency, frequency and monetary value of one customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerSegment {
    pub customer_id: String,
    pub name: String,
    pub segment: Segment,
    pub recency_days: Option<i64>,
    pub frequency: usize,
    pub monetary_cents: i64,
}

/// Classifies every customer.
///
/// Sorted by monetary value descending.
pub fn customer_segments(
    customers: &[Customer],
    invoices: &[Invoice],
    now: DateTime<Utc>,
) -> Vec<CustomerSegment> {
    struct Activity {
        count: usize,
        spent: i64,
        last: Option<DateTime<Utc>>,
    }

    let mut activity: HashMap<&str, Activity> = HashMap::new();
    for invoice in invoices.iter().filter(|i| i.status != InvoiceStatus::Returned) {
        let Some(customer_id) = invoice.customer_id.as_deref() else {
            continue;
        };
        let entry = activity.entry(customer_id).or_insert(Activity {
            count: 0,
            spent: 0,
            last: None,
        });
        entry.count += 1;
        entry.spent += invoice.total_cents;
        entry.last = Some(entry.last.map_or(invoice.created_at, |l| l.max(invoice.created_at)));
    }

    let mut rows: Vec<CustomerSegment> = customers
        .iter()
        .map(|c| {
            let (count, spent, last) = activity
                .get(c.id.as_str())
                .map_or((0, 0, None), |a| (a.count, a.spent, a.last));
            let recency = last.map(|at| (now - at).num_days());

            CustomerSegment {
                customer_id: c.id.clone(),
                name: c.name.clone(),
                segment: classify(c.vip_tier, count, recency),
                recency_days: recency,
                frequency: count,
                monetary_cents: spent,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.monetary_cents
            .cmp(&a.monetary_cents)
            .then_with(|| a.name.cmp(&b.name))
    });
    rows
}

fn classify(tier: VipTier, purchases: usize, recency_days: Option<i64>) -> Segment {
    if tier >= VipTier::Gold {
        return Segment::Vip;
    }
    let Some(days) = recency_days else {
        return Segment::New;
    };
    if purchases <= 1 && days <= AT_RISK_AFTER_DAYS {
        Segment::New
    } else if days > LOST_AFTER_DAYS {
        Segment::Lost
    } else if days > AT_RISK_AFTER_DAYS {
        Segment::AtRisk
    } else if purchases >= LOYAL_PURCHASES {
        Segment::Loyal
    } else {
        Segment::Active
    }
}

// =============================================================================
// Summary & Top Products
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesSummary {
    pub invoice_count: i64,
    pub revenue_cents: i64,
    pub cost_cents: i64,
    pub gross_profit_cents: i64,
    pub units_sold: i64,
    pub average_ticket_cents: i64,
    pub discount_cents: i64,
    /// Still owed on these invoices.
    pub outstanding_cents: i64,
}

/// Totals over a set of invoices, net of returns.
pub fn sales_summary(invoices: &[Invoice]) -> SalesSummary {
    let mut summary = SalesSummary::default();

    for invoice in invoices.iter().filter(|i| i.status != InvoiceStatus::Returned) {
        summary.invoice_count += 1;
        summary.revenue_cents += invoice.total_cents;
        summary.cost_cents += invoice.cost_of_goods().cents();
        summary.units_sold += invoice.units_sold();
        summary.discount_cents += invoice.item_discount_cents + invoice.tier_discount_cents;
        summary.outstanding_cents += invoice.remaining_cents;
    }

    summary.gross_profit_cents = summary.revenue_cents - summary.cost_cents;
    if summary.invoice_count > 0 {
        summary.average_ticket_cents = Money::from_cents(summary.revenue_cents)
            .scale(1, summary.invoice_count)
            .cents();
    }
    summary
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductSales {
    pub name: String,
    pub units: i64,
    pub revenue_cents: i64,
}

/// Best sellers by units, then revenue, grouped by product name.
///
/// Revenue is the line net (before the tier discount) of the units kept.
pub fn top_products(items: &[InvoiceItem], limit: usize) -> Vec<ProductSales> {
    let mut by_name: BTreeMap<String, ProductSales> = BTreeMap::new();

    for item in items {
        let kept = item.kept_quantity();
        if kept == 0 {
            continue;
        }
        let entry = by_name
            .entry(item.name.trim().to_lowercase())
            .or_insert_with(|| ProductSales {
                name: item.name.trim().to_string(),
                units: 0,
                revenue_cents: 0,
            });
        entry.units += kept;
        entry.revenue_cents += item.net().scale(kept, item.quantity).cents();
    }

    let mut products: Vec<ProductSales> = by_name.into_values().collect();
    products.sort_by(|a, b| {
        b.units
            .cmp(&a.units)
            .then_with(|| b.revenue_cents.cmp(&a.revenue_cents))
            .then_with(|| a.name.cmp(&b.name))
    });
    products.truncate(limit);
    products
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InvoiceSource;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
    }

    fn batch(id: &str, age_days: i64, qty: i64) -> Batch {
        Batch {
            id: id.to_string(),
            name: format!("Item {}", id),
            color: String::new(),
            quality: String::new(),
            size: String::new(),
            unit: "pc".to_string(),
            batch_number: 1,
            cost_price_cents: 1_000,
            sale_price_cents: 2_000,
            quantity: qty,
            storefront_visible: false,
            description: None,
            image_url: None,
            supplier_id: None,
            is_active: true,
            created_at: now() - Duration::days(age_days),
            updated_at: now(),
        }
    }

    fn sale(batch_id: &str, qty: i64, days_ago: i64) -> SaleRecord {
        SaleRecord {
            batch_id: batch_id.to_string(),
            quantity: qty,
            sold_at: now() - Duration::days(days_ago),
        }
    }

    fn item(name: &str, price: i64, qty: i64, returned: i64) -> InvoiceItem {
        InvoiceItem {
            id: format!("it-{}", name),
            invoice_id: "inv".to_string(),
            batch_id: format!("b-{}", name),
            name: name.to_string(),
            color: String::new(),
            size: String::new(),
            unit: "pc".to_string(),
            batch_number: 1,
            unit_price_cents: price,
            cost_price_cents: price / 2,
            quantity: qty,
            discount_cents: 0,
            returned_quantity: returned,
        }
    }

    fn invoice(customer: Option<&str>, total: i64, at: DateTime<Utc>) -> Invoice {
        Invoice {
            id: format!("inv-{}", at.timestamp()),
            invoice_number: "INV".to_string(),
            customer_id: customer.map(str::to_string),
            customer_name: None,
            source: InvoiceSource::PointOfSale,
            order_id: None,
            subtotal_cents: total,
            item_discount_cents: 0,
            tier_discount_cents: 0,
            total_cents: total,
            paid_cents: total,
            remaining_cents: 0,
            points_awarded: 0,
            status: InvoiceStatus::Paid,
            note: None,
            items: vec![item("x", total, 1, 0)],
            created_at: at,
            updated_at: at,
        }
    }

    fn customer(id: &str, tier: VipTier) -> Customer {
        Customer {
            id: id.to_string(),
            name: id.to_uppercase(),
            phone: None,
            address: None,
            total_spent_cents: 0,
            loyalty_points: 0,
            vip_tier: tier,
            is_active: true,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn test_slow_moving() {
        let batches = vec![
            batch("never", 60, 5),
            batch("old-sale", 60, 5),
            batch("selling", 60, 5),
            batch("young", 10, 5),
            batch("empty", 60, 0),
        ];
        let sales = vec![
            sale("old-sale", 3, 45),
            sale("selling", 2, 5),
            sale("selling", 2, 3),
        ];

        let movers = slow_moving(&batches, &sales, now(), 30, 2);
        let ids: Vec<&str> = movers.iter().map(|m| m.batch_id.as_str()).collect();

        assert_eq!(ids, vec!["never", "old-sale"]);
        assert_eq!(movers[0].days_since_last_sale, None);
        assert_eq!(movers[1].days_since_last_sale, Some(45));
        assert_eq!(movers[1].units_sold_in_window, 0);
        assert_eq!(movers[0].stock_value_cents, 5_000);
    }

    #[test]
    fn test_sales_by_hour_with_offset() {
        let invoices = vec![
            invoice(None, 1_000, Utc.with_ymd_and_hms(2024, 6, 1, 2, 30, 0).unwrap()),
            invoice(None, 2_000, Utc.with_ymd_and_hms(2024, 6, 2, 2, 5, 0).unwrap()),
            invoice(None, 500, Utc.with_ymd_and_hms(2024, 6, 2, 23, 0, 0).unwrap()),
        ];

        // UTC+7
        let hours = sales_by_hour(&invoices, 7 * 60);
        assert_eq!(hours.len(), 24);
        assert_eq!(hours[9].invoice_count, 2);
        assert_eq!(hours[9].revenue_cents, 3_000);
        assert_eq!(hours[6].revenue_cents, 500);
    }

    #[test]
    fn test_customer_segments() {
        let customers = vec![
            customer("vip", VipTier::Gold),
            customer("new", VipTier::Regular),
            customer("fresh", VipTier::Regular),
            customer("lost", VipTier::Regular),
            customer("risk", VipTier::Regular),
            customer("loyal", VipTier::Silver),
            customer("active", VipTier::Regular),
        ];
        let days = |d: i64| now() - Duration::days(d);
        let mut invoices = vec![
            invoice(Some("vip"), 100, days(200)),
            invoice(Some("fresh"), 100, days(3)),
            invoice(Some("lost"), 100, days(120)),
            invoice(Some("lost"), 100, days(100)),
            invoice(Some("risk"), 100, days(40)),
            invoice(Some("risk"), 100, days(35)),
            invoice(Some("active"), 100, days(20)),
            invoice(Some("active"), 100, days(10)),
        ];
        for d in 1..=5 {
            invoices.push(invoice(Some("loyal"), 100, days(d)));
        }

        let rows = customer_segments(&customers, &invoices, now());
        let segment = |id: &str| rows.iter().find(|r| r.customer_id == id).unwrap().segment;

        assert_eq!(segment("vip"), Segment::Vip);
        assert_eq!(segment("new"), Segment::New);
        assert_eq!(segment("fresh"), Segment::New);
        assert_eq!(segment("lost"), Segment::Lost);
        assert_eq!(segment("risk"), Segment::AtRisk);
        assert_eq!(segment("loyal"), Segment::Loyal);
        assert_eq!(segment("active"), Segment::Active);
        assert_eq!(rows[0].customer_id, "loyal");
    }

    #[test]
    fn test_sales_summary() {
        let at = now();
        let mut partial = invoice(Some("c"), 3_000, at);
        partial.paid_cents = 1_000;
        partial.remaining_cents = 2_000;
        let mut returned = invoice(None, 0, at);
        returned.status = InvoiceStatus::Returned;

        let summary = sales_summary(&[invoice(None, 1_000, at), partial, returned]);
        assert_eq!(summary.invoice_count, 2);
        assert_eq!(summary.revenue_cents, 4_000);
        assert_eq!(summary.cost_cents, 500 + 1_500);
        assert_eq!(summary.gross_profit_cents, 2_000);
        assert_eq!(summary.units_sold, 2);
        assert_eq!(summary.average_ticket_cents, 2_000);
        assert_eq!(summary.outstanding_cents, 2_000);
        assert_eq!(sales_summary(&[]), SalesSummary::default());
    }

    #[test]
    fn test_top_products() {
        let items = vec![
            item("Scarf", 1_000, 3, 0),
            item("scarf ", 1_000, 2, 1),
            item("Hat", 5_000, 4, 0),
            item("Tote", 900, 4, 0),
            item("Belt", 100, 2, 2),
        ];

        let top = top_products(&items, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "Hat");
        assert_eq!(top[1].name, "Scarf");
        assert_eq!(top[1].units, 4);
        assert_eq!(top[1].revenue_cents, 4_000);
    }
}
