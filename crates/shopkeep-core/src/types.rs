//! # Domain Types
//!
//! Core domain types used throughout Shopkeep.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐                │
//! │  │    Batch     │   │   Invoice    │   │     Debt     │                │
//! │  │ ──────────── │   │ ──────────── │   │ ──────────── │                │
//! │  │ variant key  │──►│ items (snap) │──►│ party        │                │
//! │  │ batch_number │   │ paid/remain  │   │ remaining    │                │
//! │  │ cost / sale  │   │ status       │   │ status       │                │
//! │  └──────────────┘   └──────────────┘   └──────────────┘                │
//! │         ▲                  ▲                  │                         │
//! │         │           ┌──────┴───────┐   ┌──────▼───────┐                │
//! │         └───────────│    Order     │   │ DebtPayment  │                │
//! │                     │ status (SM)  │   └──────────────┘                │
//! │                     └──────────────┘                                    │
//! │  ┌──────────────┐   ┌──────────────┐                                   │
//! │  │   Customer   │   │   Supplier   │                                   │
//! │  │ spend/points │   └──────────────┘                                   │
//! │  │ vip_tier     │                                                      │
//! │  └──────────────┘                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All monetary fields are `*_cents: i64`; `Money` accessors wrap them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::batch::VariantKey;
use crate::money::Money;

// =============================================================================
// Discount Rate
// =============================================================================

/// Discount rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 500 bps = 5%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountRate(u32);

impl DiscountRate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        DiscountRate(bps)
    }

    /// Creates a rate from a percentage.
    pub fn from_percentage(pct: f64) -> Self {
        DiscountRate((pct * 100.0).round() as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        DiscountRate(0)
    }
}

impl Default for DiscountRate {
    fn default() -> Self {
        DiscountRate::zero()
    }
}

// =============================================================================
// Batch
// =============================================================================

/// A distinct inbound lot of a product variant.
///
/// Batches sharing name, color, quality, size and unit form a variant group
/// and are numbered `1..=n` inside it (see [`crate::batch`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Batch {
    pub id: String,
    pub name: String,
    pub color: String,
    pub quality: String,
    pub size: String,
    pub unit: String,
    /// Position within the variant group, starting at 1.
    pub batch_number: i64,
    pub cost_price_cents: i64,
    pub sale_price_cents: i64,
    pub quantity: i64,
    /// Shown on the customer-facing storefront.
    pub storefront_visible: bool,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub supplier_id: Option<String>,
    /// Soft delete flag.
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Batch {
    /// Returns the normalised variant key of this batch.
    pub fn variant_key(&self) -> VariantKey {
        VariantKey::new(&self.name, &self.color, &self.quality, &self.size, &self.unit)
    }

    #[inline]
    pub fn sale_price(&self) -> Money {
        Money::from_cents(self.sale_price_cents)
    }

    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_cents(self.cost_price_cents)
    }

    /// Human label such as `Linen Shirt (Blue, M) #2`.
    pub fn label(&self) -> String {
        let details: Vec<&str> = [self.color.as_str(), self.size.as_str()]
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if details.is_empty() {
            format!("{} #{}", self.name.trim(), self.batch_number)
        } else {
            format!(
                "{} ({}) #{}",
                self.name.trim(),
                details.join(", "),
                self.batch_number
            )
        }
    }

    /// Checks if `quantity` units can be taken from this batch right now.
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.is_active && quantity > 0 && self.quantity >= quantity
    }
}

// =============================================================================
// VIP Tier
// =============================================================================

/// Customer classification derived from cumulative paid spend.
///
/// Ordered: `Regular < Silver < Gold < Platinum`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum VipTier {
    #[default]
    Regular,
    Silver,
    Gold,
    Platinum,
}

// =============================================================================
// Customer & Supplier
// =============================================================================

/// A customer of the shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Cumulative amount actually paid (drives the VIP tier).
    pub total_spent_cents: i64,
    pub loyalty_points: i64,
    pub vip_tier: VipTier,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    #[inline]
    pub fn total_spent(&self) -> Money {
        Money::from_cents(self.total_spent_cents)
    }
}

/// A supplier the shop buys from (and may owe money to).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Invoice
// =============================================================================

/// Payment state of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Nothing left to pay.
    Paid,
    /// Partly paid; the remainder is carried as a debt.
    Partial,
    /// Nothing paid yet.
    Unpaid,
    /// Every unit has been returned.
    Returned,
}

impl InvoiceStatus {
    /// Derives the payment status from the paid amount and the remainder.
    pub fn from_amounts(paid_cents: i64, remaining_cents: i64) -> Self {
        if remaining_cents <= 0 {
            InvoiceStatus::Paid
        } else if paid_cents > 0 {
            InvoiceStatus::Partial
        } else {
            InvoiceStatus::Unpaid
        }
    }
}

/// Where an invoice came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceSource {
    /// Counter sale.
    PointOfSale,
    /// Completed storefront order.
    Order,
}

/// A finalised sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    /// Business number: `INV-YYYYMMDD-NNNN`.
    pub invoice_number: String,
    pub customer_id: Option<String>,
    /// Customer name at time of sale (frozen).
    pub customer_name: Option<String>,
    pub source: InvoiceSource,
    pub order_id: Option<String>,
    pub subtotal_cents: i64,
    /// Sum of per-line discounts.
    pub item_discount_cents: i64,
    /// VIP tier discount on the discounted subtotal.
    pub tier_discount_cents: i64,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub remaining_cents: i64,
    pub points_awarded: i64,
    pub status: InvoiceStatus,
    pub note: Option<String>,
    pub items: Vec<InvoiceItem>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn remaining(&self) -> Money {
        Money::from_cents(self.remaining_cents)
    }

    /// Cost of goods still counted as sold (net of returns).
    pub fn cost_of_goods(&self) -> Money {
        self.items
            .iter()
            .map(|i| i.cost_price().multiply_quantity(i.kept_quantity()))
            .sum()
    }

    /// Units still counted as sold (net of returns).
    pub fn units_sold(&self) -> i64 {
        self.items.iter().map(InvoiceItem::kept_quantity).sum()
    }
}

/// A line on an invoice.
///
/// Uses the snapshot pattern: name, variant and prices are frozen at time of
/// sale so history survives later batch edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    pub batch_id: String,
    pub name: String,
    pub color: String,
    pub size: String,
    pub unit: String,
    pub batch_number: i64,
    pub unit_price_cents: i64,
    pub cost_price_cents: i64,
    pub quantity: i64,
    /// Discount on the whole line.
    pub discount_cents: i64,
    pub returned_quantity: i64,
}

impl InvoiceItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_cents(self.cost_price_cents)
    }

    /// Unit price × quantity.
    pub fn gross(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }

    /// Gross minus the line discount.
    pub fn net(&self) -> Money {
        self.gross() - Money::from_cents(self.discount_cents)
    }

    /// Units that can still be returned.
    pub fn returnable(&self) -> i64 {
        (self.quantity - self.returned_quantity).max(0)
    }

    /// Units sold and not returned.
    pub fn kept_quantity(&self) -> i64 {
        self.returnable()
    }
}

// =============================================================================
// Debt
// =============================================================================

/// Who owes whom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DebtParty {
    /// A customer owes the shop.
    Customer,
    /// The shop owes a supplier.
    Supplier,
}

/// Open/settled state of a debt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DebtStatus {
    Open,
    Settled,
}

/// An outstanding balance, reducible by one or more payments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Debt {
    pub id: String,
    pub party: DebtParty,
    pub party_id: String,
    /// Invoice that produced the debt (customer debts).
    pub invoice_id: Option<String>,
    pub original_cents: i64,
    pub remaining_cents: i64,
    pub status: DebtStatus,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Debt {
    #[inline]
    pub fn remaining(&self) -> Money {
        Money::from_cents(self.remaining_cents)
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == DebtStatus::Open && self.remaining_cents > 0
    }
}

/// A payment applied to one debt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DebtPayment {
    pub id: String,
    pub debt_id: String,
    pub party: DebtParty,
    pub party_id: String,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Order
// =============================================================================

/// Lifecycle of a storefront order. See [`crate::order`] for transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    CancelRequested,
    Completed,
    Cancelled,
}

/// A customer order placed through the storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    /// Business number: `ORD-YYYYMMDD-NNNN`.
    pub order_number: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: Option<String>,
    /// Linked when the order is completed.
    pub customer_id: Option<String>,
    pub items: Vec<OrderItem>,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub invoice_id: Option<String>,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A line on an order (price frozen at placement).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub batch_id: String,
    pub name: String,
    pub color: String,
    pub size: String,
    pub unit: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
}

impl OrderItem {
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Returns
// =============================================================================

/// A stored partial (or full) return against an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnRecord {
    pub id: String,
    pub invoice_id: String,
    pub refund_cents: i64,
    pub debt_reduction_cents: i64,
    pub cash_refund_cents: i64,
    pub points_reversed: i64,
    pub lines: Vec<ReturnLine>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// One returned line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReturnLine {
    pub batch_id: String,
    pub quantity: i64,
    pub refund_cents: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(color: &str, size: &str) -> Batch {
        Batch {
            id: "b1".to_string(),
            name: "Linen Shirt".to_string(),
            color: color.to_string(),
            quality: "A".to_string(),
            size: size.to_string(),
            unit: "pc".to_string(),
            batch_number: 2,
            cost_price_cents: 1000,
            sale_price_cents: 2500,
            quantity: 4,
            storefront_visible: true,
            description: None,
            image_url: None,
            supplier_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_discount_rate() {
        let rate = DiscountRate::from_percentage(5.0);
        assert_eq!(rate.bps(), 500);
        assert!((rate.percentage() - 5.0).abs() < 0.001);
    }

    #[test]
    fn test_batch_label() {
        assert_eq!(batch("Blue", "M").label(), "Linen Shirt (Blue, M) #2");
        assert_eq!(batch("", "").label(), "Linen Shirt #2");
        assert_eq!(batch("Blue", " ").label(), "Linen Shirt (Blue) #2");
    }

    #[test]
    fn test_batch_can_sell() {
        let mut b = batch("Blue", "M");
        assert!(b.can_sell(4));
        assert!(!b.can_sell(5));
        assert!(!b.can_sell(0));
        b.is_active = false;
        assert!(!b.can_sell(1));
    }

    #[test]
    fn test_invoice_status_from_amounts() {
        assert_eq!(InvoiceStatus::from_amounts(1000, 0), InvoiceStatus::Paid);
        assert_eq!(InvoiceStatus::from_amounts(400, 600), InvoiceStatus::Partial);
        assert_eq!(InvoiceStatus::from_amounts(0, 600), InvoiceStatus::Unpaid);
    }

    #[test]
    fn test_vip_tier_ordering_and_serde() {
        assert!(VipTier::Regular < VipTier::Silver);
        assert!(VipTier::Gold < VipTier::Platinum);
        assert_eq!(VipTier::default(), VipTier::Regular);
        assert_eq!(
            serde_json::to_string(&OrderStatus::CancelRequested).unwrap(),
            "\"cancel_requested\""
        );
    }
}
