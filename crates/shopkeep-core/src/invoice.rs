//! # Invoice Drafting
//!
//! Turns a cart, an optional customer and the amount tendered into an
//! [`InvoiceDraft`]: every number the checkout transaction will persist,
//! computed before any database write.
//!
//! ## Checkout Flow
//! ```text
//! Cart ──► totals(rate(tier)) ──► InvoiceDraft ──► shopkeep-db transaction
//!                                     │
//!            paid ≥ total ───────────►│ status Paid,    change = paid − total
//!            0 < paid < total ───────►│ status Partial, debt   = total − paid
//!            paid = 0 ───────────────►│ status Unpaid,  debt   = total
//!            underpaid, no customer ─►  DebtWithoutCustomer
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::{Cart, CartLine};
use crate::error::{CoreError, CoreResult};
use crate::loyalty::LoyaltyPolicy;
use crate::money::Money;
use crate::types::{Customer, InvoiceSource, InvoiceStatus, VipTier};
use crate::validation::validate_tendered;

/// Prefix of invoice numbers.
pub const INVOICE_PREFIX: &str = "INV";

/// Prefix of order numbers.
pub const ORDER_PREFIX: &str = "ORD";

/// Formats a daily business number such as `INV-20240315-0007`.
pub fn document_number(prefix: &str, date: NaiveDate, sequence: i64) -> String {
    format!("{}-{}-{:04}", prefix, date.format("%Y%m%d"), sequence)
}

/// Everything an invoice will hold, computed from the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceDraft {
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    /// Tier used for the discount.
    pub tier: VipTier,
    pub source: InvoiceSource,
    pub order_id: Option<String>,
    pub note: Option<String>,
    pub lines: Vec<CartLine>,
    pub subtotal_cents: i64,
    pub item_discount_cents: i64,
    pub tier_discount_bps: u32,
    pub tier_discount_cents: i64,
    pub total_cents: i64,
    /// Amount handed over.
    pub tendered_cents: i64,
    /// Amount applied to the invoice: `min(tendered, total)`.
    pub paid_cents: i64,
    pub change_cents: i64,
    /// Amount carried as a customer debt.
    pub debt_cents: i64,
    pub points_awarded: i64,
    pub status: InvoiceStatus,
}

impl InvoiceDraft {
    /// Drafts a counter sale.
    ///
    /// Walk-in sales (no customer) get no tier discount and must be paid in
    /// full.
    pub fn from_cart(
        cart: &Cart,
        customer: Option<&Customer>,
        tendered: Money,
        policy: &LoyaltyPolicy,
    ) -> CoreResult<Self> {
        if cart.is_empty() {
            return Err(CoreError::EmptyCart);
        }
        validate_tendered(tendered.cents())?;

        let tier = customer.map_or(VipTier::Regular, |c| c.vip_tier);
        let totals = cart.totals(policy.discount_rate(tier));
        let total = Money::from_cents(totals.total_cents);

        let paid = tendered.min(total);
        let change = (tendered - total).non_negative();
        let debt = (total - tendered).non_negative();

        if debt.is_positive() && customer.is_none() {
            return Err(CoreError::DebtWithoutCustomer {
                short_cents: debt.cents(),
            });
        }

        Ok(InvoiceDraft {
            customer_id: customer.map(|c| c.id.clone()),
            customer_name: customer.map(|c| c.name.clone()),
            tier,
            source: InvoiceSource::PointOfSale,
            order_id: None,
            note: None,
            lines: cart.lines.clone(),
            subtotal_cents: totals.subtotal_cents,
            item_discount_cents: totals.item_discount_cents,
            tier_discount_bps: totals.tier_discount_bps,
            tier_discount_cents: totals.tier_discount_cents,
            total_cents: total.cents(),
            tendered_cents: tendered.cents(),
            paid_cents: paid.cents(),
            change_cents: change.cents(),
            debt_cents: debt.cents(),
            points_awarded: policy.points_for(paid),
            status: InvoiceStatus::from_amounts(paid.cents(), debt.cents()),
        })
    }

    /// Marks the draft as the fulfilment of a storefront order.
    pub fn for_order(mut self, order_id: impl Into<String>) -> Self {
        self.source = InvoiceSource::Order;
        self.order_id = Some(order_id.into());
        self
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note.filter(|n| !n.trim().is_empty());
        self
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }

    #[inline]
    pub fn debt(&self) -> Money {
        Money::from_cents(self.debt_cents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Batch;
    use chrono::Utc;

    fn batch(id: &str, price_cents: i64) -> Batch {
        Batch {
            id: id.to_string(),
            name: "Silk Scarf".to_string(),
            color: "Red".to_string(),
            quality: "A".to_string(),
            size: "".to_string(),
            unit: "pc".to_string(),
            batch_number: 1,
            cost_price_cents: price_cents / 2,
            sale_price_cents: price_cents,
            quantity: 50,
            storefront_visible: true,
            description: None,
            image_url: None,
            supplier_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn customer(tier: VipTier) -> Customer {
        Customer {
            id: "c1".to_string(),
            name: "Mai".to_string(),
            phone: Some("0912345678".to_string()),
            address: None,
            total_spent_cents: 0,
            loyalty_points: 0,
            vip_tier: tier,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn cart_of(total_cents: i64) -> Cart {
        let mut cart = Cart::new();
        cart.add_item(&batch("b1", total_cents), 1).unwrap();
        cart
    }

    #[test]
    fn test_document_number() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(document_number(INVOICE_PREFIX, date, 7), "INV-20240315-0007");
        assert_eq!(document_number(ORDER_PREFIX, date, 12345), "ORD-20240315-12345");
    }

    #[test]
    fn test_paid_in_full_with_change() {
        let policy = LoyaltyPolicy::default();
        let draft =
            InvoiceDraft::from_cart(&cart_of(25_000), None, Money::from_cents(30_000), &policy)
                .unwrap();

        assert_eq!(draft.total_cents, 25_000);
        assert_eq!(draft.paid_cents, 25_000);
        assert_eq!(draft.change_cents, 5_000);
        assert_eq!(draft.debt_cents, 0);
        assert_eq!(draft.points_awarded, 2);
        assert_eq!(draft.status, InvoiceStatus::Paid);
        assert_eq!(draft.source, InvoiceSource::PointOfSale);
    }

    #[test]
    fn test_partial_payment_creates_debt() {
        let policy = LoyaltyPolicy::default();
        let c = customer(VipTier::Gold);
        let draft =
            InvoiceDraft::from_cart(&cart_of(100_000), Some(&c), Money::from_cents(40_000), &policy)
                .unwrap();

        // Gold: 5% off 1000.00
        assert_eq!(draft.tier_discount_cents, 5_000);
        assert_eq!(draft.total_cents, 95_000);
        assert_eq!(draft.paid_cents, 40_000);
        assert_eq!(draft.debt_cents, 55_000);
        assert_eq!(draft.points_awarded, 4);
        assert_eq!(draft.status, InvoiceStatus::Partial);
        assert_eq!(draft.customer_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_unpaid_on_credit() {
        let policy = LoyaltyPolicy::default();
        let c = customer(VipTier::Regular);
        let draft =
            InvoiceDraft::from_cart(&cart_of(10_000), Some(&c), Money::zero(), &policy).unwrap();
        assert_eq!(draft.status, InvoiceStatus::Unpaid);
        assert_eq!(draft.debt_cents, 10_000);
        assert_eq!(draft.points_awarded, 0);
    }

    #[test]
    fn test_walk_in_must_pay_in_full() {
        let policy = LoyaltyPolicy::default();
        let err = InvoiceDraft::from_cart(&cart_of(10_000), None, Money::from_cents(9_000), &policy)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::DebtWithoutCustomer { short_cents: 1_000 }
        ));
    }

    #[test]
    fn test_empty_cart_rejected() {
        let policy = LoyaltyPolicy::default();
        assert!(matches!(
            InvoiceDraft::from_cart(&Cart::new(), None, Money::zero(), &policy),
            Err(CoreError::EmptyCart)
        ));
    }

    #[test]
    fn test_for_order() {
        let policy = LoyaltyPolicy::default();
        let draft =
            InvoiceDraft::from_cart(&cart_of(1_000), None, Money::from_cents(1_000), &policy)
                .unwrap()
                .for_order("o1")
                .with_note(Some("  ".to_string()));
        assert_eq!(draft.source, InvoiceSource::Order);
        assert_eq!(draft.order_id.as_deref(), Some("o1"));
        assert_eq!(draft.note, None);
    }
}
