//! # Cart & Discount Engine
//!
//! The point-of-sale cart. Lines are batch snapshots validated against live
//! stock; totals layer item discounts and the customer's tier discount.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Scan / pick batch ──► add_item()        ──► lines.push / merge        │
//! │  Change quantity   ──► update_quantity() ──► lines[i].quantity = n     │
//! │  Line discount     ──► set_discount()    ──► lines[i].discount = d     │
//! │  Before checkout   ──► refresh_stock()   ──► re-check live stock       │
//! │  Show totals       ──► totals(rate)      ──► CartTotals                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Totals
//! ```text
//! subtotal       = Σ unit_price × quantity
//! item_discount  = Σ line discounts
//! tier_discount  = rate(tier) × (subtotal − item_discount)   (rounded half up)
//! total          = subtotal − item_discount − tier_discount
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Batch, DiscountRate};
use crate::validation::{validate_cart_size, validate_quantity};
use crate::MAX_CART_ITEMS;

/// A line in the cart.
///
/// Name, variant and prices are frozen when the batch is added; only the
/// available stock is refreshed from live reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub batch_id: String,
    pub name: String,
    pub color: String,
    pub size: String,
    pub unit: String,
    pub batch_number: i64,
    pub unit_price_cents: i64,
    pub cost_price_cents: i64,
    pub quantity: i64,
    /// Discount on the whole line, in cents.
    pub discount_cents: i64,
    /// Stock seen at the last live read.
    pub available_stock: i64,
}

impl CartLine {
    /// Creates a line from a batch snapshot.
    pub fn from_batch(batch: &Batch, quantity: i64) -> Self {
        CartLine {
            batch_id: batch.id.clone(),
            name: batch.name.clone(),
            color: batch.color.clone(),
            size: batch.size.clone(),
            unit: batch.unit.clone(),
            batch_number: batch.batch_number,
            unit_price_cents: batch.sale_price_cents,
            cost_price_cents: batch.cost_price_cents,
            quantity,
            discount_cents: 0,
            available_stock: batch.quantity,
        }
    }

    /// Unit price × quantity.
    pub fn gross(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }

    /// Gross minus the line discount.
    pub fn net(&self) -> Money {
        self.gross() - Money::from_cents(self.discount_cents)
    }

    /// Cost of the units on this line.
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_price_cents).multiply_quantity(self.quantity)
    }

    fn label(&self) -> String {
        format!("{} #{}", self.name.trim(), self.batch_number)
    }
}

/// The point-of-sale cart.
///
/// ## Invariants
/// - Lines are unique by `batch_id` (adding again merges quantities)
/// - `1 ≤ quantity ≤ min(999, available_stock)`
/// - `0 ≤ discount ≤ gross`
/// - At most 100 lines
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Cart { lines: Vec::new() }
    }

    /// Adds a batch or increases its quantity if already present.
    ///
    /// The batch passed in is the live read; its stock replaces the line's
    /// snapshot.
    pub fn add_item(&mut self, batch: &Batch, quantity: i64) -> CoreResult<()> {
        validate_quantity(quantity)?;

        if !batch.is_active {
            return Err(CoreError::BatchNotFound(batch.id.clone()));
        }

        if let Some(line) = self.lines.iter_mut().find(|l| l.batch_id == batch.id) {
            let new_qty = line.quantity + quantity;
            validate_quantity(new_qty)?;
            check_stock(&batch.label(), batch.quantity, new_qty)?;
            line.quantity = new_qty;
            line.available_stock = batch.quantity;
            return Ok(());
        }

        validate_cart_size(self.lines.len())
            .map_err(|_| CoreError::CartTooLarge { max: MAX_CART_ITEMS })?;
        check_stock(&batch.label(), batch.quantity, quantity)?;

        self.lines.push(CartLine::from_batch(batch, quantity));
        Ok(())
    }

    /// Sets a line's quantity; 0 removes the line.
    ///
    /// A line discount larger than the new gross is clamped to it.
    pub fn update_quantity(&mut self, batch_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_item(batch_id);
        }
        validate_quantity(quantity)?;

        let line = self.line_mut(batch_id)?;
        check_stock(&line.label(), line.available_stock, quantity)?;
        line.quantity = quantity;
        line.discount_cents = line.discount_cents.min(line.gross().cents());
        Ok(())
    }

    /// Sets the discount (in cents) on a whole line.
    pub fn set_discount(&mut self, batch_id: &str, discount_cents: i64) -> CoreResult<()> {
        let line = self.line_mut(batch_id)?;
        let line_total = line.gross().cents();

        if discount_cents < 0 || discount_cents > line_total {
            return Err(CoreError::DiscountExceedsLine {
                discount: discount_cents,
                line_total,
            });
        }

        line.discount_cents = discount_cents;
        Ok(())
    }

    /// Re-validates a line against a fresh read of its batch.
    pub fn refresh_stock(&mut self, batch: &Batch) -> CoreResult<()> {
        let line = self.line_mut(&batch.id)?;
        if !batch.is_active {
            return Err(CoreError::BatchNotFound(batch.id.clone()));
        }
        line.available_stock = batch.quantity;
        check_stock(&batch.label(), batch.quantity, line.quantity)
    }

    /// Removes a line by batch ID.
    pub fn remove_item(&mut self, batch_id: &str) -> CoreResult<()> {
        let initial_len = self.lines.len();
        self.lines.retain(|l| l.batch_id != batch_id);

        if self.lines.len() == initial_len {
            Err(CoreError::NotInCart(batch_id.to_string()))
        } else {
            Ok(())
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct lines.
    pub fn item_count(&self) -> usize {
        self.lines.len()
    }

    /// Total units across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::gross).sum()
    }

    pub fn item_discount(&self) -> Money {
        self.lines
            .iter()
            .map(|l| Money::from_cents(l.discount_cents))
            .sum()
    }

    pub fn cost_total(&self) -> Money {
        self.lines.iter().map(CartLine::cost).sum()
    }

    /// Computes all totals for a given tier discount rate.
    pub fn totals(&self, tier_rate: DiscountRate) -> CartTotals {
        let subtotal = self.subtotal();
        let item_discount = self.item_discount();
        let discounted = subtotal - item_discount;
        let tier_discount = discounted.percentage(tier_rate.bps());
        let total = discounted - tier_discount;
        let cost = self.cost_total();

        CartTotals {
            item_count: self.item_count(),
            total_quantity: self.total_quantity(),
            subtotal_cents: subtotal.cents(),
            item_discount_cents: item_discount.cents(),
            tier_discount_bps: tier_rate.bps(),
            tier_discount_cents: tier_discount.cents(),
            total_cents: total.cents(),
            cost_cents: cost.cents(),
            expected_profit_cents: (total - cost).cents(),
        }
    }

    fn line_mut(&mut self, batch_id: &str) -> CoreResult<&mut CartLine> {
        self.lines
            .iter_mut()
            .find(|l| l.batch_id == batch_id)
            .ok_or_else(|| CoreError::NotInCart(batch_id.to_string()))
    }
}

fn check_stock(item: &str, available: i64, requested: i64) -> CoreResult<()> {
    if requested > available {
        return Err(CoreError::InsufficientStock {
            item: item.to_string(),
            available,
            requested,
        });
    }
    Ok(())
}

/// Cart totals summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartTotals {
    pub item_count: usize,
    pub total_quantity: i64,
    pub subtotal_cents: i64,
    pub item_discount_cents: i64,
    pub tier_discount_bps: u32,
    pub tier_discount_cents: i64,
    pub total_cents: i64,
    pub cost_cents: i64,
    pub expected_profit_cents: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_batch(id: &str, price_cents: i64, stock: i64) -> Batch {
        Batch {
            id: id.to_string(),
            name: format!("Product {}", id),
            color: "Blue".to_string(),
            quality: "A".to_string(),
            size: "M".to_string(),
            unit: "pc".to_string(),
            batch_number: 1,
            cost_price_cents: price_cents / 2,
            sale_price_cents: price_cents,
            quantity: stock,
            storefront_visible: false,
            description: None,
            image_url: None,
            supplier_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_cart_add_item() {
        let mut cart = Cart::new();
        cart.add_item(&test_batch("1", 999, 10), 2).unwrap();

        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.total_quantity(), 2);
        assert_eq!(cart.subtotal().cents(), 1998);
    }

    #[test]
    fn test_cart_add_same_batch_merges() {
        let mut cart = Cart::new();
        let batch = test_batch("1", 999, 10);

        cart.add_item(&batch, 2).unwrap();
        cart.add_item(&batch, 3).unwrap();

        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.total_quantity(), 5);
    }

    #[test]
    fn test_cart_rejects_more_than_stock() {
        let mut cart = Cart::new();
        let batch = test_batch("1", 999, 3);

        let err = cart.add_item(&batch, 4).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock {
                available: 3,
                requested: 4,
                ..
            }
        ));

        cart.add_item(&batch, 2).unwrap();
        // Merging past the stock also fails and leaves the line untouched
        assert!(cart.add_item(&batch, 2).is_err());
        assert_eq!(cart.total_quantity(), 2);
    }

    #[test]
    fn test_cart_rejects_inactive_batch() {
        let mut cart = Cart::new();
        let mut batch = test_batch("1", 999, 3);
        batch.is_active = false;
        assert!(matches!(
            cart.add_item(&batch, 1),
            Err(CoreError::BatchNotFound(_))
        ));
    }

    #[test]
    fn test_update_quantity_and_remove() {
        let mut cart = Cart::new();
        cart.add_item(&test_batch("1", 1000, 5), 1).unwrap();

        cart.update_quantity("1", 5).unwrap();
        assert_eq!(cart.total_quantity(), 5);
        assert!(cart.update_quantity("1", 6).is_err());

        cart.update_quantity("1", 0).unwrap();
        assert!(cart.is_empty());
        assert!(matches!(
            cart.update_quantity("1", 1),
            Err(CoreError::NotInCart(_))
        ));
    }

    #[test]
    fn test_discount_bounds_and_clamp() {
        let mut cart = Cart::new();
        cart.add_item(&test_batch("1", 1000, 5), 3).unwrap();

        assert!(cart.set_discount("1", 3001).is_err());
        assert!(cart.set_discount("1", -1).is_err());
        cart.set_discount("1", 2500).unwrap();

        // Shrinking the line clamps the discount to the new gross
        cart.update_quantity("1", 2).unwrap();
        assert_eq!(cart.lines[0].discount_cents, 2000);
    }

    #[test]
    fn test_totals_with_tier_discount() {
        let mut cart = Cart::new();
        cart.add_item(&test_batch("1", 10000, 5), 2).unwrap(); // 200.00
        cart.add_item(&test_batch("2", 5050, 5), 1).unwrap(); // 50.50
        cart.set_discount("1", 1000).unwrap(); // -10.00

        // (25050 - 1000) * 5% = 1202.5 → 1203
        let totals = cart.totals(DiscountRate::from_bps(500));
        assert_eq!(totals.subtotal_cents, 25050);
        assert_eq!(totals.item_discount_cents, 1000);
        assert_eq!(totals.tier_discount_cents, 1203);
        assert_eq!(totals.total_cents, 25050 - 1000 - 1203);
        assert_eq!(totals.cost_cents, 10000 + 2525);
        assert_eq!(totals.expected_profit_cents, totals.total_cents - 12525);
    }

    #[test]
    fn test_refresh_stock() {
        let mut cart = Cart::new();
        let mut batch = test_batch("1", 1000, 5);
        cart.add_item(&batch, 4).unwrap();

        batch.quantity = 3;
        assert!(cart.refresh_stock(&batch).is_err());
        assert_eq!(cart.lines[0].available_stock, 3);

        batch.quantity = 10;
        cart.refresh_stock(&batch).unwrap();
    }

    #[test]
    fn test_cart_size_limit() {
        let mut cart = Cart::new();
        for i in 0..MAX_CART_ITEMS {
            cart.add_item(&test_batch(&i.to_string(), 100, 1), 1).unwrap();
        }
        assert!(matches!(
            cart.add_item(&test_batch("extra", 100, 1), 1),
            Err(CoreError::CartTooLarge { .. })
        ));
    }
}
