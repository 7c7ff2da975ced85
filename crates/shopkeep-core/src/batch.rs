//! # Inventory Batch Rules
//!
//! Products arrive in lots. Each lot is a [`Batch`] with its own cost price,
//! sale price and quantity. Batches that share name, color, quality, size and
//! unit form a *variant group*:
//!
//! ```text
//! Linen Shirt / Blue / A / M / pc
//! ├── #1  cost 10.00  sale 25.00  qty 0    (Blue tag)
//! ├── #2  cost 11.00  sale 25.00  qty 4    (Green tag)
//! └── #3  cost 12.50  sale 27.00  qty 10   (Amber tag)
//! ```
//!
//! ## Numbering Rule
//! - A new batch takes `max(number) + 1` inside its group (1 for a new group).
//! - After a batch is removed the group is compacted back to `1..=n`, ordered
//!   by arrival, so numbers never have gaps.
//!
//! ## Coloring Rule
//! Each number maps to a fixed palette slot so the counter staff can tell lots
//! of the same variant apart at a glance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::Batch;

// =============================================================================
// Variant Key
// =============================================================================

/// Normalised grouping key: name + color + quality + size + unit.
///
/// Normalisation trims, lower-cases and collapses inner whitespace so that
/// `"Linen  Shirt "` and `"linen shirt"` land in the same group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VariantKey {
    pub name: String,
    pub color: String,
    pub quality: String,
    pub size: String,
    pub unit: String,
}

impl VariantKey {
    pub fn new(name: &str, color: &str, quality: &str, size: &str, unit: &str) -> Self {
        VariantKey {
            name: normalize(name),
            color: normalize(color),
            quality: normalize(quality),
            size: normalize(size),
            unit: normalize(unit),
        }
    }

    /// Single-string form used as an indexed database column.
    pub fn storage_key(&self) -> String {
        [
            self.name.as_str(),
            self.color.as_str(),
            self.quality.as_str(),
            self.size.as_str(),
            self.unit.as_str(),
        ]
        .join("\u{1f}")
    }
}

fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// =============================================================================
// Numbering
// =============================================================================

/// Returns the number the next batch of a group should take.
///
/// `existing` are the group's active batches.
pub fn next_batch_number(existing: &[Batch]) -> i64 {
    existing
        .iter()
        .map(|b| b.batch_number)
        .max()
        .map_or(1, |max| max.max(0) + 1)
}

/// Compacts a group's numbering to `1..=n` in arrival order.
///
/// Inactive batches are ignored. Returns `(batch_id, new_number)` for the
/// batches whose number changes; an already-sequential group yields nothing.
pub fn renumber(group: &[Batch]) -> Vec<(String, i64)> {
    let mut active: Vec<&Batch> = group.iter().filter(|b| b.is_active).collect();
    active.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then(a.batch_number.cmp(&b.batch_number))
            .then(a.id.cmp(&b.id))
    });

    active
        .into_iter()
        .enumerate()
        .filter_map(|(idx, batch)| {
            let number = idx as i64 + 1;
            (batch.batch_number != number).then(|| (batch.id.clone(), number))
        })
        .collect()
}

// =============================================================================
// Coloring
// =============================================================================

/// Display tag for a batch number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BatchColor {
    Blue,
    Green,
    Amber,
    Purple,
    Rose,
    Teal,
    Orange,
    Slate,
}

impl BatchColor {
    pub const PALETTE: [BatchColor; 8] = [
        BatchColor::Blue,
        BatchColor::Green,
        BatchColor::Amber,
        BatchColor::Purple,
        BatchColor::Rose,
        BatchColor::Teal,
        BatchColor::Orange,
        BatchColor::Slate,
    ];

    /// CSS hex value for the tag.
    pub fn hex(&self) -> &'static str {
        match self {
            BatchColor::Blue => "#3b82f6",
            BatchColor::Green => "#22c55e",
            BatchColor::Amber => "#f59e0b",
            BatchColor::Purple => "#a855f7",
            BatchColor::Rose => "#f43f5e",
            BatchColor::Teal => "#14b8a6",
            BatchColor::Orange => "#f97316",
            BatchColor::Slate => "#64748b",
        }
    }
}

/// Maps a batch number to its palette slot; cycles every 8 batches.
pub fn batch_color(batch_number: i64) -> BatchColor {
    let len = BatchColor::PALETTE.len() as i64;
    let slot = (batch_number.max(1) - 1) % len;
    BatchColor::PALETTE[slot as usize]
}

// =============================================================================
// Stock Level
// =============================================================================

/// Coarse stock classification for inventory screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    OutOfStock,
    Low,
    InStock,
}

/// Classifies a quantity against the low-stock threshold.
pub fn stock_level(quantity: i64, low_threshold: i64) -> StockLevel {
    if quantity <= 0 {
        StockLevel::OutOfStock
    } else if quantity <= low_threshold {
        StockLevel::Low
    } else {
        StockLevel::InStock
    }
}

// =============================================================================
// Variant Groups
// =============================================================================

/// A batch with its derived display fields.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BatchView {
    #[serde(flatten)]
    pub batch: Batch,
    pub color_tag: BatchColor,
    pub stock_level: StockLevel,
}

impl BatchView {
    pub fn new(batch: Batch, low_threshold: i64) -> Self {
        BatchView {
            color_tag: batch_color(batch.batch_number),
            stock_level: stock_level(batch.quantity, low_threshold),
            batch,
        }
    }
}

/// All batches of one variant with aggregate figures.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VariantGroup {
    pub key: VariantKey,
    /// Display name taken from the group's first batch.
    pub name: String,
    /// Ordered by batch number.
    pub batches: Vec<BatchView>,
    pub total_quantity: i64,
    /// Σ cost × quantity (inventory valuation at cost).
    pub total_cost_value_cents: i64,
    /// Σ sale price × quantity.
    pub total_sale_value_cents: i64,
    pub min_sale_price_cents: i64,
    pub max_sale_price_cents: i64,
    /// Batches of this variant are sold at different prices.
    pub price_varies: bool,
    pub stock_level: StockLevel,
}

/// Groups batches by variant, sorted by key.
///
/// Callers pass active batches; inactive ones are skipped anyway.
pub fn group_batches(batches: Vec<Batch>, low_threshold: i64) -> Vec<VariantGroup> {
    let mut by_key: BTreeMap<VariantKey, Vec<Batch>> = BTreeMap::new();
    for batch in batches.into_iter().filter(|b| b.is_active) {
        by_key.entry(batch.variant_key()).or_default().push(batch);
    }

    by_key
        .into_iter()
        .map(|(key, mut members)| {
            members.sort_by_key(|b| b.batch_number);

            let total_quantity: i64 = members.iter().map(|b| b.quantity).sum();
            let total_cost: Money = members
                .iter()
                .map(|b| b.cost_price().multiply_quantity(b.quantity))
                .sum();
            let total_sale: Money = members
                .iter()
                .map(|b| b.sale_price().multiply_quantity(b.quantity))
                .sum();
            let min_price = members.iter().map(|b| b.sale_price_cents).min().unwrap_or(0);
            let max_price = members.iter().map(|b| b.sale_price_cents).max().unwrap_or(0);
            let name = members
                .first()
                .map(|b| b.name.trim().to_string())
                .unwrap_or_default();

            VariantGroup {
                key,
                name,
                total_quantity,
                total_cost_value_cents: total_cost.cents(),
                total_sale_value_cents: total_sale.cents(),
                min_sale_price_cents: min_price,
                max_sale_price_cents: max_price,
                price_varies: min_price != max_price,
                stock_level: stock_level(total_quantity, low_threshold),
                batches: members
                    .into_iter()
                    .map(|b| BatchView::new(b, low_threshold))
                    .collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn batch(id: &str, name: &str, number: i64, price: i64, qty: i64, age_days: i64) -> Batch {
        let created = Utc::now() - Duration::days(age_days);
        Batch {
            id: id.to_string(),
            name: name.to_string(),
            color: "Blue".to_string(),
            quality: "A".to_string(),
            size: "M".to_string(),
            unit: "pc".to_string(),
            batch_number: number,
            cost_price_cents: 1000,
            sale_price_cents: price,
            quantity: qty,
            storefront_visible: true,
            description: None,
            image_url: None,
            supplier_id: None,
            is_active: true,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_variant_key_normalizes() {
        let a = VariantKey::new(" Linen  Shirt", "BLUE", "a", "M ", "pc");
        let b = VariantKey::new("linen shirt", "blue", "A", "m", "PC");
        assert_eq!(a, b);
        assert_ne!(a, VariantKey::new("linen shirt", "red", "A", "m", "PC"));
    }

    #[test]
    fn test_next_batch_number() {
        assert_eq!(next_batch_number(&[]), 1);
        let group = vec![batch("a", "Shirt", 1, 2500, 1, 3), batch("b", "Shirt", 3, 2500, 1, 1)];
        assert_eq!(next_batch_number(&group), 4);
    }

    #[test]
    fn test_renumber_compacts_by_arrival() {
        // #1 was deleted; #2 and #3 remain
        let group = vec![
            batch("c", "Shirt", 3, 2500, 1, 1),
            batch("b", "Shirt", 2, 2500, 1, 5),
        ];
        let changes = renumber(&group);
        assert_eq!(
            changes,
            vec![("b".to_string(), 1), ("c".to_string(), 2)]
        );
    }

    #[test]
    fn test_renumber_sequential_group_is_noop() {
        let group = vec![
            batch("a", "Shirt", 1, 2500, 1, 5),
            batch("b", "Shirt", 2, 2500, 1, 1),
        ];
        assert!(renumber(&group).is_empty());
    }

    #[test]
    fn test_renumber_ignores_inactive() {
        let mut gone = batch("a", "Shirt", 1, 2500, 1, 9);
        gone.is_active = false;
        let group = vec![gone, batch("b", "Shirt", 2, 2500, 1, 1)];
        assert_eq!(renumber(&group), vec![("b".to_string(), 1)]);
    }

    #[test]
    fn test_batch_color_cycles() {
        assert_eq!(batch_color(1), BatchColor::Blue);
        assert_eq!(batch_color(2), BatchColor::Green);
        assert_eq!(batch_color(8), BatchColor::Slate);
        assert_eq!(batch_color(9), BatchColor::Blue);
        assert_eq!(batch_color(0), BatchColor::Blue);
        assert_eq!(BatchColor::Amber.hex(), "#f59e0b");
    }

    #[test]
    fn test_stock_level() {
        assert_eq!(stock_level(0, 5), StockLevel::OutOfStock);
        assert_eq!(stock_level(5, 5), StockLevel::Low);
        assert_eq!(stock_level(6, 5), StockLevel::InStock);
    }

    #[test]
    fn test_group_batches() {
        let batches = vec![
            batch("b", "Shirt", 2, 2700, 4, 1),
            batch("a", "Shirt", 1, 2500, 2, 3),
            batch("x", "Apron", 1, 900, 10, 2),
        ];

        let groups = group_batches(batches, 5);
        assert_eq!(groups.len(), 2);

        // Sorted by normalised name: apron before shirt
        assert_eq!(groups[0].name, "Apron");
        let shirt = &groups[1];
        assert_eq!(shirt.batches[0].batch.id, "a");
        assert_eq!(shirt.batches[1].color_tag, BatchColor::Green);
        assert_eq!(shirt.total_quantity, 6);
        assert_eq!(shirt.total_cost_value_cents, 6000);
        assert_eq!(shirt.total_sale_value_cents, 2 * 2500 + 4 * 2700);
        assert!(shirt.price_varies);
        assert_eq!(shirt.stock_level, StockLevel::InStock);
        assert_eq!(groups[0].batches[0].stock_level, StockLevel::InStock);
    }

    #[test]
    fn test_group_totals_at_price_and_stock_ceilings() {
        use crate::{MAX_PRICE_CENTS, MAX_STOCK};

        let mut first = batch("a", "Coat", 1, MAX_PRICE_CENTS, MAX_STOCK, 2);
        first.cost_price_cents = MAX_PRICE_CENTS;
        let second = batch("b", "Coat", 2, MAX_PRICE_CENTS, MAX_STOCK, 1);

        let groups = group_batches(vec![first, second], 5);
        let coat = &groups[0];
        assert_eq!(coat.total_quantity, 2 * MAX_STOCK);
        assert_eq!(coat.total_sale_value_cents, 2 * MAX_PRICE_CENTS * MAX_STOCK);
        assert_eq!(
            coat.total_cost_value_cents,
            MAX_PRICE_CENTS * MAX_STOCK + 1000 * MAX_STOCK
        );
    }
}
