//! # Storefront
//!
//! The customer-facing catalogue. A batch is listed only while it is
//! flagged visible, active and in stock; customers pick an option (batch)
//! of a product and place an order that the shop later confirms.
//!
//! ```text
//! batches ──► visible? ──► group by product name ──► StorefrontProduct
//!                                                     ├── option (Blue, M)
//!                                                     └── option (Red, L)
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Batch, OrderItem};
use crate::validation::{validate_name, validate_phone, validate_quantity};
use crate::MAX_CART_ITEMS;

/// Listed on the storefront right now.
pub fn is_visible(batch: &Batch) -> bool {
    batch.storefront_visible && batch.is_active && batch.quantity > 0
}

/// One purchasable option of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StorefrontOption {
    pub batch_id: String,
    pub color: String,
    pub size: String,
    pub quality: String,
    pub price_cents: i64,
    pub in_stock: i64,
}

/// A product as customers see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StorefrontProduct {
    pub name: String,
    pub unit: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// Lowest option price.
    pub from_price_cents: i64,
    pub options: Vec<StorefrontOption>,
}

/// Builds the catalogue from all batches.
///
/// Products are grouped by case-insensitive name and sorted by it; options
/// are sorted by color, size then price.
pub fn listing(batches: &[Batch]) -> Vec<StorefrontProduct> {
    let mut products: BTreeMap<String, StorefrontProduct> = BTreeMap::new();

    for batch in batches.iter().filter(|b| is_visible(b)) {
        let product = products
            .entry(batch.name.trim().to_lowercase())
            .or_insert_with(|| StorefrontProduct {
                name: batch.name.trim().to_string(),
                unit: batch.unit.clone(),
                description: None,
                image_url: None,
                from_price_cents: batch.sale_price_cents,
                options: Vec::new(),
            });

        if product.description.is_none() {
            product.description = batch.description.clone();
        }
        if product.image_url.is_none() {
            product.image_url = batch.image_url.clone();
        }
        product.from_price_cents = product.from_price_cents.min(batch.sale_price_cents);
        product.options.push(StorefrontOption {
            batch_id: batch.id.clone(),
            color: batch.color.clone(),
            size: batch.size.clone(),
            quality: batch.quality.clone(),
            price_cents: batch.sale_price_cents,
            in_stock: batch.quantity,
        });
    }

    products
        .into_values()
        .map(|mut p| {
            p.options.sort_by(|a, b| {
                a.color
                    .cmp(&b.color)
                    .then_with(|| a.size.cmp(&b.size))
                    .then_with(|| a.price_cents.cmp(&b.price_cents))
            });
            p
        })
        .collect()
}

/// Case-insensitive substring filter over name, color and size.
///
/// A product matching by name keeps every option; otherwise only the
/// matching options are kept.
pub fn filter(listing: Vec<StorefrontProduct>, query: &str) -> Vec<StorefrontProduct> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return listing;
    }

    listing
        .into_iter()
        .filter_map(|mut product| {
            if product.name.to_lowercase().contains(&needle) {
                return Some(product);
            }
            product.options.retain(|o| {
                o.color.to_lowercase().contains(&needle) || o.size.to_lowercase().contains(&needle)
            });
            if product.options.is_empty() {
                None
            } else {
                product.from_price_cents = product
                    .options
                    .iter()
                    .map(|o| o.price_cents)
                    .min()
                    .unwrap_or(product.from_price_cents);
                Some(product)
            }
        })
        .collect()
}

/// Contact details supplied with an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderContact {
    pub name: String,
    pub phone: String,
    pub address: Option<String>,
}

impl OrderContact {
    /// Returns an error for a blank name or malformed phone.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name("customer name", &self.name)?;
        validate_phone(&self.phone)
    }
}

/// A requested order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderLineRequest {
    pub batch_id: String,
    pub quantity: i64,
}

/// Checks an order request against live batches.
///
/// Returns the order items with prices frozen from the batches (ids are
/// left empty for the repository to assign). Lines for the same batch are
/// merged.
pub fn validate_order_lines(
    batches: &[Batch],
    contact: &OrderContact,
    lines: &[OrderLineRequest],
) -> CoreResult<(Vec<OrderItem>, Money)> {
    contact.validate()?;

    if lines.is_empty() {
        return Err(CoreError::EmptyCart);
    }

    let mut merged: Vec<(&str, i64)> = Vec::new();
    for line in lines {
        validate_quantity(line.quantity)?;
        match merged.iter_mut().find(|(id, _)| *id == line.batch_id) {
            Some((_, qty)) => *qty += line.quantity,
            None => merged.push((line.batch_id.as_str(), line.quantity)),
        }
    }
    if merged.len() > MAX_CART_ITEMS {
        return Err(CoreError::CartTooLarge {
            max: MAX_CART_ITEMS,
        });
    }

    let mut items = Vec::with_capacity(merged.len());
    for (batch_id, quantity) in merged {
        validate_quantity(quantity)?;
        let batch = batches
            .iter()
            .find(|b| b.id == batch_id)
            .ok_or_else(|| CoreError::BatchNotFound(batch_id.to_string()))?;

        if !is_visible(batch) && batch.storefront_visible && batch.is_active {
            // Listed but sold out
            return Err(CoreError::InsufficientStock {
                item: batch.label(),
                available: batch.quantity,
                requested: quantity,
            });
        }
        if !is_visible(batch) {
            return Err(CoreError::NotOnStorefront(batch_id.to_string()));
        }
        if quantity > batch.quantity {
            return Err(CoreError::InsufficientStock {
                item: batch.label(),
                available: batch.quantity,
                requested: quantity,
            });
        }

        items.push(OrderItem {
            id: String::new(),
            order_id: String::new(),
            batch_id: batch.id.clone(),
            name: batch.name.clone(),
            color: batch.color.clone(),
            size: batch.size.clone(),
            unit: batch.unit.clone(),
            unit_price_cents: batch.sale_price_cents,
            quantity,
        });
    }

    let total = items.iter().map(OrderItem::line_total).sum();
    Ok((items, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn batch(id: &str, name: &str, color: &str, price: i64, qty: i64, visible: bool) -> Batch {
        Batch {
            id: id.to_string(),
            name: name.to_string(),
            color: color.to_string(),
            quality: "A".to_string(),
            size: "M".to_string(),
            unit: "pc".to_string(),
            batch_number: 1,
            cost_price_cents: price / 2,
            sale_price_cents: price,
            quantity: qty,
            storefront_visible: visible,
            description: None,
            image_url: None,
            supplier_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn catalogue() -> Vec<Batch> {
        vec![
            batch("1", "Linen Shirt", "Blue", 3_000, 5, true),
            batch("2", "linen shirt ", "Red", 2_800, 2, true),
            batch("3", "Linen Shirt", "Green", 3_000, 0, true),
            batch("4", "Wool Hat", "Grey", 1_500, 9, false),
            batch("5", "Canvas Tote", "Natural", 1_200, 3, true),
        ]
    }

    fn contact() -> OrderContact {
        OrderContact {
            name: "Lan".to_string(),
            phone: "0901 234 567".to_string(),
            address: Some("12 Market St".to_string()),
        }
    }

    #[test]
    fn test_listing_groups_visible_batches() {
        let products = listing(&catalogue());

        let names: Vec<&str> = products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Canvas Tote", "Linen Shirt"]);

        let shirt = &products[1];
        assert_eq!(shirt.options.len(), 2);
        assert_eq!(shirt.from_price_cents, 2_800);
        assert_eq!(shirt.options[0].color, "Blue");
    }

    #[test]
    fn test_filter() {
        let products = filter(listing(&catalogue()), "red");
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].options.len(), 1);
        assert_eq!(products[0].from_price_cents, 2_800);

        assert_eq!(filter(listing(&catalogue()), "TOTE").len(), 1);
        assert_eq!(filter(listing(&catalogue()), "").len(), 2);
        assert!(filter(listing(&catalogue()), "velvet").is_empty());
    }

    #[test]
    fn test_validate_order_lines() {
        let lines = vec![
            OrderLineRequest {
                batch_id: "1".to_string(),
                quantity: 2,
            },
            OrderLineRequest {
                batch_id: "5".to_string(),
                quantity: 1,
            },
            OrderLineRequest {
                batch_id: "1".to_string(),
                quantity: 1,
            },
        ];

        let (items, total) = validate_order_lines(&catalogue(), &contact(), &lines).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].quantity, 3);
        assert_eq!(total.cents(), 3 * 3_000 + 1_200);
    }

    #[test]
    fn test_validate_order_lines_rejections() {
        let line = |id: &str, q: i64| {
            vec![OrderLineRequest {
                batch_id: id.to_string(),
                quantity: q,
            }]
        };
        let batches = catalogue();

        assert!(matches!(
            validate_order_lines(&batches, &contact(), &line("4", 1)),
            Err(CoreError::NotOnStorefront(_))
        ));
        assert!(matches!(
            validate_order_lines(&batches, &contact(), &line("3", 1)),
            Err(CoreError::InsufficientStock { .. })
        ));
        assert!(matches!(
            validate_order_lines(&batches, &contact(), &line("2", 3)),
            Err(CoreError::InsufficientStock { available: 2, .. })
        ));
        assert!(matches!(
            validate_order_lines(&batches, &contact(), &line("nope", 1)),
            Err(CoreError::BatchNotFound(_))
        ));
        assert!(matches!(
            validate_order_lines(&batches, &contact(), &[]),
            Err(CoreError::EmptyCart)
        ));

        let mut no_phone = contact();
        no_phone.phone = String::new();
        assert!(no_phone.validate().is_err());
        assert!(validate_order_lines(&batches, &no_phone, &line("1", 1)).is_err());
    }
}
