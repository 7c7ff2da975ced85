//! # Partial Returns
//!
//! Computes what a return against an invoice is worth and how the money
//! flows back.
//!
//! ## Refund Value
//! ```text
//! line refund = line net × returned / sold                (item discount shared)
//!             × total / (subtotal − item_discount)        (tier discount shared)
//! ```
//! The tier ratio uses the invoice's original amounts so repeated partial
//! returns are valued consistently. When a return brings every unit back,
//! the refund is exactly what is left of the invoice total.
//!
//! ## Money Flow
//! ```text
//! refund ──► remaining balance (and its debt) first
//!        └─► the rest as cash, never more than was paid
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Invoice, InvoiceStatus, ReturnLine};
use crate::validation::validate_quantity;

/// One line of a return request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnRequestLine {
    pub batch_id: String,
    pub quantity: i64,
}

/// The outcome of a return, ready to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnPlan {
    pub lines: Vec<ReturnLine>,
    /// `(invoice item id, returned quantity after this return)`.
    pub item_updates: Vec<(String, i64)>,
    pub refund_cents: i64,
    pub debt_reduction_cents: i64,
    pub cash_refund_cents: i64,
    pub total_after_cents: i64,
    pub paid_after_cents: i64,
    pub remaining_after_cents: i64,
    pub status_after: InvoiceStatus,
    pub fully_returned: bool,
}

/// Values a return against `invoice`.
///
/// Request lines for the same batch are merged.
pub fn plan_return(invoice: &Invoice, request: &[ReturnRequestLine]) -> CoreResult<ReturnPlan> {
    if invoice.status == InvoiceStatus::Returned {
        return Err(CoreError::AlreadyReturned(invoice.invoice_number.clone()));
    }
    if request.is_empty() {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        }
        .into());
    }

    let mut wanted: BTreeMap<&str, i64> = BTreeMap::new();
    for line in request {
        validate_quantity(line.quantity)?;
        *wanted.entry(line.batch_id.as_str()).or_insert(0) += line.quantity;
    }

    let base = invoice.subtotal_cents - invoice.item_discount_cents;
    let original_total = base - invoice.tier_discount_cents;

    let mut lines = Vec::with_capacity(wanted.len());
    let mut item_updates = Vec::with_capacity(wanted.len());
    for (batch_id, quantity) in wanted {
        let item = invoice
            .items
            .iter()
            .find(|i| i.batch_id == batch_id)
            .ok_or_else(|| CoreError::NotOnInvoice(batch_id.to_string()))?;

        if quantity > item.returnable() {
            return Err(CoreError::ReturnExceedsSold {
                item: format!("{} #{}", item.name, item.batch_number),
                returnable: item.returnable(),
                requested: quantity,
            });
        }

        let refund = item
            .net()
            .scale(quantity, item.quantity)
            .scale(original_total, base);

        lines.push(ReturnLine {
            batch_id: batch_id.to_string(),
            quantity,
            refund_cents: refund.cents(),
        });
        item_updates.push((item.id.clone(), item.returned_quantity + quantity));
    }

    let fully_returned = invoice.items.iter().all(|item| {
        let returned_now = item_updates
            .iter()
            .find(|(id, _)| *id == item.id)
            .map_or(item.returned_quantity, |(_, q)| *q);
        returned_now >= item.quantity
    });

    let computed: Money = lines.iter().map(|l| Money::from_cents(l.refund_cents)).sum();
    let refund = if fully_returned {
        invoice.total()
    } else {
        computed.min(invoice.total()).non_negative()
    };

    // Rounding drift lands on the last line so lines add up to the refund
    let drift = refund - computed;
    if let Some(last) = lines.last_mut() {
        last.refund_cents += drift.cents();
    }

    let debt_reduction = refund.min(invoice.remaining()).non_negative();
    let cash_refund = (refund - debt_reduction).min(Money::from_cents(invoice.paid_cents));

    let total_after = invoice.total() - refund;
    let paid_after = Money::from_cents(invoice.paid_cents) - cash_refund;
    let remaining_after = invoice.remaining() - debt_reduction;

    let status_after = if fully_returned {
        InvoiceStatus::Returned
    } else {
        InvoiceStatus::from_amounts(paid_after.cents(), remaining_after.cents())
    };

    Ok(ReturnPlan {
        lines,
        item_updates,
        refund_cents: refund.cents(),
        debt_reduction_cents: debt_reduction.cents(),
        cash_refund_cents: cash_refund.cents(),
        total_after_cents: total_after.cents(),
        paid_after_cents: paid_after.cents(),
        remaining_after_cents: remaining_after.cents(),
        status_after,
        fully_returned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InvoiceItem, InvoiceSource};
    use chrono::Utc;

    fn item(id: &str, price: i64, qty: i64, discount: i64) -> InvoiceItem {
        InvoiceItem {
            id: format!("item-{}", id),
            invoice_id: "inv".to_string(),
            batch_id: id.to_string(),
            name: format!("Product {}", id),
            color: String::new(),
            size: String::new(),
            unit: "pc".to_string(),
            batch_number: 1,
            unit_price_cents: price,
            cost_price_cents: price / 2,
            quantity: qty,
            discount_cents: discount,
            returned_quantity: 0,
        }
    }

    /// Two lines: 4 × 25.00 (−10.00) and 1 × 50.00, 10% tier discount.
    fn invoice(paid: i64) -> Invoice {
        let items = vec![item("a", 2_500, 4, 1_000), item("b", 5_000, 1, 0)];
        // subtotal 150.00, item discount 10.00, base 140.00, tier 14.00, total 126.00
        Invoice {
            id: "inv".to_string(),
            invoice_number: "INV-20240101-0001".to_string(),
            customer_id: Some("c1".to_string()),
            customer_name: Some("Mai".to_string()),
            source: InvoiceSource::PointOfSale,
            order_id: None,
            subtotal_cents: 15_000,
            item_discount_cents: 1_000,
            tier_discount_cents: 1_400,
            total_cents: 12_600,
            paid_cents: paid,
            remaining_cents: 12_600 - paid,
            points_awarded: 0,
            status: InvoiceStatus::from_amounts(paid, 12_600 - paid),
            note: None,
            items,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn req(batch_id: &str, quantity: i64) -> ReturnRequestLine {
        ReturnRequestLine {
            batch_id: batch_id.to_string(),
            quantity,
        }
    }

    #[test]
    fn test_partial_return_paid_invoice_is_cash() {
        let plan = plan_return(&invoice(12_600), &[req("a", 2)]).unwrap();

        // net 90.00 × 2/4 = 45.00, × 126/140 = 40.50
        assert_eq!(plan.refund_cents, 4_050);
        assert_eq!(plan.debt_reduction_cents, 0);
        assert_eq!(plan.cash_refund_cents, 4_050);
        assert_eq!(plan.total_after_cents, 8_550);
        assert_eq!(plan.paid_after_cents, 8_550);
        assert_eq!(plan.status_after, InvoiceStatus::Paid);
        assert!(!plan.fully_returned);
        assert_eq!(plan.item_updates, vec![("item-a".to_string(), 2)]);
    }

    #[test]
    fn test_return_reduces_debt_first() {
        // 30.00 paid, 96.00 owed
        let plan = plan_return(&invoice(3_000), &[req("b", 1)]).unwrap();

        // 50.00 × 126/140 = 45.00, all absorbed by the remainder
        assert_eq!(plan.refund_cents, 4_500);
        assert_eq!(plan.debt_reduction_cents, 4_500);
        assert_eq!(plan.cash_refund_cents, 0);
        assert_eq!(plan.remaining_after_cents, 5_100);
        assert_eq!(plan.status_after, InvoiceStatus::Partial);
    }

    #[test]
    fn test_full_return_refunds_everything() {
        let plan = plan_return(&invoice(10_000), &[req("a", 4), req("b", 1)]).unwrap();

        assert!(plan.fully_returned);
        assert_eq!(plan.refund_cents, 12_600);
        assert_eq!(plan.debt_reduction_cents, 2_600);
        assert_eq!(plan.cash_refund_cents, 10_000);
        assert_eq!(plan.total_after_cents, 0);
        assert_eq!(plan.status_after, InvoiceStatus::Returned);
        let line_sum: i64 = plan.lines.iter().map(|l| l.refund_cents).sum();
        assert_eq!(line_sum, 12_600);
    }

    #[test]
    fn test_duplicate_lines_merge() {
        let plan = plan_return(&invoice(12_600), &[req("a", 1), req("a", 1)]).unwrap();
        assert_eq!(plan.lines.len(), 1);
        assert_eq!(plan.lines[0].quantity, 2);
    }

    #[test]
    fn test_return_rejections() {
        let inv = invoice(12_600);
        assert!(matches!(
            plan_return(&inv, &[req("a", 5)]),
            Err(CoreError::ReturnExceedsSold { returnable: 4, .. })
        ));
        assert!(matches!(
            plan_return(&inv, &[req("zzz", 1)]),
            Err(CoreError::NotOnInvoice(_))
        ));
        assert!(plan_return(&inv, &[req("a", 0)]).is_err());
        assert!(plan_return(&inv, &[]).is_err());

        let mut returned = invoice(12_600);
        returned.status = InvoiceStatus::Returned;
        assert!(matches!(
            plan_return(&returned, &[req("a", 1)]),
            Err(CoreError::AlreadyReturned(_))
        ));
    }

    #[test]
    fn test_second_return_respects_previous() {
        let mut inv = invoice(12_600);
        inv.items[0].returned_quantity = 3;
        assert!(plan_return(&inv, &[req("a", 2)]).is_err());
        let plan = plan_return(&inv, &[req("a", 1)]).unwrap();
        assert_eq!(plan.item_updates, vec![("item-a".to_string(), 4)]);
    }
}
