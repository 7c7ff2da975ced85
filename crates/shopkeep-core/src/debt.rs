//! # Debt Aggregation & Payment Planning
//!
//! Customers may owe the shop (underpaid invoices) and the shop may owe
//! suppliers (purchases on credit). Both are plain [`Debt`] records; this
//! module rolls them up per party and plans how a payment is spread.
//!
//! ## FIFO Application
//! ```text
//! open debts (oldest first)     payment 700.00
//! ┌──────────────┬──────────┐
//! │ 2024-01-03   │  300.00  │ ◄── 300.00  settles
//! │ 2024-02-11   │  250.00  │ ◄── 250.00  settles
//! │ 2024-03-20   │  400.00  │ ◄── 150.00  250.00 left
//! └──────────────┴──────────┘
//! ```
//!
//! Paying more than the total outstanding is rejected rather than turned
//! into store credit.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Debt, DebtParty};
use crate::validation::validate_payment_amount;

// =============================================================================
// Aggregation
// =============================================================================

/// Roll-up of every debt held by one party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DebtSummary {
    pub party: DebtParty,
    pub party_id: String,
    /// All debts, settled included.
    pub debt_count: usize,
    pub open_count: usize,
    pub original_total_cents: i64,
    pub remaining_total_cents: i64,
    #[ts(as = "Option<String>")]
    pub oldest_open_at: Option<DateTime<Utc>>,
}

/// Groups debts by `(party, party_id)`.
///
/// Sorted by remaining balance descending, then by party id.
pub fn summarize(debts: &[Debt]) -> Vec<DebtSummary> {
    let mut by_party: HashMap<(DebtParty, &str), DebtSummary> = HashMap::new();

    for debt in debts {
        let summary = by_party
            .entry((debt.party, debt.party_id.as_str()))
            .or_insert_with(|| DebtSummary {
                party: debt.party,
                party_id: debt.party_id.clone(),
                debt_count: 0,
                open_count: 0,
                original_total_cents: 0,
                remaining_total_cents: 0,
                oldest_open_at: None,
            });

        summary.debt_count += 1;
        summary.original_total_cents += debt.original_cents;

        if debt.is_open() {
            summary.open_count += 1;
            summary.remaining_total_cents += debt.remaining_cents;
            summary.oldest_open_at = Some(match summary.oldest_open_at {
                Some(oldest) => oldest.min(debt.created_at),
                None => debt.created_at,
            });
        }
    }

    let mut summaries: Vec<DebtSummary> = by_party.into_values().collect();
    summaries.sort_by(|a, b| {
        b.remaining_total_cents
            .cmp(&a.remaining_total_cents)
            .then_with(|| a.party_id.cmp(&b.party_id))
    });
    summaries
}

/// Total still owed across open debts.
pub fn outstanding(debts: &[Debt]) -> Money {
    debts
        .iter()
        .filter(|d| d.is_open())
        .map(Debt::remaining)
        .sum()
}

// =============================================================================
// Payment Planning
// =============================================================================

/// The share of a payment applied to one debt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DebtAllocation {
    pub debt_id: String,
    pub invoice_id: Option<String>,
    pub amount_cents: i64,
    pub remaining_after_cents: i64,
    /// The debt reaches zero with this allocation.
    pub settles: bool,
}

/// How a payment will be spread over a party's open debts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentPlan {
    pub party: DebtParty,
    pub party_id: String,
    pub amount_cents: i64,
    pub allocations: Vec<DebtAllocation>,
    pub outstanding_after_cents: i64,
}

/// Plans a payment across one party's debts, oldest first.
///
/// Settled debts in the input are ignored. Debts created at the same instant
/// keep their input order.
pub fn plan_payment(debts: &[Debt], amount: Money) -> CoreResult<PaymentPlan> {
    validate_payment_amount(amount.cents())?;

    let mut open: Vec<&Debt> = debts.iter().filter(|d| d.is_open()).collect();
    let Some(first) = open.first() else {
        let who = debts
            .first()
            .map_or_else(|| "party".to_string(), |d| d.party_id.clone());
        return Err(CoreError::NoOutstandingDebt(who));
    };
    let (party, party_id) = (first.party, first.party_id.clone());

    let total = outstanding(debts);
    if amount > total {
        return Err(CoreError::PaymentExceedsDebt {
            amount: amount.cents(),
            outstanding: total.cents(),
        });
    }

    // Stable: equal timestamps keep insertion order
    open.sort_by_key(|d| d.created_at);

    let mut left = amount;
    let mut allocations = Vec::new();
    for debt in open {
        if left.is_zero() {
            break;
        }
        let take = debt.remaining().min(left);
        let remaining_after = debt.remaining() - take;
        left -= take;
        allocations.push(DebtAllocation {
            debt_id: debt.id.clone(),
            invoice_id: debt.invoice_id.clone(),
            amount_cents: take.cents(),
            remaining_after_cents: remaining_after.cents(),
            settles: remaining_after.is_zero(),
        });
    }

    Ok(PaymentPlan {
        party,
        party_id,
        amount_cents: amount.cents(),
        allocations,
        outstanding_after_cents: (total - amount).cents(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DebtStatus;
    use chrono::{Duration, TimeZone};

    fn debt(id: &str, party_id: &str, remaining: i64, day: u32) -> Debt {
        let at = Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap();
        Debt {
            id: id.to_string(),
            party: DebtParty::Customer,
            party_id: party_id.to_string(),
            invoice_id: Some(format!("inv-{}", id)),
            original_cents: remaining,
            remaining_cents: remaining,
            status: if remaining > 0 {
                DebtStatus::Open
            } else {
                DebtStatus::Settled
            },
            note: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_plan_payment_fifo() {
        // Deliberately out of order
        let debts = vec![
            debt("c", "p1", 40_000, 20),
            debt("a", "p1", 30_000, 3),
            debt("b", "p1", 25_000, 11),
        ];

        let plan = plan_payment(&debts, Money::from_cents(70_000)).unwrap();
        let got: Vec<(&str, i64, bool)> = plan
            .allocations
            .iter()
            .map(|a| (a.debt_id.as_str(), a.amount_cents, a.settles))
            .collect();

        assert_eq!(
            got,
            vec![("a", 30_000, true), ("b", 25_000, true), ("c", 15_000, false)]
        );
        assert_eq!(plan.allocations[2].remaining_after_cents, 25_000);
        assert_eq!(plan.outstanding_after_cents, 25_000);
        assert_eq!(plan.party_id, "p1");
    }

    #[test]
    fn test_plan_payment_same_timestamp_keeps_order() {
        let debts = vec![debt("first", "p1", 1_000, 5), debt("second", "p1", 1_000, 5)];
        let plan = plan_payment(&debts, Money::from_cents(1_000)).unwrap();
        assert_eq!(plan.allocations.len(), 1);
        assert_eq!(plan.allocations[0].debt_id, "first");
    }

    #[test]
    fn test_plan_payment_rejects_overpayment() {
        let debts = vec![debt("a", "p1", 5_000, 1)];
        let err = plan_payment(&debts, Money::from_cents(5_001)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::PaymentExceedsDebt {
                amount: 5_001,
                outstanding: 5_000
            }
        ));
    }

    #[test]
    fn test_plan_payment_rejects_non_positive_and_settled() {
        let debts = vec![debt("a", "p1", 5_000, 1)];
        assert!(plan_payment(&debts, Money::zero()).is_err());

        let settled = vec![debt("a", "p1", 0, 1)];
        assert!(matches!(
            plan_payment(&settled, Money::from_cents(100)),
            Err(CoreError::NoOutstandingDebt(_))
        ));
    }

    #[test]
    fn test_summarize() {
        let mut settled = debt("s", "p1", 0, 1);
        settled.original_cents = 9_000;
        let mut supplier = debt("x", "sup", 2_000, 2);
        supplier.party = DebtParty::Supplier;

        let debts = vec![
            settled,
            debt("a", "p1", 3_000, 4),
            debt("b", "p1", 1_000, 2),
            debt("c", "p2", 10_000, 9),
            supplier,
        ];

        let summaries = summarize(&debts);
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].party_id, "p2");

        let p1 = summaries.iter().find(|s| s.party_id == "p1").unwrap();
        assert_eq!(p1.debt_count, 3);
        assert_eq!(p1.open_count, 2);
        assert_eq!(p1.original_total_cents, 13_000);
        assert_eq!(p1.remaining_total_cents, 4_000);
        assert_eq!(
            p1.oldest_open_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap() + Duration::days(1))
        );

        let sup = summaries.iter().find(|s| s.party_id == "sup").unwrap();
        assert_eq!(sup.party, DebtParty::Supplier);
    }
}
