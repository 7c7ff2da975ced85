//! # Loyalty: VIP Tiers and Points
//!
//! A customer's tier is derived from cumulative *paid* spend, never from
//! invoiced totals, so unpaid debt does not unlock discounts.
//!
//! ```text
//! spend:   0 ────── 5,000 ─────── 20,000 ─────── 50,000 ──────►
//! tier:    Regular   │  Silver 3%   │   Gold 5%    │  Platinum 10%
//! ```
//!
//! Points accrue on money actually received: at the counter, on later debt
//! payments, and are reversed on cash refunds.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Customer, DiscountRate, VipTier};

/// One tier threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TierRule {
    pub tier: VipTier,
    /// Cumulative paid spend needed to reach the tier.
    pub min_spend_cents: i64,
    /// Discount granted at checkout.
    pub discount_bps: u32,
}

/// A customer's loyalty position: paid spend, points and derived tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Standing {
    pub total_spent_cents: i64,
    pub loyalty_points: i64,
    pub vip_tier: VipTier,
}

impl Standing {
    pub fn of(customer: &Customer) -> Self {
        Standing {
            total_spent_cents: customer.total_spent_cents,
            loyalty_points: customer.loyalty_points,
            vip_tier: customer.vip_tier,
        }
    }
}

/// Tier thresholds and point accrual rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LoyaltyPolicy {
    /// Cents that must be paid to earn one point.
    pub points_per_unit_cents: i64,
    /// Rules above `Regular`, ascending.
    pub tiers: Vec<TierRule>,
}

impl Default for LoyaltyPolicy {
    fn default() -> Self {
        LoyaltyPolicy {
            points_per_unit_cents: 10_000,
            tiers: vec![
                TierRule {
                    tier: VipTier::Silver,
                    min_spend_cents: 500_000,
                    discount_bps: 300,
                },
                TierRule {
                    tier: VipTier::Gold,
                    min_spend_cents: 2_000_000,
                    discount_bps: 500,
                },
                TierRule {
                    tier: VipTier::Platinum,
                    min_spend_cents: 5_000_000,
                    discount_bps: 1000,
                },
            ],
        }
    }
}

impl LoyaltyPolicy {
    /// Checks the policy is usable.
    ///
    /// ## Rules
    /// - `points_per_unit_cents` > 0
    /// - no rule for `Regular` (it is the implicit floor)
    /// - tiers and thresholds strictly ascending, thresholds > 0
    /// - discounts within 0..=10000 bps
    pub fn validate(&self) -> CoreResult<()> {
        if self.points_per_unit_cents <= 0 {
            return Err(CoreError::InvalidPolicy(
                "points_per_unit_cents must be positive".to_string(),
            ));
        }

        let mut previous: Option<&TierRule> = None;
        for rule in &self.tiers {
            if rule.tier == VipTier::Regular {
                return Err(CoreError::InvalidPolicy(
                    "regular tier cannot have a threshold".to_string(),
                ));
            }
            if rule.min_spend_cents <= 0 {
                return Err(CoreError::InvalidPolicy(format!(
                    "{:?} threshold must be positive",
                    rule.tier
                )));
            }
            if rule.discount_bps > 10000 {
                return Err(CoreError::InvalidPolicy(format!(
                    "{:?} discount exceeds 100%",
                    rule.tier
                )));
            }
            if let Some(prev) = previous {
                if rule.tier <= prev.tier || rule.min_spend_cents <= prev.min_spend_cents {
                    return Err(CoreError::InvalidPolicy(
                        "tiers must be strictly ascending".to_string(),
                    ));
                }
            }
            previous = Some(rule);
        }

        Ok(())
    }

    /// Highest tier whose threshold `spend` meets.
    pub fn tier_for(&self, spend: Money) -> VipTier {
        self.tiers
            .iter()
            .filter(|rule| spend.cents() >= rule.min_spend_cents)
            .map(|rule| rule.tier)
            .max()
            .unwrap_or(VipTier::Regular)
    }

    /// Checkout discount for a tier.
    pub fn discount_rate(&self, tier: VipTier) -> DiscountRate {
        self.tiers
            .iter()
            .find(|rule| rule.tier == tier)
            .map_or(DiscountRate::zero(), |rule| {
                DiscountRate::from_bps(rule.discount_bps)
            })
    }

    /// Points earned for a paid amount (floored; nothing for ≤ 0).
    pub fn points_for(&self, paid: Money) -> i64 {
        if paid.cents() <= 0 || self.points_per_unit_cents <= 0 {
            return 0;
        }
        paid.cents() / self.points_per_unit_cents
    }

    /// Standing after money is received from the customer.
    ///
    /// Returns the new standing and the points earned.
    pub fn credit(&self, standing: Standing, paid: Money) -> (Standing, i64) {
        let earned = self.points_for(paid);
        let spent = standing.total_spent_cents + paid.cents().max(0);
        let next = Standing {
            total_spent_cents: spent,
            loyalty_points: standing.loyalty_points + earned,
            vip_tier: self.tier_for(Money::from_cents(spent)),
        };
        (next, earned)
    }

    /// Standing after cash is refunded to the customer.
    ///
    /// Spend never drops below zero and at most the current balance of
    /// points is reversed. Returns the new standing and the points reversed.
    pub fn debit(&self, standing: Standing, refunded: Money) -> (Standing, i64) {
        let reversed = self
            .points_for(refunded)
            .min(standing.loyalty_points.max(0));
        let spent = (standing.total_spent_cents - refunded.cents().max(0)).max(0);
        let next = Standing {
            total_spent_cents: spent,
            loyalty_points: standing.loyalty_points - reversed,
            vip_tier: self.tier_for(Money::from_cents(spent)),
        };
        (next, reversed)
    }

    /// Next tier above the current spend and how much is still needed.
    pub fn next_tier(&self, spend: Money) -> Option<(VipTier, Money)> {
        self.tiers
            .iter()
            .filter(|rule| spend.cents() < rule.min_spend_cents)
            .min_by_key(|rule| rule.min_spend_cents)
            .map(|rule| (rule.tier, Money::from_cents(rule.min_spend_cents) - spend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_valid() {
        assert!(LoyaltyPolicy::default().validate().is_ok());
    }

    #[test]
    fn test_tier_for_thresholds() {
        let policy = LoyaltyPolicy::default();
        assert_eq!(policy.tier_for(Money::zero()), VipTier::Regular);
        assert_eq!(policy.tier_for(Money::from_cents(499_999)), VipTier::Regular);
        assert_eq!(policy.tier_for(Money::from_cents(500_000)), VipTier::Silver);
        assert_eq!(policy.tier_for(Money::from_cents(2_000_000)), VipTier::Gold);
        assert_eq!(policy.tier_for(Money::from_cents(9_000_000)), VipTier::Platinum);
    }

    #[test]
    fn test_discount_rate() {
        let policy = LoyaltyPolicy::default();
        assert_eq!(policy.discount_rate(VipTier::Regular).bps(), 0);
        assert_eq!(policy.discount_rate(VipTier::Silver).bps(), 300);
        assert_eq!(policy.discount_rate(VipTier::Platinum).bps(), 1000);
    }

    #[test]
    fn test_points_for_floors() {
        let policy = LoyaltyPolicy::default();
        assert_eq!(policy.points_for(Money::from_cents(9_999)), 0);
        assert_eq!(policy.points_for(Money::from_cents(10_000)), 1);
        assert_eq!(policy.points_for(Money::from_cents(25_050)), 2);
        assert_eq!(policy.points_for(Money::from_cents(-10_000)), 0);
    }

    #[test]
    fn test_next_tier() {
        let policy = LoyaltyPolicy::default();
        assert_eq!(
            policy.next_tier(Money::from_cents(100_000)),
            Some((VipTier::Silver, Money::from_cents(400_000)))
        );
        assert_eq!(policy.next_tier(Money::from_cents(6_000_000)), None);
    }

    #[test]
    fn test_credit_and_debit() {
        let policy = LoyaltyPolicy::default();
        let start = Standing {
            total_spent_cents: 490_000,
            loyalty_points: 49,
            vip_tier: VipTier::Regular,
        };

        let (after, earned) = policy.credit(start, Money::from_cents(25_000));
        assert_eq!(earned, 2);
        assert_eq!(after.total_spent_cents, 515_000);
        assert_eq!(after.loyalty_points, 51);
        assert_eq!(after.vip_tier, VipTier::Silver);

        // Refund more than was ever spent: floors at zero, points capped
        let (back, reversed) = policy.debit(after, Money::from_cents(900_000));
        assert_eq!(back.total_spent_cents, 0);
        assert_eq!(reversed, 51);
        assert_eq!(back.loyalty_points, 0);
        assert_eq!(back.vip_tier, VipTier::Regular);
    }

    #[test]
    fn test_validate_rejects_bad_policies() {
        let mut policy = LoyaltyPolicy::default();
        policy.points_per_unit_cents = 0;
        assert!(policy.validate().is_err());

        let mut policy = LoyaltyPolicy::default();
        policy.tiers.swap(0, 1);
        assert!(policy.validate().is_err());

        let mut policy = LoyaltyPolicy::default();
        policy.tiers[0].tier = VipTier::Regular;
        assert!(policy.validate().is_err());

        let mut policy = LoyaltyPolicy::default();
        policy.tiers[2].discount_bps = 20_000;
        assert!(policy.validate().is_err());
    }
}
