//! Price breakdowns.

use crate::catalog::{CartSnapshot, LineItem};
use crate::coupon::{AppliedDiscount, CouponOutcome, CouponRejection};
use crate::engine::CartRequest;
use crate::error::PricingError;
use crate::ids::{CartId, CouponCode, ItemId, UserId};
use crate::money::{Currency, Money};
use crate::shipping::ShippingQuote;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Complete pricing breakdown for a cart.
///
/// Always satisfies `grand_total = subtotal - discount_total + shipping_total`,
/// `0 <= discount_total <= subtotal` and `grand_total >= 0`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceBreakdown {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub currency: Currency,
    /// The instant coupons were evaluated at.
    pub priced_at: DateTime<Utc>,
    /// Resolved lines in cart order.
    pub line_items: Vec<LineItem>,
    /// Applied discounts in application order.
    pub discounts: Vec<AppliedDiscount>,
    pub shipping: ShippingQuote,
    /// Subtotal before discounts.
    pub subtotal: Money,
    /// Total discount amount.
    pub discount_total: Money,
    /// Shipping cost.
    pub shipping_total: Money,
    /// Final total (subtotal - discounts + shipping).
    pub grand_total: Money,
    /// Coupons that were not applied, in request order.
    pub warnings: Vec<CouponRejection>,
}

impl PriceBreakdown {
    /// Fold stage results into a breakdown and check its invariants.
    pub fn fold(
        request: &CartRequest,
        snapshot: CartSnapshot,
        coupons: CouponOutcome,
        shipping: ShippingQuote,
    ) -> Result<Self, PricingError> {
        let currency = snapshot.currency();
        let subtotal = snapshot.subtotal();
        let discount_total = Money::try_sum(coupons.discounts.iter().map(|d| &d.amount), currency)
            .ok_or(PricingError::Overflow)?;
        let shipping_total = shipping.total;
        let grand_total = subtotal
            .try_subtract(&discount_total)
            .and_then(|m| m.try_add(&shipping_total))
            .ok_or(PricingError::Overflow)?;

        let breakdown = Self {
            cart_id: request.cart_id.clone(),
            user_id: request.user_id.clone(),
            currency,
            priced_at: request.as_of,
            line_items: snapshot.into_lines(),
            discounts: coupons.discounts,
            shipping,
            subtotal,
            discount_total,
            shipping_total,
            grand_total,
            warnings: coupons.rejections,
        };
        breakdown.verify()?;
        Ok(breakdown)
    }

    /// Re-check every total against its parts.
    pub fn verify(&self) -> Result<(), PricingError> {
        let violated = |msg: String| Err(PricingError::InvariantViolated(msg));

        let amounts = [
            &self.subtotal,
            &self.discount_total,
            &self.shipping_total,
            &self.grand_total,
            &self.shipping.total,
        ];
        if let Some(other) = amounts.iter().find(|m| m.currency != self.currency) {
            return Err(PricingError::CurrencyMismatch {
                expected: self.currency,
                got: other.currency,
            });
        }

        let line_sum = Money::try_sum(self.line_items.iter().map(|l| &l.line_subtotal), self.currency)
            .ok_or(PricingError::Overflow)?;
        if line_sum != self.subtotal {
            return violated(format!(
                "subtotal {} does not match line items {}",
                self.subtotal, line_sum
            ));
        }

        for discount in &self.discounts {
            if discount.amount.is_negative() {
                return violated(format!("discount {} is negative", discount.code));
            }
            let allocated = Money::try_sum(discount.allocations.iter().map(|a| &a.amount), self.currency)
                .ok_or(PricingError::Overflow)?;
            if allocated != discount.amount {
                return violated(format!(
                    "discount {} allocates {} of {}",
                    discount.code, allocated, discount.amount
                ));
            }
        }

        let discount_sum = Money::try_sum(self.discounts.iter().map(|d| &d.amount), self.currency)
            .ok_or(PricingError::Overflow)?;
        if discount_sum != self.discount_total {
            return violated(format!(
                "discount total {} does not match discounts {}",
                self.discount_total, discount_sum
            ));
        }
        if self.discount_total.is_negative() || self.discount_total.amount_cents > self.subtotal.amount_cents {
            return violated(format!(
                "discount total {} outside 0..={}",
                self.discount_total, self.subtotal
            ));
        }

        if self.shipping_total != self.shipping.total || self.shipping_total.is_negative() {
            return violated(format!("shipping total {} is inconsistent", self.shipping_total));
        }

        let expected = self
            .subtotal
            .try_subtract(&self.discount_total)
            .and_then(|m| m.try_add(&self.shipping_total))
            .ok_or(PricingError::Overflow)?;
        if expected != self.grand_total || self.grand_total.is_negative() {
            return violated(format!(
                "grand total {} should be {}",
                self.grand_total, expected
            ));
        }

        Ok(())
    }

    /// Codes of the applied coupons, for usage-counter increments.
    pub fn applied_coupon_codes(&self) -> Vec<CouponCode> {
        self.discounts.iter().map(|d| d.code.clone()).collect()
    }

    /// Per-line view with each line's share of the discounts.
    pub fn line_totals(&self) -> Vec<LineTotal> {
        self.line_items
            .iter()
            .enumerate()
            .map(|(idx, line)| {
                let discount: i64 = self
                    .discounts
                    .iter()
                    .flat_map(|d| d.allocations.iter())
                    .filter(|a| a.line == idx)
                    .map(|a| a.amount.amount_cents)
                    .sum();
                LineTotal {
                    item_id: line.item_id.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    subtotal: line.line_subtotal,
                    discount_amount: Money::new(discount, self.currency),
                    total: Money::new(line.line_subtotal.amount_cents - discount, self.currency),
                }
            })
            .collect()
    }

    /// Calculate the savings from discounts.
    pub fn savings(&self) -> Money {
        self.discount_total
    }

    /// Check if any discounts are applied.
    pub fn has_discounts(&self) -> bool {
        self.discount_total.is_positive()
    }

    /// Get discount percentage of subtotal, to two places.
    pub fn discount_percentage(&self) -> Decimal {
        if self.subtotal.is_zero() {
            return Decimal::ZERO;
        }
        (Decimal::from(self.discount_total.amount_cents) * Decimal::ONE_HUNDRED
            / Decimal::from(self.subtotal.amount_cents))
        .round_dp(2)
    }
}

/// Pricing for a single line after discounts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineTotal {
    pub item_id: ItemId,
    pub quantity: i64,
    pub unit_price: Money,
    /// `unit_price * quantity`.
    pub subtotal: Money,
    /// This line's share of all discounts.
    pub discount_amount: Money,
    pub total: Money,
}

impl LineTotal {
    /// Calculate effective unit price after discounts.
    pub fn effective_unit_price(&self) -> Money {
        if self.quantity == 0 {
            return self.unit_price;
        }
        Money::new(self.total.amount_cents / self.quantity, self.total.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ShippingAttributes;
    use crate::coupon::{apply_discounts, Coupon};
    use crate::shipping::{Destination, ShippingStatus};
    use rust_decimal_macros::dec;

    fn usd(cents: i64) -> Money {
        Money::new(cents, Currency::USD)
    }

    fn snapshot() -> CartSnapshot {
        let lines = vec![
            LineItem::new(ItemId::new("boots"), "Boots", 1, usd(12000), ShippingAttributes::physical(1800)).unwrap(),
            LineItem::new(ItemId::new("laces"), "Laces", 2, usd(400), ShippingAttributes::physical(20)).unwrap(),
        ];
        CartSnapshot::new(lines, Currency::USD).unwrap()
    }

    fn fold(coupons: Vec<Coupon>) -> PriceBreakdown {
        let snapshot = snapshot();
        let (discounts, free_shipping) = apply_discounts(&snapshot, &coupons).unwrap();
        let shipping = if free_shipping {
            ShippingQuote::waived("domestic".into(), 1840, Currency::USD)
        } else {
            ShippingQuote {
                status: ShippingStatus::Charged,
                total: usd(699),
                base_rate: usd(699),
                ..ShippingQuote::waived("domestic".into(), 1840, Currency::USD)
            }
        };
        let request = CartRequest::new("u-1", Destination::new("US")).with_cart_id("cart-7");
        PriceBreakdown::fold(
            &request,
            snapshot,
            CouponOutcome {
                discounts,
                rejections: vec![],
                free_shipping,
            },
            shipping,
        )
        .unwrap()
    }

    #[test]
    fn test_fold_without_coupons() {
        let breakdown = fold(vec![]);
        assert_eq!(breakdown.subtotal, usd(12800));
        assert!(breakdown.discount_total.is_zero());
        assert_eq!(breakdown.grand_total, usd(12800 + 699));
        assert!(!breakdown.has_discounts());
    }

    #[test]
    fn test_line_totals_follow_allocations() {
        let breakdown = fold(vec![Coupon::percent_off("TEN", "10% Off", dec!(10))]);
        assert_eq!(breakdown.discount_total, usd(1280));
        assert_eq!(breakdown.discount_percentage(), dec!(10));
        assert_eq!(breakdown.applied_coupon_codes(), vec![CouponCode::new("TEN")]);

        let totals = breakdown.line_totals();
        assert_eq!(totals[0].discount_amount, usd(1200));
        assert_eq!(totals[1].discount_amount, usd(80));
        assert_eq!(totals[1].effective_unit_price(), usd(360));

        let net: i64 = totals.iter().map(|t| t.total.amount_cents).sum();
        assert_eq!(net, breakdown.subtotal.amount_cents - breakdown.discount_total.amount_cents);
    }

    #[test]
    fn test_verify_catches_tampering() {
        let mut breakdown = fold(vec![Coupon::fixed_amount_off("FIVE", "$5 Off", usd(500))]);
        assert!(breakdown.verify().is_ok());

        breakdown.grand_total = usd(1);
        assert_eq!(breakdown.verify().unwrap_err().kind(), "invariant_violated");

        let mut breakdown = fold(vec![Coupon::fixed_amount_off("FIVE", "$5 Off", usd(500))]);
        breakdown.discounts[0].allocations.pop();
        assert!(breakdown.verify().is_err());
    }
}
