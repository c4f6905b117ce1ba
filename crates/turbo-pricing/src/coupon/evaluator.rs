//! Coupon evaluation: eligibility, stacking and compounding.

use crate::catalog::CartSnapshot;
use crate::config::StackingPolicy;
use crate::coupon::{Coupon, CouponKind, CouponRejection, CouponValue, IneligibleReason};
use crate::error::{CollaboratorError, PricingError};
use crate::ids::{CouponCode, ItemId, UserId};
use crate::money::{Currency, Money};
use crate::policy::{call_with_policy, CallPolicy, Collaborator};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// The coupon repository.
#[async_trait]
pub trait CouponRepository: Send + Sync {
    /// Fetch a coupon definition by normalized code.
    async fn fetch(&self, code: &CouponCode) -> Result<Option<Coupon>, CollaboratorError>;

    /// How many times `user_id` has already used `code` on committed orders.
    async fn prior_usage_count(
        &self,
        code: &CouponCode,
        user_id: &UserId,
    ) -> Result<u32, CollaboratorError>;
}

/// What an applied discount covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "items", rename_all = "snake_case")]
pub enum DiscountScope {
    /// Every line in the cart.
    CartWide,
    /// Only these items.
    Lines(Vec<ItemId>),
}

/// One line's share of a discount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAllocation {
    /// Index into the breakdown's line items.
    pub line: usize,
    pub item_id: ItemId,
    pub amount: Money,
}

/// A coupon that has been applied to a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    /// The coupon code used.
    pub code: CouponCode,
    /// Description for display.
    pub name: String,
    pub kind: CouponKind,
    /// Amount deducted; zero for free shipping.
    pub amount: Money,
    pub applies_to: DiscountScope,
    /// Per-line shares of `amount`, summing to it exactly.
    pub allocations: Vec<LineAllocation>,
}

/// Result of evaluating a request's coupons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponOutcome {
    /// Applied discounts, in request order.
    pub discounts: Vec<AppliedDiscount>,
    /// Rejected coupons, in request order.
    pub rejections: Vec<CouponRejection>,
    /// Set when a free-shipping coupon was applied.
    pub free_shipping: bool,
}

/// Evaluates requested coupon codes against a cart snapshot.
pub struct CouponEvaluator {
    repository: Arc<dyn CouponRepository>,
    policy: CallPolicy,
    stacking: StackingPolicy,
}

impl CouponEvaluator {
    pub fn new(
        repository: Arc<dyn CouponRepository>,
        policy: CallPolicy,
        stacking: StackingPolicy,
    ) -> Self {
        Self {
            repository,
            policy,
            stacking,
        }
    }

    /// Evaluate `codes` in order.
    ///
    /// Coupon problems are collected as rejections; only collaborator failures
    /// and arithmetic overflow are returned as errors.
    pub async fn evaluate(
        &self,
        snapshot: &CartSnapshot,
        codes: &[String],
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<CouponOutcome, PricingError> {
        let mut rejections: Vec<(usize, CouponRejection)> = Vec::new();
        let mut candidates: Vec<(usize, Coupon)> = Vec::new();
        let mut seen = BTreeSet::new();

        for (position, raw) in codes.iter().enumerate() {
            let code = match CouponCode::normalized(raw) {
                Some(code) => code,
                None => {
                    rejections.push((
                        position,
                        CouponRejection::NotFound {
                            code: CouponCode::new(raw.trim()),
                        },
                    ));
                    continue;
                }
            };

            if !seen.insert(code.clone()) {
                rejections.push((
                    position,
                    CouponRejection::Ineligible {
                        code,
                        reason: IneligibleReason::DuplicateCode,
                    },
                ));
                continue;
            }

            let fetched = call_with_policy(Collaborator::Coupons, &self.policy, || {
                self.repository.fetch(&code)
            })
            .await?;
            let Some(coupon) = fetched else {
                rejections.push((position, CouponRejection::NotFound { code }));
                continue;
            };

            let mut verdict = check_eligibility(&coupon, snapshot, now);
            if verdict.is_ok() {
                if let Some(limit) = coupon.usage_limit_per_user {
                    let used = call_with_policy(Collaborator::Coupons, &self.policy, || {
                        self.repository.prior_usage_count(&code, user_id)
                    })
                    .await?;
                    if !coupon.allows_another_use(used) {
                        verdict = Err(IneligibleReason::UsageLimitReached { limit, used });
                    }
                }
            }

            match verdict {
                Ok(()) => candidates.push((position, coupon)),
                Err(reason) => {
                    rejections.push((position, CouponRejection::Ineligible { code, reason }))
                }
            }
        }

        let (accepted, dropped) = resolve_stacking(candidates, &self.stacking);
        rejections.extend(dropped);
        rejections.sort_by_key(|(position, _)| *position);

        let coupons: Vec<Coupon> = accepted.into_iter().map(|(_, coupon)| coupon).collect();
        let (discounts, free_shipping) = apply_discounts(snapshot, &coupons)?;

        for (_, rejection) in &rejections {
            info!(
                code = %rejection.code(),
                kind = rejection.kind(),
                reason = %rejection,
                "coupon rejected"
            );
        }
        for discount in &discounts {
            debug!(
                code = %discount.code,
                kind = discount.kind.as_str(),
                amount = discount.amount.amount_cents,
                "coupon applied"
            );
        }

        Ok(CouponOutcome {
            discounts,
            rejections: rejections.into_iter().map(|(_, r)| r).collect(),
            free_shipping,
        })
    }
}

/// Check the cart-level eligibility of a coupon, excluding usage limits.
pub fn check_eligibility(
    coupon: &Coupon,
    snapshot: &CartSnapshot,
    now: DateTime<Utc>,
) -> Result<(), IneligibleReason> {
    if !coupon.active {
        return Err(IneligibleReason::Inactive);
    }
    if !coupon.has_started(now) {
        if let Some(starts_at) = coupon.valid_from {
            return Err(IneligibleReason::NotYetValid { starts_at });
        }
    }
    if coupon.is_expired(now) {
        if let Some(ended_at) = coupon.valid_until {
            return Err(IneligibleReason::Expired { ended_at });
        }
    }
    if !coupon.value.is_well_formed() {
        return Err(IneligibleReason::InvalidValue);
    }

    let currency = snapshot.currency();
    if let CouponValue::FixedAmountOff(amount) = &coupon.value {
        check_currency(amount, currency)?;
    }
    if let Some(required) = coupon.min_subtotal {
        check_currency(&required, currency)?;
        let actual = snapshot.subtotal();
        if actual.amount_cents < required.amount_cents {
            return Err(IneligibleReason::BelowMinimumSubtotal { required, actual });
        }
    }

    if snapshot
        .lines()
        .iter()
        .all(|line| coupon.excludes(&line.item_id))
    {
        return Err(IneligibleReason::NoEligibleItems);
    }

    Ok(())
}

fn check_currency(amount: &Money, expected: Currency) -> Result<(), IneligibleReason> {
    if amount.currency != expected {
        return Err(IneligibleReason::CurrencyMismatch {
            expected,
            got: amount.currency,
        });
    }
    Ok(())
}

/// Apply the stacking policy to individually valid coupons.
///
/// With stacking allowed, a non-stackable coupon only survives when it is the
/// sole candidate. With stacking disabled, the first candidate wins. The
/// `max_coupons` cap applies last. Everything dropped is `NotStackable`.
pub fn resolve_stacking(
    candidates: Vec<(usize, Coupon)>,
    policy: &StackingPolicy,
) -> (Vec<(usize, Coupon)>, Vec<(usize, CouponRejection)>) {
    let not_stackable = |(position, coupon): (usize, Coupon)| {
        (
            position,
            CouponRejection::NotStackable { code: coupon.code },
        )
    };

    if candidates.len() <= 1 {
        return (candidates, Vec::new());
    }

    let (mut accepted, mut rejected): (Vec<_>, Vec<_>) = if policy.allow_stacking {
        let (stackable, solo): (Vec<_>, Vec<_>) =
            candidates.into_iter().partition(|(_, c)| c.stackable);
        (stackable, solo.into_iter().map(not_stackable).collect())
    } else {
        let mut iter = candidates.into_iter();
        let first: Vec<_> = iter.next().into_iter().collect();
        (first, iter.map(not_stackable).collect())
    };

    if let Some(max) = policy.max_coupons {
        if accepted.len() > max {
            rejected.extend(accepted.split_off(max).into_iter().map(not_stackable));
        }
    }

    (accepted, rejected)
}

/// Apply coupons in order, compounding against the running per-line remainder.
///
/// Returns the applied discounts and whether shipping is waived.
pub fn apply_discounts(
    snapshot: &CartSnapshot,
    coupons: &[Coupon],
) -> Result<(Vec<AppliedDiscount>, bool), PricingError> {
    let currency = snapshot.currency();
    let lines = snapshot.lines();
    let subtotal = snapshot.subtotal().amount_cents;

    let mut remaining: Vec<i64> = lines.iter().map(|l| l.line_subtotal.amount_cents).collect();
    let mut deducted: i64 = 0;
    let mut free_shipping = false;
    let mut discounts = Vec::with_capacity(coupons.len());

    for coupon in coupons {
        let eligible: Vec<usize> = (0..lines.len())
            .filter(|&i| !coupon.excludes(&lines[i].item_id))
            .collect();
        let weights: Vec<i64> = eligible.iter().map(|&i| remaining[i]).collect();
        let eligible_remaining: i64 = weights.iter().sum();

        let raw = match &coupon.value {
            CouponValue::PercentOff(percent) => {
                Money::new(eligible_remaining, currency)
                    .percentage(*percent)
                    .ok_or(PricingError::Overflow)?
                    .amount_cents
            }
            CouponValue::FixedAmountOff(amount) => amount.amount_cents,
            CouponValue::FreeShipping => {
                free_shipping = true;
                0
            }
        };
        let amount = raw
            .min(eligible_remaining)
            .min(subtotal - deducted)
            .max(0);

        let mut allocations = Vec::new();
        for (&line, share) in eligible.iter().zip(allocate(amount, &weights)) {
            if share > 0 {
                remaining[line] -= share;
                allocations.push(LineAllocation {
                    line,
                    item_id: lines[line].item_id.clone(),
                    amount: Money::new(share, currency),
                });
            }
        }
        deducted += amount;

        let applies_to = if eligible.len() == lines.len() {
            DiscountScope::CartWide
        } else {
            DiscountScope::Lines(
                eligible
                    .iter()
                    .map(|&i| lines[i].item_id.clone())
                    .collect(),
            )
        };

        discounts.push(AppliedDiscount {
            code: coupon.code.clone(),
            name: coupon.name.clone(),
            kind: coupon.kind(),
            amount: Money::new(amount, currency),
            applies_to,
            allocations,
        });
    }

    Ok((discounts, free_shipping))
}

/// Split `amount` across `weights` proportionally.
///
/// Largest remainder gets the leftover units; ties go to the earlier entry.
/// Requires `0 <= amount <= sum(weights)`; each share then stays within its weight.
fn allocate(amount: i64, weights: &[i64]) -> Vec<i64> {
    let total: i128 = weights.iter().map(|&w| w as i128).sum();
    if amount <= 0 || total <= 0 {
        return vec![0; weights.len()];
    }

    let mut shares = Vec::with_capacity(weights.len());
    let mut remainders = Vec::with_capacity(weights.len());
    for (idx, &weight) in weights.iter().enumerate() {
        let product = amount as i128 * weight as i128;
        shares.push((product / total) as i64);
        remainders.push((product % total, idx));
    }

    let mut leftover = amount - shares.iter().sum::<i64>();
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for (_, idx) in remainders {
        if leftover == 0 {
            break;
        }
        shares[idx] += 1;
        leftover -= 1;
    }
    shares
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{LineItem, ShippingAttributes};
    use crate::memory::InMemoryCouponRepository;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn usd(cents: i64) -> Money {
        Money::new(cents, Currency::USD)
    }

    fn snapshot(lines: &[(&str, i64, i64)]) -> CartSnapshot {
        let items = lines
            .iter()
            .map(|(id, qty, cents)| {
                LineItem::new(
                    ItemId::new(*id),
                    *id,
                    *qty,
                    usd(*cents),
                    ShippingAttributes::physical(100),
                )
                .unwrap()
            })
            .collect();
        CartSnapshot::new(items, Currency::USD).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 9, 30, 0).unwrap()
    }

    fn evaluator(repo: InMemoryCouponRepository, stacking: StackingPolicy) -> CouponEvaluator {
        CouponEvaluator::new(
            Arc::new(repo),
            CallPolicy::for_collaborator(Collaborator::Coupons),
            stacking,
        )
    }

    fn codes(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_stacked_percentages_compound() {
        let cart = snapshot(&[("jacket", 1, 10000)]);
        let coupons = vec![
            Coupon::percent_off("TEN", "10% Off", dec!(10)).stackable(),
            Coupon::percent_off("TWENTY", "20% Off", dec!(20)).stackable(),
        ];

        let (discounts, free_shipping) = apply_discounts(&cart, &coupons).unwrap();
        let amounts: Vec<i64> = discounts.iter().map(|d| d.amount.amount_cents).collect();
        assert_eq!(amounts, vec![1000, 1800]);
        assert!(!free_shipping);
    }

    #[test]
    fn test_fixed_amount_never_over_deducts() {
        let cart = snapshot(&[("socks", 2, 700)]);
        let coupons = vec![
            Coupon::percent_off("HALF", "Half Off", dec!(50)).stackable(),
            Coupon::fixed_amount_off("TENOFF", "$10 Off", usd(1000)).stackable(),
        ];

        let (discounts, _) = apply_discounts(&cart, &coupons).unwrap();
        assert_eq!(discounts[0].amount, usd(700));
        // Only $7 left to discount
        assert_eq!(discounts[1].amount, usd(700));
    }

    #[test]
    fn test_exclusions_restrict_the_base() {
        let cart = snapshot(&[("laptop", 1, 100000), ("gift-card", 1, 5000)]);
        let coupons = vec![Coupon::percent_off("TEN", "10% Off", dec!(10)).excluding(["gift-card"])];

        let (discounts, _) = apply_discounts(&cart, &coupons).unwrap();
        assert_eq!(discounts[0].amount, usd(10000));
        assert_eq!(
            discounts[0].applies_to,
            DiscountScope::Lines(vec![ItemId::new("laptop")])
        );
        assert_eq!(discounts[0].allocations.len(), 1);
        assert_eq!(discounts[0].allocations[0].line, 0);
    }

    #[test]
    fn test_compounding_respects_each_coupons_exclusions() {
        // a: $60, b: $40. First coupon takes $20 off a only, second 50% of everything left.
        let cart = snapshot(&[("a", 1, 6000), ("b", 1, 4000)]);
        let coupons = vec![
            Coupon::fixed_amount_off("A20", "$20 off A", usd(2000))
                .excluding(["b"])
                .stackable(),
            Coupon::percent_off("HALF", "Half", dec!(50)).stackable(),
        ];

        let (discounts, _) = apply_discounts(&cart, &coupons).unwrap();
        assert_eq!(discounts[0].amount, usd(2000));
        assert_eq!(discounts[1].amount, usd(4000));
        assert_eq!(discounts[1].applies_to, DiscountScope::CartWide);
        let shares: Vec<i64> = discounts[1]
            .allocations
            .iter()
            .map(|a| a.amount.amount_cents)
            .collect();
        assert_eq!(shares, vec![2000, 2000]);
    }

    #[test]
    fn test_free_shipping_sets_flag_without_money() {
        let cart = snapshot(&[("lamp", 1, 4500)]);
        let coupons = vec![Coupon::free_shipping("SHIPFREE", "Free Shipping")];

        let (discounts, free_shipping) = apply_discounts(&cart, &coupons).unwrap();
        assert!(free_shipping);
        assert!(discounts[0].amount.is_zero());
        assert!(discounts[0].allocations.is_empty());
    }

    #[test]
    fn test_allocation_sums_exactly() {
        let shares = allocate(100, &[333, 333, 334]);
        assert_eq!(shares.iter().sum::<i64>(), 100);
        assert_eq!(shares, vec![33, 33, 34]);

        // Ties go to the earlier line
        assert_eq!(allocate(1, &[50, 50]), vec![1, 0]);
        assert_eq!(allocate(0, &[10, 10]), vec![0, 0]);
        assert_eq!(allocate(5, &[0, 0]), vec![0, 0]);
    }

    #[test]
    fn test_eligibility_reasons() {
        let cart = snapshot(&[("mug", 2, 1200)]);

        let inactive = Coupon {
            active: false,
            ..Coupon::percent_off("OFF", "Off", dec!(10))
        };
        assert_eq!(
            check_eligibility(&inactive, &cart, now()),
            Err(IneligibleReason::Inactive)
        );

        let later = now() + chrono::Duration::days(2);
        let future = Coupon::percent_off("SOON", "Soon", dec!(10)).valid_between(Some(later), None);
        assert_eq!(
            check_eligibility(&future, &cart, now()),
            Err(IneligibleReason::NotYetValid { starts_at: later })
        );

        let earlier = now() - chrono::Duration::days(2);
        let past = Coupon::percent_off("OLD", "Old", dec!(10)).valid_between(None, Some(earlier));
        assert_eq!(
            check_eligibility(&past, &cart, now()),
            Err(IneligibleReason::Expired { ended_at: earlier })
        );

        let big_spender = Coupon::percent_off("BIG", "Big", dec!(10)).with_min_subtotal(usd(5000));
        assert_eq!(
            check_eligibility(&big_spender, &cart, now()),
            Err(IneligibleReason::BelowMinimumSubtotal {
                required: usd(5000),
                actual: usd(2400),
            })
        );

        let all_excluded = Coupon::percent_off("NOPE", "Nope", dec!(10)).excluding(["mug"]);
        assert_eq!(
            check_eligibility(&all_excluded, &cart, now()),
            Err(IneligibleReason::NoEligibleItems)
        );

        let euros = Coupon::fixed_amount_off("EURO", "Euro", Money::new(500, Currency::EUR));
        assert!(matches!(
            check_eligibility(&euros, &cart, now()),
            Err(IneligibleReason::CurrencyMismatch { .. })
        ));

        let absurd = Coupon::percent_off("MORE", "More", dec!(150));
        assert_eq!(
            check_eligibility(&absurd, &cart, now()),
            Err(IneligibleReason::InvalidValue)
        );
    }

    #[test]
    fn test_min_subtotal_is_inclusive() {
        let cart = snapshot(&[("mug", 2, 2500)]);
        let coupon = Coupon::percent_off("FIFTY", "Fifty", dec!(10)).with_min_subtotal(usd(5000));
        assert_eq!(check_eligibility(&coupon, &cart, now()), Ok(()));
    }

    #[test]
    fn test_stacking_drops_non_stackable() {
        let candidates = vec![
            (0, Coupon::percent_off("SOLO", "Solo", dec!(15))),
            (1, Coupon::percent_off("TEAM", "Team", dec!(5)).stackable()),
        ];
        let (accepted, rejected) = resolve_stacking(candidates, &StackingPolicy::default());

        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].1.code.as_str(), "TEAM");
        assert_eq!(
            rejected,
            vec![(
                0,
                CouponRejection::NotStackable {
                    code: CouponCode::new("SOLO")
                }
            )]
        );
    }

    #[test]
    fn test_single_non_stackable_coupon_applies() {
        let candidates = vec![(0, Coupon::percent_off("SOLO", "Solo", dec!(15)))];
        let (accepted, rejected) = resolve_stacking(candidates, &StackingPolicy::default());
        assert_eq!(accepted.len(), 1);
        assert!(rejected.is_empty());
    }

    #[test]
    fn test_stacking_disabled_keeps_first() {
        let policy = StackingPolicy {
            allow_stacking: false,
            max_coupons: None,
        };
        let candidates = vec![
            (0, Coupon::percent_off("A", "A", dec!(5)).stackable()),
            (1, Coupon::percent_off("B", "B", dec!(5)).stackable()),
        ];
        let (accepted, rejected) = resolve_stacking(candidates, &policy);
        assert_eq!(accepted[0].1.code.as_str(), "A");
        assert_eq!(rejected.len(), 1);
    }

    #[test]
    fn test_max_coupons_cap() {
        let policy = StackingPolicy {
            allow_stacking: true,
            max_coupons: Some(2),
        };
        let candidates = (0..4)
            .map(|i| (i, Coupon::percent_off(&format!("C{}", i), "C", dec!(1)).stackable()))
            .collect();
        let (accepted, rejected) = resolve_stacking(candidates, &policy);
        assert_eq!(accepted.len(), 2);
        let dropped: Vec<usize> = rejected.iter().map(|(p, _)| *p).collect();
        assert_eq!(dropped, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_evaluate_collects_rejections_in_request_order() {
        let repo = InMemoryCouponRepository::new();
        repo.insert(Coupon::percent_off("TEN", "10% Off", dec!(10)).stackable());
        repo.insert(Coupon::percent_off("SOLO", "Solo", dec!(30)));
        repo.insert(Coupon::free_shipping("SHIP", "Free Shipping").stackable());

        let cart = snapshot(&[("jacket", 1, 10000)]);
        let outcome = evaluator(repo, StackingPolicy::default())
            .evaluate(
                &cart,
                &codes(&["ten", "MISSING", "solo", "ship", "TEN"]),
                &UserId::new("u-1"),
                now(),
            )
            .await
            .unwrap();

        let applied: Vec<&str> = outcome.discounts.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(applied, vec!["TEN", "SHIP"]);
        assert!(outcome.free_shipping);

        let kinds: Vec<(&str, &str)> = outcome
            .rejections
            .iter()
            .map(|r| (r.code().as_str(), r.kind()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("MISSING", "coupon_not_found"),
                ("SOLO", "coupon_not_stackable"),
                ("TEN", "coupon_ineligible"),
            ]
        );
    }

    #[tokio::test]
    async fn test_usage_limit_uses_prior_count() {
        let repo = InMemoryCouponRepository::new();
        repo.insert(Coupon::percent_off("WELCOME", "Welcome", dec!(15)).with_usage_limit_per_user(1));
        repo.record_usage(&CouponCode::new("WELCOME"), &UserId::new("returning")).unwrap();

        let evaluator = evaluator(repo, StackingPolicy::default());
        let cart = snapshot(&[("jacket", 1, 10000)]);

        let fresh = evaluator
            .evaluate(&cart, &codes(&["WELCOME"]), &UserId::new("new"), now())
            .await
            .unwrap();
        assert_eq!(fresh.discounts.len(), 1);

        let returning = evaluator
            .evaluate(&cart, &codes(&["WELCOME"]), &UserId::new("returning"), now())
            .await
            .unwrap();
        assert!(returning.discounts.is_empty());
        assert_eq!(
            returning.rejections,
            vec![CouponRejection::Ineligible {
                code: CouponCode::new("WELCOME"),
                reason: IneligibleReason::UsageLimitReached { limit: 1, used: 1 },
            }]
        );
    }

    #[tokio::test]
    async fn test_blank_code_is_reported() {
        let outcome = evaluator(InMemoryCouponRepository::new(), StackingPolicy::default())
            .evaluate(
                &snapshot(&[("mug", 1, 1000)]),
                &codes(&["   "]),
                &UserId::new("u"),
                now(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.rejections.len(), 1);
        assert_eq!(outcome.rejections[0].kind(), "coupon_not_found");
    }
}
