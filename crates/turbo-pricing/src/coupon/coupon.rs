//! Coupon definitions.

use crate::ids::{CouponCode, ItemId};
use crate::money::Money;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Type of coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponKind {
    /// Percentage off.
    PercentOff,
    /// Fixed amount off.
    FixedAmountOff,
    /// Free shipping.
    FreeShipping,
}

impl CouponKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponKind::PercentOff => "percent_off",
            CouponKind::FixedAmountOff => "fixed_amount_off",
            CouponKind::FreeShipping => "free_shipping",
        }
    }
}

/// Value of the coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CouponValue {
    /// Percentage off (0 - 100).
    PercentOff(Decimal),
    /// Fixed amount off.
    FixedAmountOff(Money),
    /// Free shipping.
    FreeShipping,
}

impl CouponValue {
    pub fn kind(&self) -> CouponKind {
        match self {
            CouponValue::PercentOff(_) => CouponKind::PercentOff,
            CouponValue::FixedAmountOff(_) => CouponKind::FixedAmountOff,
            CouponValue::FreeShipping => CouponKind::FreeShipping,
        }
    }

    /// Check the value is usable: percentages within 0..=100, amounts non-negative.
    pub fn is_well_formed(&self) -> bool {
        match self {
            CouponValue::PercentOff(percent) => {
                *percent >= Decimal::ZERO && *percent <= Decimal::ONE_HUNDRED
            }
            CouponValue::FixedAmountOff(amount) => !amount.is_negative(),
            CouponValue::FreeShipping => true,
        }
    }
}

/// A coupon definition, as held by the coupon repository.
///
/// Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    /// Coupon code (e.g., "SAVE10"), unique.
    pub code: CouponCode,
    /// Display name.
    pub name: String,
    /// Value of the coupon.
    pub value: CouponValue,
    /// Minimum cart subtotal required.
    pub min_subtotal: Option<Money>,
    /// Start of the validity window (inclusive).
    pub valid_from: Option<DateTime<Utc>>,
    /// End of the validity window (inclusive).
    pub valid_until: Option<DateTime<Utc>>,
    /// How many times one user may use the coupon.
    pub usage_limit_per_user: Option<u32>,
    /// Combine with other coupons?
    pub stackable: bool,
    /// Items the coupon never discounts.
    pub excluded_item_ids: BTreeSet<ItemId>,
    /// Whether the coupon is active.
    pub active: bool,
}

impl Coupon {
    fn with_value(code: &str, name: impl Into<String>, value: CouponValue) -> Self {
        Self {
            code: CouponCode::normalized(code).unwrap_or_else(|| CouponCode::new(code)),
            name: name.into(),
            value,
            min_subtotal: None,
            valid_from: None,
            valid_until: None,
            usage_limit_per_user: None,
            stackable: false,
            excluded_item_ids: BTreeSet::new(),
            active: true,
        }
    }

    /// Create a new percentage coupon.
    pub fn percent_off(code: &str, name: impl Into<String>, percent: Decimal) -> Self {
        Self::with_value(code, name, CouponValue::PercentOff(percent))
    }

    /// Create a new fixed amount coupon.
    pub fn fixed_amount_off(code: &str, name: impl Into<String>, amount: Money) -> Self {
        Self::with_value(code, name, CouponValue::FixedAmountOff(amount))
    }

    /// Create a free shipping coupon.
    pub fn free_shipping(code: &str, name: impl Into<String>) -> Self {
        Self::with_value(code, name, CouponValue::FreeShipping)
    }

    pub fn kind(&self) -> CouponKind {
        self.value.kind()
    }

    /// Add a minimum subtotal condition.
    pub fn with_min_subtotal(mut self, amount: Money) -> Self {
        self.min_subtotal = Some(amount);
        self
    }

    /// Set the validity window. Either end may be open.
    pub fn valid_between(
        mut self,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Self {
        self.valid_from = from;
        self.valid_until = until;
        self
    }

    /// Add a per-user usage limit.
    pub fn with_usage_limit_per_user(mut self, limit: u32) -> Self {
        self.usage_limit_per_user = Some(limit);
        self
    }

    /// Mark the coupon as combinable with others.
    pub fn stackable(mut self) -> Self {
        self.stackable = true;
        self
    }

    /// Exclude items from the discount.
    pub fn excluding<I, T>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ItemId>,
    {
        self.excluded_item_ids
            .extend(items.into_iter().map(Into::into));
        self
    }

    /// Check whether an item is excluded from this coupon.
    pub fn excludes(&self, item_id: &ItemId) -> bool {
        self.excluded_item_ids.contains(item_id)
    }

    /// Check if the coupon has started at `now`.
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.valid_from.map(|from| now >= from).unwrap_or(true)
    }

    /// Check if the coupon has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.map(|until| now > until).unwrap_or(false)
    }

    /// Check if one more use by a user with `prior_uses` is allowed.
    pub fn allows_another_use(&self, prior_uses: u32) -> bool {
        self.usage_limit_per_user
            .map(|limit| prior_uses < limit)
            .unwrap_or(true)
    }
}
