//! Advisory coupon rejections.
//!
//! A rejected coupon never fails the request; it is reported on the
//! breakdown's warnings and pricing continues without it.

use crate::ids::CouponCode;
use crate::money::{Currency, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a coupon was not applied.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CouponRejection {
    /// No coupon with this code exists.
    #[error("Coupon {code} not found")]
    NotFound { code: CouponCode },

    /// The coupon exists but does not apply to this cart.
    #[error("Coupon {code} is not eligible: {reason}")]
    Ineligible {
        code: CouponCode,
        reason: IneligibleReason,
    },

    /// The coupon cannot be combined with the other coupons on the order.
    #[error("Coupon {code} cannot be combined with other coupons")]
    NotStackable { code: CouponCode },
}

impl CouponRejection {
    /// The rejected code, as normalized.
    pub fn code(&self) -> &CouponCode {
        match self {
            CouponRejection::NotFound { code }
            | CouponRejection::Ineligible { code, .. }
            | CouponRejection::NotStackable { code } => code,
        }
    }

    /// Short machine-readable name, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            CouponRejection::NotFound { .. } => "coupon_not_found",
            CouponRejection::Ineligible { .. } => "coupon_ineligible",
            CouponRejection::NotStackable { .. } => "coupon_not_stackable",
        }
    }
}

/// Eligibility failures for an existing coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum IneligibleReason {
    /// The coupon has been switched off.
    Inactive,
    /// The validity window has not opened yet.
    NotYetValid { starts_at: DateTime<Utc> },
    /// The validity window has closed.
    Expired { ended_at: DateTime<Utc> },
    /// The cart subtotal is under the coupon's floor.
    BelowMinimumSubtotal { required: Money, actual: Money },
    /// The user has used the coupon as often as allowed.
    UsageLimitReached { limit: u32, used: u32 },
    /// Every item in the cart is excluded from the coupon.
    NoEligibleItems,
    /// The code appears earlier in the same request.
    DuplicateCode,
    /// A fixed-amount coupon in another currency.
    CurrencyMismatch { expected: Currency, got: Currency },
    /// The coupon's value is out of range.
    InvalidValue,
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IneligibleReason::Inactive => write!(f, "coupon is no longer active"),
            IneligibleReason::NotYetValid { starts_at } => {
                write!(f, "coupon is valid from {}", starts_at.to_rfc3339())
            }
            IneligibleReason::Expired { ended_at } => {
                write!(f, "coupon expired at {}", ended_at.to_rfc3339())
            }
            IneligibleReason::BelowMinimumSubtotal { required, actual } => write!(
                f,
                "requires a subtotal of at least {}, cart subtotal is {}",
                required, actual
            ),
            IneligibleReason::UsageLimitReached { limit, used } => write!(
                f,
                "usage limit of {} reached ({} prior uses)",
                limit, used
            ),
            IneligibleReason::NoEligibleItems => {
                write!(f, "no items in the cart are eligible for this coupon")
            }
            IneligibleReason::DuplicateCode => write!(f, "coupon was already applied"),
            IneligibleReason::CurrencyMismatch { expected, got } => {
                write!(f, "coupon is in {}, cart is in {}", got, expected)
            }
            IneligibleReason::InvalidValue => write!(f, "coupon value is out of range"),
        }
    }
}
