//! Coupon module.
//!
//! Coupons are read from a [`CouponRepository`], checked against the cart,
//! filtered by the stacking policy and applied in request order.

#[allow(clippy::module_inception)]
mod coupon;
mod evaluator;
mod rejection;

pub use coupon::{Coupon, CouponKind, CouponValue};
pub use evaluator::{
    apply_discounts, check_eligibility, resolve_stacking, AppliedDiscount, CouponEvaluator,
    CouponOutcome, CouponRepository, DiscountScope, LineAllocation,
};
pub use rejection::{CouponRejection, IneligibleReason};
