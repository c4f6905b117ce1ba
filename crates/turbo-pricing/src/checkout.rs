//! Order hand-off.
//!
//! The engine never writes. [`Checkout`] prices a cart and hands the
//! breakdown to an [`OrderRecorder`], which owns durability and coupon usage
//! counters. A per-user limit raced by two concurrent orders is settled by
//! the recorder at commit time.

use crate::engine::{CartRequest, PriceBreakdown, PricingEngine};
use crate::error::{CollaboratorError, PricingError};
use crate::ids::{CartId, CouponCode, OrderId, UserId};
use crate::money::Money;
use crate::policy::{call_with_policy, CallPolicy, Collaborator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

/// The order persistence collaborator.
#[async_trait]
pub trait OrderRecorder: Send + Sync {
    /// Persist an order and bump usage for its coupons.
    async fn record(&self, submission: &OrderSubmission) -> Result<OrderReceipt, CollaboratorError>;
}

/// A priced cart ready to become an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSubmission {
    pub cart_id: CartId,
    pub user_id: UserId,
    /// Coupons whose usage counters the recorder should increment.
    pub coupon_codes: Vec<CouponCode>,
    pub breakdown: PriceBreakdown,
}

impl OrderSubmission {
    pub fn from_breakdown(breakdown: PriceBreakdown) -> Self {
        Self {
            cart_id: breakdown.cart_id.clone(),
            user_id: breakdown.user_id.clone(),
            coupon_codes: breakdown.applied_coupon_codes(),
            breakdown,
        }
    }
}

/// Acknowledgement from the recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: OrderId,
    pub grand_total: Money,
}

/// Prices carts and records them as orders.
pub struct Checkout {
    engine: Arc<PricingEngine>,
    recorder: Arc<dyn OrderRecorder>,
    policy: CallPolicy,
}

impl Checkout {
    pub fn new(engine: Arc<PricingEngine>, recorder: Arc<dyn OrderRecorder>) -> Self {
        let policy = engine.config().collaborators.policy(Collaborator::Orders);
        Self {
            engine,
            recorder,
            policy,
        }
    }

    /// Price the cart and record the order.
    #[instrument(skip(self, request), fields(cart_id = %request.cart_id))]
    pub async fn place_order(&self, request: &CartRequest) -> Result<OrderReceipt, PricingError> {
        let breakdown = self.engine.price(request).await?;
        let submission = OrderSubmission::from_breakdown(breakdown);

        let receipt = call_with_policy(Collaborator::Orders, &self.policy, || {
            self.recorder.record(&submission)
        })
        .await?;

        info!(
            order_id = %receipt.order_id,
            grand_total = receipt.grand_total.amount_cents,
            coupons = submission.coupon_codes.len(),
            "order recorded"
        );
        Ok(receipt)
    }
}
