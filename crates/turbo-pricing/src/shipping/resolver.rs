//! Shipping quotes.

use crate::error::PricingError;
use crate::ids::ZoneId;
use crate::money::{Currency, Money};
use crate::policy::{call_with_policy, CallPolicy, Collaborator};
use crate::shipping::{Destination, ShippingRateProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// How shipping was settled for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingStatus {
    /// Charged from the zone's rate table.
    Charged,
    /// Waived by a free-shipping coupon.
    Waived,
    /// Nothing in the cart ships.
    NotApplicable,
}

/// A shipping quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingQuote {
    pub status: ShippingStatus,
    /// Matched zone; absent only when not applicable.
    pub zone: Option<ZoneId>,
    /// Billable weight the quote was computed for.
    pub billable_weight_grams: u64,
    pub base_rate: Money,
    pub weight_surcharge: Money,
    /// `base_rate + weight_surcharge`, or zero unless charged.
    pub total: Money,
}

impl ShippingQuote {
    /// Quote for carts with nothing to ship.
    pub fn not_applicable(currency: Currency) -> Self {
        Self {
            status: ShippingStatus::NotApplicable,
            zone: None,
            billable_weight_grams: 0,
            base_rate: Money::zero(currency),
            weight_surcharge: Money::zero(currency),
            total: Money::zero(currency),
        }
    }

    /// Zero-cost quote that still records the zone.
    pub fn waived(zone: ZoneId, billable_weight_grams: u64, currency: Currency) -> Self {
        Self {
            status: ShippingStatus::Waived,
            zone: Some(zone),
            billable_weight_grams,
            base_rate: Money::zero(currency),
            weight_surcharge: Money::zero(currency),
            total: Money::zero(currency),
        }
    }

    pub fn is_charged(&self) -> bool {
        self.status == ShippingStatus::Charged
    }
}

/// Resolves shipping cost independently of item pricing.
pub struct ShippingRateResolver {
    provider: Arc<dyn ShippingRateProvider>,
    policy: CallPolicy,
    currency: Currency,
}

impl ShippingRateResolver {
    pub fn new(provider: Arc<dyn ShippingRateProvider>, policy: CallPolicy, currency: Currency) -> Self {
        Self {
            provider,
            policy,
            currency,
        }
    }

    /// Quote shipping to `destination`.
    ///
    /// The zone is looked up even when `free_shipping` is set, so a waived
    /// order to an unsupported destination still fails.
    pub async fn resolve(
        &self,
        destination: &Destination,
        billable_weight_grams: u64,
        shippable_item_count: i64,
        free_shipping: bool,
    ) -> Result<ShippingQuote, PricingError> {
        if shippable_item_count == 0 {
            debug!("no shippable items, shipping not applicable");
            return Ok(ShippingQuote::not_applicable(self.currency));
        }

        let zone = call_with_policy(Collaborator::Shipping, &self.policy, || {
            self.provider.lookup_zone(destination)
        })
        .await?
        .ok_or_else(|| PricingError::UnsupportedDestination(destination.to_string()))?;

        if free_shipping {
            debug!(zone = %zone.id, "shipping waived");
            return Ok(ShippingQuote::waived(zone.id, billable_weight_grams, self.currency));
        }

        let surcharge = call_with_policy(Collaborator::Shipping, &self.policy, || {
            self.provider.surcharge(&zone, billable_weight_grams)
        })
        .await?;

        for amount in [&zone.base_rate, &surcharge] {
            if amount.currency != self.currency {
                return Err(PricingError::CurrencyMismatch {
                    expected: self.currency,
                    got: amount.currency,
                });
            }
            if amount.is_negative() {
                return Err(PricingError::InvariantViolated(format!(
                    "negative shipping charge {} for zone {}",
                    amount, zone.id
                )));
            }
        }

        let total = zone
            .base_rate
            .try_add(&surcharge)
            .ok_or(PricingError::Overflow)?;

        debug!(
            zone = %zone.id,
            weight_grams = billable_weight_grams,
            total = total.amount_cents,
            "shipping quoted"
        );

        Ok(ShippingQuote {
            status: ShippingStatus::Charged,
            zone: Some(zone.id),
            billable_weight_grams,
            base_rate: zone.base_rate,
            weight_surcharge: surcharge,
            total,
        })
    }
}
