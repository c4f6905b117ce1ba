//! The pricing engine.

use crate::catalog::{Catalog, CatalogAdapter};
use crate::config::PricingConfig;
use crate::coupon::{CouponEvaluator, CouponRepository};
use crate::engine::{CartRequest, PriceBreakdown, PricingRun, PricingStage};
use crate::error::{ConfigError, PricingError};
use crate::policy::Collaborator;
use crate::shipping::{RateTable, ShippingRateProvider, ShippingRateResolver};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Prices carts.
///
/// Holds no per-request state; share it behind an `Arc` and price
/// concurrently.
pub struct PricingEngine {
    config: PricingConfig,
    catalog: CatalogAdapter,
    coupons: CouponEvaluator,
    shipping: ShippingRateResolver,
}

impl PricingEngine {
    /// Build an engine from a validated config and its collaborators.
    pub fn new(
        config: PricingConfig,
        catalog: Arc<dyn Catalog>,
        coupons: Arc<dyn CouponRepository>,
        rates: Arc<dyn ShippingRateProvider>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let policies = &config.collaborators;
        let catalog = CatalogAdapter::new(
            catalog,
            policies.policy(Collaborator::Catalog),
            config.currency,
            config.max_quantity_per_line,
        );
        let coupons = CouponEvaluator::new(
            coupons,
            policies.policy(Collaborator::Coupons),
            config.stacking.clone(),
        );
        let shipping = ShippingRateResolver::new(
            rates,
            policies.policy(Collaborator::Shipping),
            config.currency,
        );

        Ok(Self {
            config,
            catalog,
            coupons,
            shipping,
        })
    }

    /// Build an engine whose shipping rates come from the config's zone tables.
    pub fn with_rate_table(
        config: PricingConfig,
        catalog: Arc<dyn Catalog>,
        coupons: Arc<dyn CouponRepository>,
    ) -> Result<Self, ConfigError> {
        let rates = Arc::new(RateTable::new(&config.shipping, config.currency));
        Self::new(config, catalog, coupons, rates)
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Price a cart.
    ///
    /// Fatal errors abort the run and produce no breakdown. Coupon problems
    /// end up in the breakdown's warnings.
    #[instrument(
        name = "price_cart",
        skip(self, request),
        fields(cart_id = %request.cart_id, user_id = %request.user_id)
    )]
    pub async fn price(&self, request: &CartRequest) -> Result<PriceBreakdown, PricingError> {
        let (run, result) = self.run(request).await;

        match result {
            Ok(breakdown) => {
                info!(
                    lines = breakdown.line_items.len(),
                    discounts = breakdown.discounts.len(),
                    warnings = breakdown.warnings.len(),
                    grand_total = breakdown.grand_total.amount_cents,
                    "cart priced"
                );
                Ok(breakdown)
            }
            Err(err) => {
                let (stage, kind) = run.failure().unwrap_or((run.stage(), err.kind()));
                warn!(
                    stage = stage.as_str(),
                    kind,
                    error = %err,
                    "pricing failed"
                );
                Err(err)
            }
        }
    }

    /// Drive one request through the stages, keeping the run for its failure record.
    async fn run(&self, request: &CartRequest) -> (PricingRun, Result<PriceBreakdown, PricingError>) {
        let mut run = PricingRun::new(request.cart_id.clone());
        let result = self.run_stages(request, &mut run).await;
        if let Err(err) = &result {
            run.fail(err);
        }
        (run, result)
    }

    async fn run_stages(
        &self,
        request: &CartRequest,
        run: &mut PricingRun,
    ) -> Result<PriceBreakdown, PricingError> {
        run.advance(PricingStage::ResolvingItems)?;
        let snapshot = self.catalog.resolve_all(&request.lines).await?;

        run.advance(PricingStage::EvaluatingCoupons)?;
        let outcome = self
            .coupons
            .evaluate(
                &snapshot,
                &request.coupon_codes,
                &request.user_id,
                request.as_of,
            )
            .await?;

        run.advance(PricingStage::ResolvingShipping)?;
        let weight = snapshot.shippable_weight_grams(self.config.shipping.volumetric_divisor);
        let quote = self
            .shipping
            .resolve(
                &request.destination,
                weight,
                snapshot.shippable_item_count(),
                outcome.free_shipping,
            )
            .await?;

        let breakdown = PriceBreakdown::fold(request, snapshot, outcome, quote)?;
        run.advance(PricingStage::Finalized)?;
        Ok(breakdown)
    }
}
