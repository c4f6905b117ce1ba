//! Pricing run state machine.

use crate::error::PricingError;
use crate::ids::CartId;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Stages of a pricing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingStage {
    /// Request accepted, nothing resolved yet.
    Start,
    /// Looking up items in the catalog.
    ResolvingItems,
    /// Checking and applying coupons.
    EvaluatingCoupons,
    /// Quoting shipping.
    ResolvingShipping,
    /// Breakdown produced.
    Finalized,
    /// Aborted by a fatal error.
    Failed,
}

impl PricingStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingStage::Start => "start",
            PricingStage::ResolvingItems => "resolving_items",
            PricingStage::EvaluatingCoupons => "evaluating_coupons",
            PricingStage::ResolvingShipping => "resolving_shipping",
            PricingStage::Finalized => "finalized",
            PricingStage::Failed => "failed",
        }
    }

    /// The stage that legally follows this one on success.
    pub fn next(&self) -> Option<PricingStage> {
        match self {
            PricingStage::Start => Some(PricingStage::ResolvingItems),
            PricingStage::ResolvingItems => Some(PricingStage::EvaluatingCoupons),
            PricingStage::EvaluatingCoupons => Some(PricingStage::ResolvingShipping),
            PricingStage::ResolvingShipping => Some(PricingStage::Finalized),
            PricingStage::Finalized | PricingStage::Failed => None,
        }
    }

    /// Check if the run is over.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PricingStage::Finalized | PricingStage::Failed)
    }
}

/// Tracks one request's progress through the pricing stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingRun {
    cart_id: CartId,
    stage: PricingStage,
    /// Stage the failure happened in and the error kind.
    failure: Option<(PricingStage, &'static str)>,
}

impl PricingRun {
    pub fn new(cart_id: CartId) -> Self {
        Self {
            cart_id,
            stage: PricingStage::Start,
            failure: None,
        }
    }

    pub fn stage(&self) -> PricingStage {
        self.stage
    }

    pub fn failure(&self) -> Option<(PricingStage, &'static str)> {
        self.failure
    }

    /// Move to `to`, which must be the immediate successor of the current stage.
    pub fn advance(&mut self, to: PricingStage) -> Result<(), PricingError> {
        if self.stage.next() != Some(to) {
            return Err(PricingError::InvariantViolated(format!(
                "illegal stage transition {} -> {}",
                self.stage.as_str(),
                to.as_str()
            )));
        }
        debug!(
            cart_id = %self.cart_id,
            from = self.stage.as_str(),
            to = to.as_str(),
            "pricing stage"
        );
        self.stage = to;
        Ok(())
    }

    /// Record a fatal error. Legal from any non-terminal stage.
    pub fn fail(&mut self, error: &PricingError) {
        if self.stage.is_terminal() {
            return;
        }
        self.failure = Some((self.stage, error.kind()));
        self.stage = PricingStage::Failed;
    }
}
