//! Pricing engine module.
//!
//! Runs a [`CartRequest`] through item resolution, coupon evaluation and
//! shipping, and folds the results into a [`PriceBreakdown`].

mod breakdown;
#[allow(clippy::module_inception)]
mod engine;
mod request;
mod stage;

pub use breakdown::{LineTotal, PriceBreakdown};
pub use engine::PricingEngine;
pub use request::CartRequest;
pub use stage::{PricingRun, PricingStage};
