//! Order pricing for TurboCommerce.
//!
//! This crate turns a raw cart into a deterministic, fully traceable price
//! breakdown:
//!
//! - **Catalog**: resolves items to prices, stock and shipping attributes
//! - **Coupons**: eligibility, stacking and compounding discounts
//! - **Shipping**: zone matching and tiered rate tables
//! - **Engine**: orchestrates the above and folds a [`PriceBreakdown`]
//! - **Checkout**: hands a breakdown to order persistence
//!
//! Every external service sits behind an async trait and is called under a
//! timeout and retry policy. In-memory implementations live in [`memory`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use turbo_pricing::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let catalog = InMemoryCatalog::new();
//! catalog.insert(CatalogEntry::new(
//!     "rust-book",
//!     "Rust Programming Book",
//!     Money::new(4999, Currency::USD),
//!     StockLevel::new(10),
//!     ShippingAttributes::digital(),
//! ));
//!
//! let engine = PricingEngine::with_rate_table(
//!     PricingConfig::default(),
//!     Arc::new(catalog),
//!     Arc::new(InMemoryCouponRepository::new()),
//! )
//! .unwrap();
//!
//! let request = CartRequest::new("user-1", Destination::new("US")).with_line("rust-book", 1);
//! let breakdown = engine.price(&request).await.unwrap();
//! assert_eq!(breakdown.grand_total.display(), "$49.99");
//! # }
//! ```

pub mod catalog;
pub mod checkout;
pub mod config;
pub mod coupon;
pub mod engine;
pub mod error;
pub mod ids;
pub mod memory;
pub mod money;
pub mod policy;
pub mod shipping;

pub use config::PricingConfig;
pub use engine::{CartRequest, PriceBreakdown, PricingEngine};
pub use error::{CollaboratorError, ConfigError, PricingError};
pub use money::{Currency, Money};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{CollaboratorError, ConfigError, PricingError};
    pub use crate::ids::*;
    pub use crate::money::{Currency, Money};

    // Catalog
    pub use crate::catalog::{
        CartLine, CartSnapshot, Catalog, CatalogEntry, Dimensions, LineItem, ShippingAttributes,
        StockLevel,
    };

    // Coupons
    pub use crate::coupon::{
        AppliedDiscount, Coupon, CouponKind, CouponRejection, CouponRepository, CouponValue,
        DiscountScope, IneligibleReason,
    };

    // Shipping
    pub use crate::shipping::{
        Destination, RateTable, ShippingQuote, ShippingRateProvider, ShippingStatus, Zone,
    };

    // Engine
    pub use crate::config::PricingConfig;
    pub use crate::engine::{CartRequest, LineTotal, PriceBreakdown, PricingEngine};

    // Checkout
    pub use crate::checkout::{Checkout, OrderReceipt, OrderRecorder, OrderSubmission};
    pub use crate::memory::{InMemoryCatalog, InMemoryCouponRepository, InMemoryOrderRecorder};
}
