//! Pricing error types.
//!
//! Every variant of [`PricingError`] is fatal: the request produces no
//! breakdown. Coupon problems are advisory and live in
//! [`crate::coupon::CouponRejection`] instead.

use crate::ids::ItemId;
use crate::money::{Currency, Money};
use crate::policy::Collaborator;
use std::time::Duration;
use thiserror::Error;

/// Fatal errors that abort a pricing request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// The cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// A line asks for zero items or more than the per-line maximum.
    #[error("Invalid quantity {quantity} for {item_id} (allowed 1..={max})")]
    InvalidQuantity {
        item_id: ItemId,
        quantity: i64,
        max: i64,
    },

    /// The catalog does not know the item.
    #[error("Unknown item: {0}")]
    UnknownItem(ItemId),

    /// Not enough stock to cover the requested quantity.
    #[error("Out of stock: {item_id} requested {requested}, available {available} (short by {shortfall})")]
    OutOfStock {
        item_id: ItemId,
        requested: i64,
        available: i64,
        shortfall: i64,
    },

    /// No shipping zone covers the destination.
    #[error("Unsupported destination: {0}")]
    UnsupportedDestination(String),

    /// A collaborator timed out or failed after retries.
    #[error("{collaborator} unavailable: {reason}")]
    CollaboratorUnavailable {
        collaborator: Collaborator,
        reason: String,
    },

    /// The catalog quoted a negative unit price.
    #[error("Invalid price {price} for {item_id}")]
    InvalidPrice { item_id: ItemId, price: Money },

    /// A catalog price is not in the engine's currency.
    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: Currency, got: Currency },

    /// Arithmetic overflow.
    #[error("Arithmetic overflow in money calculation")]
    Overflow,

    /// The folded breakdown failed a consistency check.
    #[error("Price breakdown invariant violated: {0}")]
    InvariantViolated(String),
}

impl PricingError {
    /// Short machine-readable name, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            PricingError::EmptyCart => "empty_cart",
            PricingError::InvalidQuantity { .. } => "invalid_quantity",
            PricingError::UnknownItem(_) => "unknown_item",
            PricingError::OutOfStock { .. } => "out_of_stock",
            PricingError::UnsupportedDestination(_) => "unsupported_destination",
            PricingError::CollaboratorUnavailable { .. } => "collaborator_unavailable",
            PricingError::InvalidPrice { .. } => "invalid_price",
            PricingError::CurrencyMismatch { .. } => "currency_mismatch",
            PricingError::Overflow => "overflow",
            PricingError::InvariantViolated(_) => "invariant_violated",
        }
    }
}

/// Errors reported by collaborator implementations.
///
/// "Not found" is an answer, not an error: lookups return `Ok(None)` for it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// The call did not complete in time.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// The backing service could not answer.
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

/// Errors loading or validating a [`crate::config::PricingConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("Failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Failed to parse JSON.
    #[error("Failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration is inconsistent.
    #[error("Invalid config: {0}")]
    Invalid(String),
}
