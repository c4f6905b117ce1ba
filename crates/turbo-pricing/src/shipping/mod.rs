//! Shipping module.
//!
//! Zone matching and rate tables, and the resolver that turns a destination
//! and billable weight into a [`ShippingQuote`].

mod destination;
mod rates;
mod resolver;

pub use destination::Destination;
pub use rates::{RateTable, ShippingRateProvider, Zone};
pub use resolver::{ShippingQuote, ShippingRateResolver, ShippingStatus};
