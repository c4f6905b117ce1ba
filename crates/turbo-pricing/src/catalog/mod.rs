//! Catalog module.
//!
//! Contains the catalog collaborator interface, the adapter that resolves
//! raw cart lines against it, and the snapshot types pricing runs on.

mod adapter;
mod entry;
mod snapshot;

pub use adapter::{Catalog, CatalogAdapter};
pub use entry::{CatalogEntry, Dimensions, ShippingAttributes, StockLevel};
pub use snapshot::{CartLine, CartSnapshot, LineItem};
