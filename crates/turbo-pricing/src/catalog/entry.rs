//! Catalog entries as the catalog service reports them.

use crate::ids::ItemId;
use crate::money::Money;
use serde::{Deserialize, Serialize};

/// Stock level for a catalog item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StockLevel {
    /// Total quantity in stock.
    pub quantity: i64,
    /// Quantity reserved for pending orders.
    pub reserved: i64,
    /// Whether to track inventory for this item.
    pub track_inventory: bool,
    /// Whether to allow orders when out of stock.
    pub allow_backorder: bool,
}

impl StockLevel {
    /// Create a stock level with tracking enabled.
    pub fn new(quantity: i64) -> Self {
        Self {
            quantity,
            reserved: 0,
            track_inventory: true,
            allow_backorder: false,
        }
    }

    /// Create a stock level with no tracking (infinite stock).
    pub fn untracked() -> Self {
        Self {
            quantity: 0,
            reserved: 0,
            track_inventory: false,
            allow_backorder: true,
        }
    }

    /// Set the reserved quantity.
    pub fn with_reserved(mut self, reserved: i64) -> Self {
        self.reserved = reserved;
        self
    }

    /// Get available quantity (total minus reserved), never negative.
    pub fn available(&self) -> i64 {
        (self.quantity - self.reserved).max(0)
    }

    /// Check if a specific quantity is available.
    pub fn can_fulfill(&self, quantity: i64) -> bool {
        if !self.track_inventory {
            return true;
        }
        self.available() >= quantity || self.allow_backorder
    }
}

/// Package dimensions in centimetres.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub length_cm: u32,
    pub width_cm: u32,
    pub height_cm: u32,
}

impl Dimensions {
    pub fn new(length_cm: u32, width_cm: u32, height_cm: u32) -> Self {
        Self {
            length_cm,
            width_cm,
            height_cm,
        }
    }

    /// Volume in cubic centimetres.
    pub fn volume_cm3(&self) -> u64 {
        self.length_cm as u64 * self.width_cm as u64 * self.height_cm as u64
    }

    /// Volumetric weight in grams for a carrier divisor (cm³ per kg), rounded up.
    pub fn volumetric_grams(&self, divisor: u32) -> u64 {
        if divisor == 0 {
            return 0;
        }
        (self.volume_cm3().saturating_mul(1000)).div_ceil(divisor as u64)
    }
}

/// What shipping needs to know about one unit of an item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ShippingAttributes {
    /// False for digital goods, gift cards, services.
    pub shippable: bool,
    /// Unit weight in grams.
    pub weight_grams: u64,
    /// Unit package dimensions, if known.
    pub dimensions: Option<Dimensions>,
}

impl ShippingAttributes {
    /// A physical item.
    pub fn physical(weight_grams: u64) -> Self {
        Self {
            shippable: true,
            weight_grams,
            dimensions: None,
        }
    }

    /// A non-physical item.
    pub fn digital() -> Self {
        Self {
            shippable: false,
            weight_grams: 0,
            dimensions: None,
        }
    }

    /// Set package dimensions.
    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Billable weight of one unit: the larger of actual and volumetric weight.
    pub fn billable_grams(&self, volumetric_divisor: Option<u32>) -> u64 {
        let volumetric = match (self.dimensions, volumetric_divisor) {
            (Some(dims), Some(divisor)) => dims.volumetric_grams(divisor),
            _ => 0,
        };
        self.weight_grams.max(volumetric)
    }
}

/// A catalog item as of one read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    /// Item identifier.
    pub item_id: ItemId,
    /// Display name.
    pub name: String,
    /// Current unit price.
    pub unit_price: Money,
    /// Current stock.
    pub stock: StockLevel,
    /// Shipping attributes.
    pub shipping: ShippingAttributes,
}

impl CatalogEntry {
    /// Create a tracked, physical catalog entry.
    pub fn new(
        item_id: impl Into<ItemId>,
        name: impl Into<String>,
        unit_price: Money,
        stock: StockLevel,
        shipping: ShippingAttributes,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            name: name.into(),
            unit_price,
            stock,
            shipping,
        }
    }
}
