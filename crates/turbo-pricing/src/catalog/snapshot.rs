//! Cart snapshots: the resolved, immutable input to pricing.

use crate::catalog::ShippingAttributes;
use crate::error::PricingError;
use crate::ids::ItemId;
use crate::money::{Currency, Money};
use serde::{Deserialize, Serialize};

/// A raw cart line as submitted by the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub item_id: ItemId,
    pub quantity: i64,
}

impl CartLine {
    pub fn new(item_id: impl Into<ItemId>, quantity: i64) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
        }
    }
}

/// A resolved line item. Prices are captured at resolution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Item being purchased.
    pub item_id: ItemId,
    /// Item name (denormalized for display).
    pub name: String,
    /// Quantity.
    pub quantity: i64,
    /// Unit price at resolution time.
    pub unit_price: Money,
    /// `unit_price * quantity`.
    pub line_subtotal: Money,
    /// Shipping attributes of one unit.
    pub shipping: ShippingAttributes,
}

impl LineItem {
    /// Create a line item, computing its subtotal.
    pub fn new(
        item_id: ItemId,
        name: impl Into<String>,
        quantity: i64,
        unit_price: Money,
        shipping: ShippingAttributes,
    ) -> Result<Self, PricingError> {
        let line_subtotal = unit_price
            .try_multiply(quantity)
            .ok_or(PricingError::Overflow)?;
        Ok(Self {
            item_id,
            name: name.into(),
            quantity,
            unit_price,
            line_subtotal,
            shipping,
        })
    }
}

/// Point-in-time view of a cart's items and prices.
///
/// Built once per pricing request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    lines: Vec<LineItem>,
    currency: Currency,
    subtotal: Money,
}

impl CartSnapshot {
    /// Build a snapshot from resolved lines, all priced in `currency`.
    pub fn new(lines: Vec<LineItem>, currency: Currency) -> Result<Self, PricingError> {
        if let Some(line) = lines.iter().find(|l| l.unit_price.currency != currency) {
            return Err(PricingError::CurrencyMismatch {
                expected: currency,
                got: line.unit_price.currency,
            });
        }
        let subtotal = Money::try_sum(lines.iter().map(|l| &l.line_subtotal), currency)
            .ok_or(PricingError::Overflow)?;
        Ok(Self {
            lines,
            currency,
            subtotal,
        })
    }

    /// Lines in cart order.
    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    /// Take the lines out of the snapshot.
    pub fn into_lines(self) -> Vec<LineItem> {
        self.lines
    }

    /// Snapshot currency.
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Sum of line subtotals.
    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    /// Check if the snapshot has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// True iff at least one item is physically shippable.
    pub fn is_shippable(&self) -> bool {
        self.lines.iter().any(|l| l.shipping.shippable)
    }

    /// Number of shippable units.
    pub fn shippable_item_count(&self) -> i64 {
        self.shippable_lines().map(|l| l.quantity).sum()
    }

    /// Actual weight of all shippable units.
    pub fn total_weight_grams(&self) -> u64 {
        self.shippable_weight_grams(None)
    }

    /// Billable weight of all shippable units, using volumetric weight when
    /// a divisor is given and dimensions are known.
    pub fn shippable_weight_grams(&self, volumetric_divisor: Option<u32>) -> u64 {
        self.shippable_lines()
            .map(|l| {
                l.shipping
                    .billable_grams(volumetric_divisor)
                    .saturating_mul(l.quantity.max(0) as u64)
            })
            .fold(0u64, u64::saturating_add)
    }

    fn shippable_lines(&self) -> impl Iterator<Item = &LineItem> {
        self.lines.iter().filter(|l| l.shipping.shippable)
    }
}
