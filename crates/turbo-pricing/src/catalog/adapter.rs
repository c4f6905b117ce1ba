//! Catalog adapter: turns raw cart lines into priced, stock-checked line items.

use crate::catalog::{CartLine, CartSnapshot, CatalogEntry, LineItem};
use crate::error::{CollaboratorError, PricingError};
use crate::ids::ItemId;
use crate::money::Currency;
use crate::policy::{call_with_policy, CallPolicy, Collaborator};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// The catalog service.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Read one item's current price, stock and shipping attributes.
    async fn lookup(&self, item_id: &ItemId) -> Result<Option<CatalogEntry>, CollaboratorError>;
}

/// Resolves items against the catalog.
///
/// Pure read: stock is checked, never reserved.
pub struct CatalogAdapter {
    catalog: Arc<dyn Catalog>,
    policy: CallPolicy,
    currency: Currency,
    max_quantity: i64,
}

impl CatalogAdapter {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        policy: CallPolicy,
        currency: Currency,
        max_quantity: i64,
    ) -> Self {
        Self {
            catalog,
            policy,
            currency,
            max_quantity,
        }
    }

    /// Resolve one item at a quantity.
    ///
    /// The stock check runs against the single entry returned by the catalog,
    /// so price and availability come from the same view.
    pub async fn resolve(&self, item_id: &ItemId, quantity: i64) -> Result<LineItem, PricingError> {
        if quantity < 1 || quantity > self.max_quantity {
            return Err(PricingError::InvalidQuantity {
                item_id: item_id.clone(),
                quantity,
                max: self.max_quantity,
            });
        }

        let entry = call_with_policy(Collaborator::Catalog, &self.policy, || {
            self.catalog.lookup(item_id)
        })
        .await?
        .ok_or_else(|| PricingError::UnknownItem(item_id.clone()))?;

        if entry.unit_price.currency != self.currency {
            return Err(PricingError::CurrencyMismatch {
                expected: self.currency,
                got: entry.unit_price.currency,
            });
        }
        if entry.unit_price.is_negative() {
            return Err(PricingError::InvalidPrice {
                item_id: item_id.clone(),
                price: entry.unit_price,
            });
        }

        if !entry.stock.can_fulfill(quantity) {
            let available = entry.stock.available();
            return Err(PricingError::OutOfStock {
                item_id: item_id.clone(),
                requested: quantity,
                available,
                shortfall: quantity - available,
            });
        }

        LineItem::new(
            item_id.clone(),
            entry.name,
            quantity,
            entry.unit_price,
            entry.shipping,
        )
    }

    /// Resolve a whole cart, in order, into a snapshot.
    ///
    /// Lines naming the same item are merged first (quantities summed, first
    /// position kept) so the stock check sees the full requested quantity.
    pub async fn resolve_all(&self, lines: &[CartLine]) -> Result<CartSnapshot, PricingError> {
        if lines.is_empty() {
            return Err(PricingError::EmptyCart);
        }

        let merged = self.merge_lines(lines)?;
        let mut items = Vec::with_capacity(merged.len());
        for line in &merged {
            let item = self.resolve(&line.item_id, line.quantity).await?;
            debug!(
                item_id = %item.item_id,
                quantity = item.quantity,
                unit_price = item.unit_price.amount_cents,
                "resolved line item"
            );
            items.push(item);
        }

        CartSnapshot::new(items, self.currency)
    }

    fn merge_lines(&self, lines: &[CartLine]) -> Result<Vec<CartLine>, PricingError> {
        let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
        for line in lines {
            // Reject before merging so a negative line cannot offset another
            if line.quantity < 1 {
                return Err(PricingError::InvalidQuantity {
                    item_id: line.item_id.clone(),
                    quantity: line.quantity,
                    max: self.max_quantity,
                });
            }
            match merged.iter_mut().find(|m| m.item_id == line.item_id) {
                Some(existing) => {
                    existing.quantity = existing
                        .quantity
                        .checked_add(line.quantity)
                        .ok_or(PricingError::Overflow)?;
                }
                None => merged.push(line.clone()),
            }
        }
        Ok(merged)
    }
}
