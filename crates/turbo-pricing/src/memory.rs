//! In-memory collaborators for tests and local wiring.

use crate::catalog::{Catalog, CatalogEntry};
use crate::checkout::{OrderReceipt, OrderRecorder, OrderSubmission};
use crate::coupon::{Coupon, CouponRepository};
use crate::error::CollaboratorError;
use crate::ids::{CouponCode, ItemId, OrderId, UserId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

fn poisoned<T>(_: T) -> CollaboratorError {
    CollaboratorError::Unavailable("lock poisoned".to_string())
}

/// Catalog backed by a map.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    entries: RwLock<HashMap<ItemId, CatalogEntry>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry. A poisoned map still takes the write.
    pub fn insert(&self, entry: CatalogEntry) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry.item_id.clone(), entry);
    }

    pub fn remove(&self, item_id: &ItemId) -> Option<CatalogEntry> {
        self.entries.write().ok()?.remove(item_id)
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn lookup(&self, item_id: &ItemId) -> Result<Option<CatalogEntry>, CollaboratorError> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(item_id).cloned())
    }
}

/// Coupon repository with per-user usage counters.
#[derive(Debug, Default)]
pub struct InMemoryCouponRepository {
    coupons: RwLock<HashMap<CouponCode, Coupon>>,
    usage: RwLock<HashMap<(CouponCode, UserId), u32>>,
}

impl InMemoryCouponRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a coupon. A poisoned map still takes the write.
    pub fn insert(&self, coupon: Coupon) {
        self.coupons
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(coupon.code.clone(), coupon);
    }

    /// Count one use of `code` by `user_id`.
    pub fn record_usage(&self, code: &CouponCode, user_id: &UserId) -> Result<(), CollaboratorError> {
        let mut usage = self.usage.write().map_err(poisoned)?;
        *usage.entry((code.clone(), user_id.clone())).or_insert(0) += 1;
        Ok(())
    }
}

#[async_trait]
impl CouponRepository for InMemoryCouponRepository {
    async fn fetch(&self, code: &CouponCode) -> Result<Option<Coupon>, CollaboratorError> {
        let coupons = self.coupons.read().map_err(poisoned)?;
        Ok(coupons.get(code).cloned())
    }

    async fn prior_usage_count(
        &self,
        code: &CouponCode,
        user_id: &UserId,
    ) -> Result<u32, CollaboratorError> {
        let usage = self.usage.read().map_err(poisoned)?;
        Ok(usage
            .get(&(code.clone(), user_id.clone()))
            .copied()
            .unwrap_or(0))
    }
}

/// Order recorder that keeps submissions in memory.
#[derive(Debug, Default)]
pub struct InMemoryOrderRecorder {
    orders: RwLock<Vec<OrderSubmission>>,
    coupons: Option<Arc<InMemoryCouponRepository>>,
}

impl InMemoryOrderRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also bump usage counters in `coupons` for every recorded order.
    pub fn with_usage_tracking(coupons: Arc<InMemoryCouponRepository>) -> Self {
        Self {
            orders: RwLock::default(),
            coupons: Some(coupons),
        }
    }

    /// Recorded submissions, oldest first.
    pub fn orders(&self) -> Vec<OrderSubmission> {
        self.orders
            .read()
            .map(|orders| orders.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl OrderRecorder for InMemoryOrderRecorder {
    async fn record(&self, submission: &OrderSubmission) -> Result<OrderReceipt, CollaboratorError> {
        if let Some(coupons) = &self.coupons {
            for code in &submission.coupon_codes {
                coupons.record_usage(code, &submission.user_id)?;
            }
        }

        self.orders
            .write()
            .map_err(poisoned)?
            .push(submission.clone());

        Ok(OrderReceipt {
            order_id: OrderId::generate(),
            grand_total: submission.breakdown.grand_total,
        })
    }
}
