//! Pricing requests.

use crate::catalog::CartLine;
use crate::ids::{CartId, ItemId, UserId};
use crate::shipping::Destination;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything needed to price one cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartRequest {
    /// Cart reference, carried through to the order.
    pub cart_id: CartId,
    /// Requesting user, for per-user coupon limits.
    pub user_id: UserId,
    /// Raw lines in cart order.
    pub lines: Vec<CartLine>,
    /// Coupon codes in the order they were entered.
    pub coupon_codes: Vec<String>,
    pub destination: Destination,
    /// Evaluation instant for coupon validity windows.
    pub as_of: DateTime<Utc>,
}

impl CartRequest {
    /// Create an empty request evaluated at the current time.
    pub fn new(user_id: impl Into<UserId>, destination: Destination) -> Self {
        Self {
            cart_id: CartId::generate(),
            user_id: user_id.into(),
            lines: Vec::new(),
            coupon_codes: Vec::new(),
            destination,
            as_of: Utc::now(),
        }
    }

    pub fn with_cart_id(mut self, cart_id: impl Into<CartId>) -> Self {
        self.cart_id = cart_id.into();
        self
    }

    /// Add a line.
    pub fn with_line(mut self, item_id: impl Into<ItemId>, quantity: i64) -> Self {
        self.lines.push(CartLine::new(item_id, quantity));
        self
    }

    /// Add a coupon code.
    pub fn with_coupon(mut self, code: impl Into<String>) -> Self {
        self.coupon_codes.push(code.into());
        self
    }

    /// Pin the evaluation instant.
    pub fn as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = as_of;
        self
    }
}
