//! Cart domain types.
//!
//! A cart is the per-user mutable working set of intended purchases. Its
//! `total_price` is a cached denormalization of the line totals, recomputed
//! inside the same transaction as every mutation - it is never derived
//! lazily at read time.

use chrono::{DateTime, Utc};
use serde::Serialize;

use mercadito_core::{CartId, CartItemId, Price, ProductId, UserId};

/// A line item in a cart: one product at a quantity.
///
/// `unit_price` is the product's current catalog price, resolved when the
/// cart is read; it is not frozen until checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CartItem {
    /// Unique line item ID.
    pub id: CartItemId,
    /// Referenced product.
    pub product_id: ProductId,
    /// Product name, for display.
    pub product_name: String,
    /// Number of units (always >= 1).
    pub quantity: i64,
    /// Current unit price of the referenced product.
    pub unit_price: Price,
}

impl CartItem {
    /// `quantity x unit_price` for this line.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.line_total(self.quantity)
    }
}

/// A user's cart with its line items and cached total.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    /// Unique cart ID.
    pub id: CartId,
    /// Owning user (one cart per user).
    pub user_id: UserId,
    /// Line items, oldest first.
    pub items: Vec<CartItem>,
    /// Cached total, kept in sync with `items` on every mutation.
    pub total_price: Price,
    /// When the cart was created.
    pub created_at: DateTime<Utc>,
    /// When the cart was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Recompute the total from the line items.
    ///
    /// The cached `total_price` must always equal this value; repository
    /// tests assert the invariant after every mutation.
    #[must_use]
    pub fn computed_total(&self) -> Price {
        Price::sum(self.items.iter().map(CartItem::line_total))
    }
}
