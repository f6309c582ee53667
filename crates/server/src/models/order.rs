//! Order domain types.
//!
//! An order is the immutable record of a completed checkout. Its line items
//! are structural copies of the cart's lines at checkout time - product
//! name and unit price are frozen (price-at-purchase) and never re-read
//! from the catalog, so later catalog edits or cart mutations cannot alter
//! an order retroactively.

use chrono::{DateTime, Utc};
use serde::Serialize;

use mercadito_core::{OrderId, OrderItemId, Price, ProductId, UserId};

/// A frozen line item of an order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    /// Unique order line ID.
    pub id: OrderItemId,
    /// Product that was purchased (historical reference; the product may
    /// no longer exist).
    pub product_id: ProductId,
    /// Product name at purchase time.
    pub product_name: String,
    /// Number of units purchased.
    pub quantity: i64,
    /// Unit price at purchase time.
    pub unit_price: Price,
}

impl OrderItem {
    /// `quantity x unit_price` for this line.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.line_total(self.quantity)
    }
}

/// A completed purchase.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,
    /// User who placed the order.
    pub user_id: UserId,
    /// Total captured at checkout time; equals the sum of the item line
    /// totals by construction.
    pub total_price: Price,
    /// When the checkout completed.
    pub created_at: DateTime<Utc>,
    /// Frozen line items.
    pub items: Vec<OrderItem>,
}
