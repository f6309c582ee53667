//! Catalog domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use mercadito_core::{CategoryId, Price, ProductId};

/// A product category.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    /// Unique category ID.
    pub id: CategoryId,
    /// Category name (unique).
    pub name: String,
}

/// A catalog product.
///
/// `price` is the *current* unit price; carts read it live, orders freeze a
/// copy of it at checkout time.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Category this product belongs to.
    pub category_id: CategoryId,
    /// Product name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Current unit price.
    pub price: Price,
    /// When the product was created.
    pub created_at: DateTime<Utc>,
    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}
