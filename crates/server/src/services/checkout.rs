//! The checkout transaction.
//!
//! Converts a user's cart into an immutable order as a single all-or-nothing
//! unit: read the cart, write the order with structurally copied line items,
//! empty the cart, reset its total. Nothing outside the transaction can ever
//! observe a partial state (an order without items, a half-cleared cart).
//!
//! Two checkouts for the same user cannot both convert one cart snapshot:
//! the `BEGIN IMMEDIATE` transaction serializes writers, so the second
//! checkout re-reads the emptied cart and fails with [`CheckoutError::EmptyCart`].

use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;

use mercadito_core::{CartId, OrderId, OrderItemId, Price, ProductId, UserId};

use crate::db::begin_immediate;
use crate::models::{Order, OrderItem};

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The user has no cart, or the cart has no items. A user-facing
    /// error, not a fault; no order is created.
    #[error("cart is empty")]
    EmptyCart,

    /// A persistence failure inside the atomic unit. Everything is rolled
    /// back and the cart is left exactly as it was, so the caller may
    /// safely retry.
    #[error("checkout transaction failed: {0}")]
    Transaction(#[from] sqlx::Error),
}

/// One cart line as read inside the checkout transaction, joined with the
/// product's current name and price. These values are what gets frozen into
/// the order.
#[derive(Debug, sqlx::FromRow)]
struct CheckoutLine {
    product_id: ProductId,
    product_name: String,
    quantity: i64,
    price_cents: i64,
}

/// Service executing the cart-to-order checkout transaction.
pub struct CheckoutService<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Convert the user's cart into an order.
    ///
    /// Atomically: snapshot the cart's lines with their
    /// price-at-this-moment, insert the order and fresh copies of every
    /// line (cart item rows are never reparented), delete the cart's items,
    /// and reset the cached total to zero. The order total is computed from
    /// the same rows that become order items, so it equals their sum by
    /// construction.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::EmptyCart`] if the user has no cart or the
    /// cart has no items. Returns [`CheckoutError::Transaction`] if any
    /// statement fails; the transaction is rolled back on drop and the cart
    /// is left untouched.
    pub async fn checkout(&self, user_id: UserId) -> Result<Order, CheckoutError> {
        let mut tx = begin_immediate(self.pool).await?;

        let cart_id = sqlx::query_scalar::<_, CartId>("SELECT id FROM carts WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(CheckoutError::EmptyCart)?;

        let lines = sqlx::query_as::<_, CheckoutLine>(
            r"
            SELECT ci.product_id, p.name AS product_name, ci.quantity, p.price_cents
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.cart_id = ?
            ORDER BY ci.id ASC
            ",
        )
        .bind(cart_id)
        .fetch_all(&mut *tx)
        .await?;

        if lines.is_empty() {
            // Drop of `tx` rolls back; no order row is left behind.
            return Err(CheckoutError::EmptyCart);
        }

        let total_cents = lines
            .iter()
            .fold(0_i64, |acc, l| acc.saturating_add(l.quantity * l.price_cents));
        let now = Utc::now();

        let order_id = sqlx::query_scalar::<_, OrderId>(
            r"
            INSERT INTO orders (user_id, total_price_cents, created_at)
            VALUES (?, ?, ?)
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(total_cents)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        // Structural copies: new rows built from the cart line's fields,
        // freezing product name and unit price at this moment.
        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item_id = sqlx::query_scalar::<_, OrderItemId>(
                r"
                INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price_cents)
                VALUES (?, ?, ?, ?, ?)
                RETURNING id
                ",
            )
            .bind(order_id)
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(line.quantity)
            .bind(line.price_cents)
            .fetch_one(&mut *tx)
            .await?;

            items.push(OrderItem {
                id: item_id,
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price: Price::from_cents(line.price_cents),
            });
        }

        sqlx::query("DELETE FROM cart_items WHERE cart_id = ?")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE carts SET total_price_cents = 0, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            order_id = %order_id,
            total_cents,
            lines = items.len(),
            "checkout completed"
        );

        Ok(Order {
            id: order_id,
            user_id,
            total_price: Price::from_cents(total_cents),
            created_at: now,
            items,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::db::carts::CartRepository;
    use crate::db::orders::OrderRepository;
    use crate::db::products::{CategoryRepository, ProductRepository};
    use crate::db::test_support::memory_pool;
    use crate::db::users::UserRepository;
    use mercadito_core::Email;

    async fn seed_user(pool: &SqlitePool, email: &str) -> UserId {
        UserRepository::new(pool)
            .create(&Email::parse(email).unwrap(), "Test", "hash")
            .await
            .unwrap()
            .id
    }

    async fn seed_product(pool: &SqlitePool, name: &str, cents: i64) -> ProductId {
        let categories = CategoryRepository::new(pool);
        let category = match categories.create("general").await {
            Ok(c) => c,
            Err(_) => categories.list().await.unwrap().remove(0),
        };
        ProductRepository::new(pool)
            .create(category.id, name, "", Price::from_cents(cents))
            .await
            .unwrap()
            .id
    }

    async fn order_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn checkout_without_a_cart_is_empty_cart() {
        let pool = memory_pool().await;
        let user = seed_user(&pool, "u@example.com").await;

        let err = CheckoutService::new(&pool).checkout(user).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
        assert_eq!(order_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn checkout_of_an_emptied_cart_is_empty_cart() {
        let pool = memory_pool().await;
        let user = seed_user(&pool, "u@example.com").await;
        let product = seed_product(&pool, "a", 1000).await;

        let carts = CartRepository::new(&pool);
        let item = carts.add_or_update_item(user, product, 1).await.unwrap();
        carts.remove_item(user, item.id).await.unwrap();

        let err = CheckoutService::new(&pool).checkout(user).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
        assert_eq!(order_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn checkout_snapshots_the_cart_and_empties_it() {
        let pool = memory_pool().await;
        let user = seed_user(&pool, "u@example.com").await;
        let a = seed_product(&pool, "a", 1000).await;
        let b = seed_product(&pool, "b", 500).await;

        let carts = CartRepository::new(&pool);
        carts.add_or_update_item(user, a, 2).await.unwrap();
        carts.add_or_update_item(user, b, 1).await.unwrap();

        let order = CheckoutService::new(&pool).checkout(user).await.unwrap();

        // Order matches the pre-checkout cart: 2 x 10.00 + 1 x 5.00 = 25.00.
        assert_eq!(order.total_price, Price::from_cents(2500));
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].product_id, a);
        assert_eq!(order.items[0].quantity, 2);
        assert_eq!(order.items[0].unit_price, Price::from_cents(1000));
        assert_eq!(order.items[1].product_id, b);
        assert_eq!(order.items[1].quantity, 1);

        // Total equals the sum of line totals by construction.
        assert_eq!(
            order.total_price,
            Price::sum(order.items.iter().map(OrderItem::line_total))
        );

        // The cart is left empty with a zero total.
        let cart = carts.get_for_user(user).await.unwrap().unwrap();
        assert!(cart.items.is_empty());
        assert_eq!(cart.total_price, Price::ZERO);

        // And a second checkout sees the emptied cart.
        let err = CheckoutService::new(&pool).checkout(user).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
        assert_eq!(order_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn orders_are_immune_to_later_cart_and_price_changes() {
        let pool = memory_pool().await;
        let user = seed_user(&pool, "u@example.com").await;
        let a = seed_product(&pool, "a", 1000).await;

        let carts = CartRepository::new(&pool);
        carts.add_or_update_item(user, a, 2).await.unwrap();
        let order = CheckoutService::new(&pool).checkout(user).await.unwrap();

        // Raise the catalog price and refill the cart afterwards.
        ProductRepository::new(&pool)
            .update(a, None, None, None, Some(Price::from_cents(9999)))
            .await
            .unwrap();
        carts.add_or_update_item(user, a, 7).await.unwrap();

        // The stored order still shows the price-at-purchase.
        let stored = OrderRepository::new(&pool)
            .get(order.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.total_price, Price::from_cents(2000));
        assert_eq!(stored.items.len(), 1);
        assert_eq!(stored.items[0].unit_price, Price::from_cents(1000));
        assert_eq!(stored.items[0].quantity, 2);
    }
}
