//! Cart repository.
//!
//! The cart aggregate: one row per user plus its line items, with a cached
//! total. Every mutation runs in a `BEGIN IMMEDIATE` transaction and ends by
//! recomputing the cached total from the line items and current product
//! prices, so `carts.total_price_cents` is never stale when read.
//!
//! Line items are only ever mutated through this repository; ownership is
//! enforced by scoping every item query to the caller's cart, and a missing
//! or foreign item is reported as `NotFound` so callers learn nothing about
//! other users' carts.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use mercadito_core::{CartId, CartItemId, Price, ProductId, UserId};

use super::{RepositoryError, begin_immediate};
use crate::models::{Cart, CartItem};

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: CartId,
    user_id: UserId,
    total_price_cents: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    id: CartItemId,
    product_id: ProductId,
    product_name: String,
    quantity: i64,
    price_cents: i64,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: Price::from_cents(row.price_cents),
        }
    }
}

/// Repository for cart operations.
pub struct CartRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the user's cart, creating an empty one if none exists.
    ///
    /// Concurrent first access is safe: the `UNIQUE` constraint on
    /// `carts.user_id` turns the insert race into a fetch, so exactly one
    /// cart ever exists per user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the transaction fails.
    pub async fn get_or_create(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let mut tx = begin_immediate(self.pool).await?;
        let row = get_or_create_row(&mut tx, user_id).await?;
        let items = load_items(&mut tx, row.id).await?;
        tx.commit().await?;

        Ok(assemble(row, items))
    }

    /// Get the user's cart with its items, or `None` if it was never created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_as::<_, CartRow>(
            r"
            SELECT id, user_id, total_price_cents, created_at, updated_at
            FROM carts
            WHERE user_id = ?
            ",
        )
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = load_items(&mut conn, row.id).await?;
        Ok(Some(assemble(row, items)))
    }

    /// Add a product to the user's cart, or overwrite the quantity of its
    /// existing line (idempotent set, not an additive merge).
    ///
    /// The caller's cart is created on first use. The cached total is
    /// recomputed in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Database` if the transaction fails.
    pub async fn add_or_update_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartItem, RepositoryError> {
        let mut tx = begin_immediate(self.pool).await?;

        let cart = get_or_create_row(&mut tx, user_id).await?;

        let product = sqlx::query_as::<_, (String, i64)>(
            "SELECT name, price_cents FROM products WHERE id = ?",
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let (item_id, quantity) = sqlx::query_as::<_, (CartItemId, i64)>(
            r"
            INSERT INTO cart_items (cart_id, product_id, quantity)
            VALUES (?, ?, ?)
            ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = excluded.quantity
            RETURNING id, quantity
            ",
        )
        .bind(cart.id)
        .bind(product_id)
        .bind(quantity)
        .fetch_one(&mut *tx)
        .await?;

        recompute_total(&mut tx, cart.id).await?;
        tx.commit().await?;

        Ok(CartItem {
            id: item_id,
            product_id,
            product_name: product.0,
            quantity,
            unit_price: Price::from_cents(product.1),
        })
    }

    /// Set the quantity of an existing line item in the caller's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item doesn't exist or
    /// belongs to another user's cart.
    pub async fn update_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i64,
    ) -> Result<CartItem, RepositoryError> {
        let mut tx = begin_immediate(self.pool).await?;

        let row = sqlx::query_as::<_, (CartId, ProductId, String, i64)>(
            r"
            SELECT ci.cart_id, ci.product_id, p.name, p.price_cents
            FROM cart_items ci
            JOIN carts c ON c.id = ci.cart_id
            JOIN products p ON p.id = ci.product_id
            WHERE ci.id = ? AND c.user_id = ?
            ",
        )
        .bind(item_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        sqlx::query("UPDATE cart_items SET quantity = ? WHERE id = ?")
            .bind(quantity)
            .bind(item_id)
            .execute(&mut *tx)
            .await?;

        recompute_total(&mut tx, row.0).await?;
        tx.commit().await?;

        Ok(CartItem {
            id: item_id,
            product_id: row.1,
            product_name: row.2,
            quantity,
            unit_price: Price::from_cents(row.3),
        })
    }

    /// Remove a line item from the caller's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item doesn't exist or
    /// belongs to another user's cart.
    pub async fn remove_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<(), RepositoryError> {
        let mut tx = begin_immediate(self.pool).await?;

        let cart_id = sqlx::query_scalar::<_, CartId>(
            r"
            SELECT ci.cart_id
            FROM cart_items ci
            JOIN carts c ON c.id = ci.cart_id
            WHERE ci.id = ? AND c.user_id = ?
            ",
        )
        .bind(item_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        sqlx::query("DELETE FROM cart_items WHERE id = ?")
            .bind(item_id)
            .execute(&mut *tx)
            .await?;

        recompute_total(&mut tx, cart_id).await?;
        tx.commit().await?;

        Ok(())
    }
}

fn assemble(row: CartRow, items: Vec<CartItem>) -> Cart {
    Cart {
        id: row.id,
        user_id: row.user_id,
        items,
        total_price: Price::from_cents(row.total_price_cents),
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

/// Fetch the user's cart row, inserting an empty one if missing.
///
/// A unique-violation on insert means another writer created the cart
/// between our read and write; it is fetched instead (`constraint violation
/// as already-exists`, never treated as an error).
async fn get_or_create_row(
    conn: &mut SqliteConnection,
    user_id: UserId,
) -> Result<CartRow, RepositoryError> {
    let now = Utc::now();

    let inserted = sqlx::query_as::<_, CartRow>(
        r"
        INSERT INTO carts (user_id, total_price_cents, created_at, updated_at)
        VALUES (?, 0, ?, ?)
        ON CONFLICT (user_id) DO NOTHING
        RETURNING id, user_id, total_price_cents, created_at, updated_at
        ",
    )
    .bind(user_id)
    .bind(now)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(row) = inserted {
        return Ok(row);
    }

    let existing = sqlx::query_as::<_, CartRow>(
        r"
        SELECT id, user_id, total_price_cents, created_at, updated_at
        FROM carts
        WHERE user_id = ?
        ",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    existing.ok_or_else(|| {
        RepositoryError::DataCorruption("cart insert conflicted but no row exists".to_owned())
    })
}

/// Load a cart's line items with current product names and prices.
async fn load_items(
    conn: &mut SqliteConnection,
    cart_id: CartId,
) -> Result<Vec<CartItem>, RepositoryError> {
    let rows = sqlx::query_as::<_, CartItemRow>(
        r"
        SELECT ci.id, ci.product_id, p.name AS product_name, ci.quantity, p.price_cents
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = ?
        ORDER BY ci.id ASC
        ",
    )
    .bind(cart_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(CartItem::from).collect())
}

/// Recompute the cached cart total from its items and current prices.
///
/// Must run inside the same transaction as the mutation it follows.
pub(crate) async fn recompute_total(
    conn: &mut SqliteConnection,
    cart_id: CartId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE carts
        SET total_price_cents = COALESCE((
                SELECT SUM(ci.quantity * p.price_cents)
                FROM cart_items ci
                JOIN products p ON p.id = ci.product_id
                WHERE ci.cart_id = carts.id
            ), 0),
            updated_at = ?
        WHERE id = ?
        ",
    )
    .bind(Utc::now())
    .bind(cart_id)
    .execute(conn)
    .await?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
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
        let category = match CategoryRepository::new(pool).create("general").await {
            Ok(c) => c,
            Err(_) => CategoryRepository::new(pool)
                .list()
                .await
                .unwrap()
                .remove(0),
        };
        ProductRepository::new(pool)
            .create(category.id, name, "", Price::from_cents(cents))
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn get_or_create_returns_the_same_cart() {
        let pool = memory_pool().await;
        let user = seed_user(&pool, "u@example.com").await;
        let repo = CartRepository::new(&pool);

        let first = repo.get_or_create(user).await.unwrap();
        let second = repo.get_or_create(user).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.total_price, Price::ZERO);
        assert!(first.items.is_empty());
    }

    #[tokio::test]
    async fn total_invariant_holds_after_every_mutation() {
        let pool = memory_pool().await;
        let user = seed_user(&pool, "u@example.com").await;
        let a = seed_product(&pool, "a", 1000).await;
        let b = seed_product(&pool, "b", 500).await;
        let repo = CartRepository::new(&pool);

        // add A x2 -> 20.00
        let item_a = repo.add_or_update_item(user, a, 2).await.unwrap();
        let cart = repo.get_for_user(user).await.unwrap().unwrap();
        assert_eq!(cart.total_price, Price::from_cents(2000));
        assert_eq!(cart.total_price, cart.computed_total());

        // add B x1 -> 25.00 (the worked example)
        repo.add_or_update_item(user, b, 1).await.unwrap();
        let cart = repo.get_for_user(user).await.unwrap().unwrap();
        assert_eq!(cart.total_price, Price::from_cents(2500));
        assert_eq!(cart.total_price, cart.computed_total());

        // overwrite A's quantity to 5 -> 55.00
        repo.update_item(user, item_a.id, 5).await.unwrap();
        let cart = repo.get_for_user(user).await.unwrap().unwrap();
        assert_eq!(cart.total_price, Price::from_cents(5500));
        assert_eq!(cart.total_price, cart.computed_total());

        // remove A -> 5.00
        repo.remove_item(user, item_a.id).await.unwrap();
        let cart = repo.get_for_user(user).await.unwrap().unwrap();
        assert_eq!(cart.total_price, Price::from_cents(500));
        assert_eq!(cart.total_price, cart.computed_total());
        assert_eq!(cart.items.len(), 1);
    }

    #[tokio::test]
    async fn re_adding_a_product_overwrites_quantity() {
        let pool = memory_pool().await;
        let user = seed_user(&pool, "u@example.com").await;
        let a = seed_product(&pool, "a", 1000).await;
        let repo = CartRepository::new(&pool);

        let first = repo.add_or_update_item(user, a, 2).await.unwrap();
        let second = repo.add_or_update_item(user, a, 3).await.unwrap();

        // Same line, not a duplicate; quantity is 3, not 5.
        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 3);

        let cart = repo.get_for_user(user).await.unwrap().unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.total_price, Price::from_cents(3000));
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let pool = memory_pool().await;
        let user = seed_user(&pool, "u@example.com").await;
        let repo = CartRepository::new(&pool);

        let err = repo
            .add_or_update_item(user, ProductId::new(404), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn foreign_items_are_invisible() {
        let pool = memory_pool().await;
        let alice = seed_user(&pool, "alice@example.com").await;
        let bob = seed_user(&pool, "bob@example.com").await;
        let a = seed_product(&pool, "a", 1000).await;
        let repo = CartRepository::new(&pool);

        let item = repo.add_or_update_item(alice, a, 1).await.unwrap();

        // Bob can neither update nor remove Alice's line, and the error
        // does not reveal that it exists.
        assert!(matches!(
            repo.update_item(bob, item.id, 9).await.unwrap_err(),
            RepositoryError::NotFound
        ));
        assert!(matches!(
            repo.remove_item(bob, item.id).await.unwrap_err(),
            RepositoryError::NotFound
        ));

        // Alice's cart is untouched.
        let cart = repo.get_for_user(alice).await.unwrap().unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 1);
    }
}
