//! Order repository.
//!
//! Orders are append-only: the only insert path is the checkout transaction
//! in [`crate::services::checkout`], and no update or delete statements for
//! `orders`/`order_items` exist anywhere in the crate.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use mercadito_core::{OrderId, OrderItemId, Price, ProductId, UserId};

use super::RepositoryError;
use crate::models::{Order, OrderItem};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    total_price_cents: i64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    product_id: ProductId,
    product_name: String,
    quantity: i64,
    unit_price_cents: i64,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: Price::from_cents(row.unit_price_cents),
        }
    }
}

/// Repository for reading order history.
pub struct OrderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get an order by ID, regardless of owner.
    ///
    /// Ownership is checked by the caller with the shared authorization
    /// predicate so that foreign orders yield `403`, not `404`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, total_price_cents, created_at
            FROM orders
            WHERE id = ?
            ",
        )
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = load_items(&mut conn, row.id).await?;
        Ok(Some(assemble(row, items)))
    }

    /// List a user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, total_price_cents, created_at
            FROM orders
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let items = load_items(&mut conn, row.id).await?;
            orders.push(assemble(row, items));
        }

        Ok(orders)
    }
}

fn assemble(row: OrderRow, items: Vec<OrderItem>) -> Order {
    Order {
        id: row.id,
        user_id: row.user_id,
        total_price: Price::from_cents(row.total_price_cents),
        created_at: row.created_at,
        items,
    }
}

async fn load_items(
    conn: &mut SqliteConnection,
    order_id: OrderId,
) -> Result<Vec<OrderItem>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        r"
        SELECT id, product_id, product_name, quantity, unit_price_cents
        FROM order_items
        WHERE order_id = ?
        ORDER BY id ASC
        ",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(OrderItem::from).collect())
}
