//! Catalog repositories: categories and products.
//!
//! Products are the price-lookup collaborator for the cart: cart and
//! checkout transactions read `price_cents` from here, never a cached copy.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use mercadito_core::{CartId, CategoryId, Price, ProductId};

use super::carts::recompute_total;
use super::{RepositoryError, begin_immediate};
use crate::models::{Category, Product};

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    category_id: CategoryId,
    name: String,
    description: String,
    price_cents: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            category_id: row.category_id,
            name: row.name,
            description: row.description,
            price: Price::from_cents(row.price_cents),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for category operations.
pub struct CategoryRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// List all categories by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, (CategoryId, String)>(
            "SELECT id, name FROM categories ORDER BY name ASC",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| Category { id, name })
            .collect())
    }

    /// Get a category by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row =
            sqlx::query_as::<_, (CategoryId, String)>("SELECT id, name FROM categories WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        Ok(row.map(|(id, name)| Category { id, name }))
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name already exists.
    pub async fn create(&self, name: &str) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, (CategoryId, String)>(
            "INSERT INTO categories (name) VALUES (?) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("category name already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        Ok(Category {
            id: row.0,
            name: row.1,
        })
    }

    /// Rename a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist.
    /// Returns `RepositoryError::Conflict` if the new name is taken.
    pub async fn update(&self, id: CategoryId, name: &str) -> Result<Category, RepositoryError> {
        let result = sqlx::query("UPDATE categories SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return RepositoryError::Conflict("category name already exists".to_owned());
                }
                RepositoryError::Database(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(Category {
            id,
            name: name.to_owned(),
        })
    }

    /// Delete a category (cascades to its products and their cart lines).
    ///
    /// Returns `true` if the category existed. Cached totals of carts that
    /// lose lines to the cascade are recomputed in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the transaction fails.
    pub async fn delete(&self, id: CategoryId) -> Result<bool, RepositoryError> {
        let mut tx = begin_immediate(self.pool).await?;

        let affected_carts = sqlx::query_scalar::<_, CartId>(
            r"
            SELECT DISTINCT ci.cart_id
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE p.category_id = ?
            ",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for cart_id in affected_carts {
            recompute_total(&mut tx, cart_id).await?;
        }
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Cart ids holding a line for this product, for total recomputation
/// after a catalog change.
async fn carts_holding(
    conn: &mut SqliteConnection,
    product_id: ProductId,
) -> Result<Vec<CartId>, RepositoryError> {
    let ids = sqlx::query_scalar::<_, CartId>(
        "SELECT DISTINCT cart_id FROM cart_items WHERE product_id = ?",
    )
    .bind(product_id)
    .fetch_all(conn)
    .await?;

    Ok(ids)
}

/// Repository for product operations.
pub struct ProductRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// List all products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, category_id, name, description, price_cents, created_at, updated_at
            FROM products
            ORDER BY created_at DESC, id DESC
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, category_id, name, description, price_cents, created_at, updated_at
            FROM products
            WHERE id = ?
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist.
    pub async fn create(
        &self,
        category_id: CategoryId,
        name: &str,
        description: &str,
        price: Price,
    ) -> Result<Product, RepositoryError> {
        let now = Utc::now();

        let row = sqlx::query_as::<_, ProductRow>(
            r"
            INSERT INTO products (category_id, name, description, price_cents, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, category_id, name, description, price_cents, created_at, updated_at
            ",
        )
        .bind(category_id)
        .bind(name)
        .bind(description)
        .bind(price.to_cents())
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::NotFound;
            }
            RepositoryError::Database(e)
        })?;

        Ok(row.into())
    }

    /// Partially update a product; `None` fields keep their current value.
    ///
    /// A price change invalidates the cached totals of carts holding this
    /// product, so those are recomputed in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product (or, when moving
    /// categories, the target category) doesn't exist.
    pub async fn update(
        &self,
        id: ProductId,
        category_id: Option<CategoryId>,
        name: Option<&str>,
        description: Option<&str>,
        price: Option<Price>,
    ) -> Result<Product, RepositoryError> {
        let mut tx = begin_immediate(self.pool).await?;

        let row = sqlx::query_as::<_, ProductRow>(
            r"
            UPDATE products
            SET category_id = COALESCE(?, category_id),
                name        = COALESCE(?, name),
                description = COALESCE(?, description),
                price_cents = COALESCE(?, price_cents),
                updated_at  = ?
            WHERE id = ?
            RETURNING id, category_id, name, description, price_cents, created_at, updated_at
            ",
        )
        .bind(category_id)
        .bind(name)
        .bind(description)
        .bind(price.map(Price::to_cents))
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::NotFound;
            }
            RepositoryError::Database(e)
        })?;

        let row = row.ok_or(RepositoryError::NotFound)?;

        if price.is_some() {
            for cart_id in carts_holding(&mut tx, id).await? {
                recompute_total(&mut tx, cart_id).await?;
            }
        }
        tx.commit().await?;

        Ok(row.into())
    }

    /// Delete a product (cascades to any cart lines referencing it).
    ///
    /// Returns `true` if the product existed. Cached totals of carts that
    /// lose a line are recomputed in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the transaction fails.
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let mut tx = begin_immediate(self.pool).await?;

        let affected_carts = carts_holding(&mut tx, id).await?;

        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for cart_id in affected_carts {
            recompute_total(&mut tx, cart_id).await?;
        }
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;

    async fn seed_category(pool: &SqlitePool) -> Category {
        CategoryRepository::new(pool).create("pantry").await.unwrap()
    }

    #[tokio::test]
    async fn product_crud_round_trip() {
        let pool = memory_pool().await;
        let category = seed_category(&pool).await;
        let repo = ProductRepository::new(&pool);

        let product = repo
            .create(category.id, "Olive Oil", "extra virgin", Price::from_cents(1250))
            .await
            .unwrap();
        assert_eq!(product.price, Price::from_cents(1250));

        let updated = repo
            .update(product.id, None, None, None, Some(Price::from_cents(1399)))
            .await
            .unwrap();
        assert_eq!(updated.price, Price::from_cents(1399));
        assert_eq!(updated.name, "Olive Oil");

        assert!(repo.delete(product.id).await.unwrap());
        assert!(repo.get(product.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_with_unknown_category_is_not_found() {
        let pool = memory_pool().await;
        let repo = ProductRepository::new(&pool);

        let err = repo
            .create(CategoryId::new(999), "Ghost", "", Price::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn catalog_changes_refresh_cached_cart_totals() {
        use crate::db::carts::CartRepository;
        use crate::db::users::UserRepository;
        use mercadito_core::Email;

        let pool = memory_pool().await;
        let category = seed_category(&pool).await;
        let products = ProductRepository::new(&pool);
        let product = products
            .create(category.id, "Oil", "", Price::from_cents(1000))
            .await
            .unwrap();

        let user = UserRepository::new(&pool)
            .create(&Email::parse("u@example.com").unwrap(), "U", "h")
            .await
            .unwrap()
            .id;
        let carts = CartRepository::new(&pool);
        carts.add_or_update_item(user, product.id, 2).await.unwrap();

        // Reprice: the cached total follows the new price.
        products
            .update(product.id, None, None, None, Some(Price::from_cents(1500)))
            .await
            .unwrap();
        let cart = carts.get_for_user(user).await.unwrap().unwrap();
        assert_eq!(cart.total_price, Price::from_cents(3000));
        assert_eq!(cart.total_price, cart.computed_total());

        // Delete: the cascade removes the line and the total goes to zero.
        assert!(products.delete(product.id).await.unwrap());
        let cart = carts.get_for_user(user).await.unwrap().unwrap();
        assert!(cart.items.is_empty());
        assert_eq!(cart.total_price, Price::ZERO);
    }

    #[tokio::test]
    async fn duplicate_category_name_is_a_conflict() {
        let pool = memory_pool().await;
        let repo = CategoryRepository::new(&pool);

        repo.create("pantry").await.unwrap();
        let err = repo.create("pantry").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }
}
