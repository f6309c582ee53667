//! Catalog seeding command.
//!
//! Inserts a small demo catalog so a fresh database has something to put
//! in a cart. Re-running is safe: categories that already exist are
//! skipped along with their products.

use mercadito_core::Price;
use mercadito_server::db::{CategoryRepository, ProductRepository, RepositoryError};

use super::CommandError;

const CATALOG: &[(&str, &[(&str, &str, i64)])] = &[
    (
        "Groceries",
        &[
            ("Coffee beans 500g", "Medium roast, whole bean", 1250),
            ("Olive oil 1L", "Extra virgin, cold pressed", 899),
            ("Pasta 500g", "Bronze-cut spaghetti", 249),
        ],
    ),
    (
        "Electronics",
        &[
            ("USB-C cable 2m", "Braided, 100W charging", 1499),
            ("Wireless mouse", "Silent clicks, USB receiver", 2350),
        ],
    ),
    (
        "Books",
        &[("City field guide", "Pocket guide to urban birds", 1800)],
    ),
];

/// Seed the catalog with demo categories and products.
///
/// # Errors
///
/// Returns an error if the database is unreachable or an insert fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = super::connect().await?;

    let categories = CategoryRepository::new(&pool);
    let products = ProductRepository::new(&pool);

    for &(category_name, items) in CATALOG {
        let category = match categories.create(category_name).await {
            Ok(category) => category,
            Err(RepositoryError::Conflict(_)) => {
                tracing::info!("Category '{category_name}' already exists, skipping");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        for &(name, description, cents) in items {
            products
                .create(category.id, name, description, Price::from_cents(cents))
                .await?;
            tracing::info!("Seeded product '{name}'");
        }
    }

    tracing::info!("Seeding complete");
    Ok(())
}
