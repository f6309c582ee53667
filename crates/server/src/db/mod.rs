//! Database operations for the Mercadito `SQLite` store.
//!
//! # Tables
//!
//! - `users` / `revoked_tokens` - Authentication
//! - `categories` / `products` - Catalog (the price lookup collaborator)
//! - `carts` / `cart_items` - Per-user mutable working set with cached total
//! - `orders` / `order_items` - Immutable checkout history
//!
//! # Migrations
//!
//! Migrations live in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p mercadito-cli -- migrate
//! ```
//!
//! # Write discipline
//!
//! Every mutation of cart state runs inside a `BEGIN IMMEDIATE` transaction
//! (see [`begin_immediate`]) so concurrent writers serialize up front instead
//! of failing halfway through with a busy snapshot.

use std::str::FromStr;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use thiserror::Error;

pub mod carts;
pub mod orders;
pub mod products;
pub mod users;

pub use carts::CartRepository;
pub use orders::OrderRepository;
pub use products::{CategoryRepository, ProductRepository};
pub use users::UserRepository;

/// Errors returned by repositories.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Embedded migrations for the server database.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Create a `SQLite` connection pool with sensible defaults.
///
/// Enables foreign keys and WAL journaling, creates the database file if
/// missing, and sets a busy timeout so writers waiting on the `IMMEDIATE`
/// lock block instead of erroring.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is invalid or the connection fails.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url.expose_secret())?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}

/// Begin a write transaction that takes the database write lock immediately.
///
/// `SQLite`'s default deferred transactions acquire the write lock on first
/// write, which lets two checkouts read the same cart snapshot before one of
/// them fails with `SQLITE_BUSY_SNAPSHOT`. `BEGIN IMMEDIATE` serializes
/// writers at the start: the loser waits (bounded by the pool's busy
/// timeout) and then re-reads committed state.
///
/// # Errors
///
/// Returns `sqlx::Error` if the transaction cannot be started.
pub async fn begin_immediate(pool: &SqlitePool) -> Result<Transaction<'_, Sqlite>, sqlx::Error> {
    pool.begin_with("BEGIN IMMEDIATE").await
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{MIGRATOR, SqlitePool};

    /// In-memory database for repository tests.
    ///
    /// A single connection keeps every query on the same in-memory database.
    #[allow(clippy::unwrap_used)]
    pub async fn memory_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(":memory:")
            .await
            .unwrap();
        MIGRATOR.run(&pool).await.unwrap();
        pool
    }
}
