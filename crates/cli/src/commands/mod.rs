//! CLI command implementations.

pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use sqlx::SqlitePool;
use thiserror::Error;

/// Errors shared by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Missing environment variable.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Repository error while seeding.
    #[error("Seed error: {0}")]
    Seed(#[from] mercadito_server::db::RepositoryError),
}

/// Connect to the database named by `MERCADITO_DATABASE_URL` (with
/// `DATABASE_URL` as a fallback).
pub async fn connect() -> Result<SqlitePool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("MERCADITO_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| CommandError::MissingEnvVar("MERCADITO_DATABASE_URL"))?;

    let pool = mercadito_server::db::create_pool(&SecretString::from(database_url)).await?;
    Ok(pool)
}
