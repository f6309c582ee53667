//! Database migration command.
//!
//! Applies the embedded migrations from `crates/server/migrations/` to the
//! database named by `MERCADITO_DATABASE_URL`.

use super::CommandError;

/// Run pending database migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = super::connect().await?;

    tracing::info!("Running migrations...");
    mercadito_server::db::MIGRATOR.run(&pool).await?;
    tracing::info!("Migrations complete");

    Ok(())
}
