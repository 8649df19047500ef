//! Database migration command.
//!
//! Migrations live in `migrations/` at the workspace root and are embedded
//! at compile time. Neither server applies them on startup.

use super::{CliError, connect};

/// Apply every pending migration.
///
/// # Errors
///
/// Returns `CliError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../../migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
