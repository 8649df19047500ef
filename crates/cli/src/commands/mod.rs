//! Subcommand implementations.

pub mod admin;
pub mod dropship;
pub mod geography;
pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use souq_admin::db::RepositoryError;
use souq_admin::services::{AuthError, BostaError, ScrapeError};

/// Errors surfaced by any command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("{0}")]
    Auth(#[from] AuthError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Courier error: {0}")]
    Bosta(#[from] BostaError),

    #[error("Scrape error: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// `DATABASE_URL`, falling back to `ADMIN_DATABASE_URL`.
fn database_url() -> Result<SecretString, CliError> {
    std::env::var("DATABASE_URL")
        .or_else(|_| std::env::var("ADMIN_DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar("DATABASE_URL"))
}

async fn connect() -> Result<PgPool, CliError> {
    let url = database_url()?;
    tracing::info!("Connecting to database...");
    Ok(souq_admin::db::create_pool(&url).await?)
}
