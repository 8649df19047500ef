//! Database access for the storefront.
//!
//! # Tables used
//!
//! - `guests`, `cart_items` - shopper identity and carts
//! - `categories`, `products`, `product_images`, `product_attributes`
//! - `banner_slides` - home page hero
//! - `orders`, `order_items` - checkout
//! - `cities`, `zones`, `districts`, `shipping_costs` - delivery geography
//! - `activity_logs` - shopper audit trail
//! - `tower_sessions.session` - session storage
//!
//! # Migrations
//!
//! Migrations live in the workspace `migrations/` directory and run via:
//! ```bash
//! cargo run -p souq-cli -- migrate
//! ```

pub mod cart;
pub mod catalog;
pub mod geography;
pub mod guests;
pub mod orders;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use cart::CartRepository;
pub use catalog::{CatalogRepository, PriceFilter, ShopFilter, ShopSort};
pub use geography::GeographyRepository;
pub use guests::GuestRepository;
pub use orders::{LineRequest, NewOrder, OrderRepository, PlaceOrderError};

/// Errors that can occur during repository operations.
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

    /// Constraint violation (e.g., duplicate session token).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
