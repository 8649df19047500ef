//! Database access for the back-office.
//!
//! The admin shares the storefront database.
//!
//! # Tables used
//!
//! - `admins` - back-office accounts
//! - `categories`, `products`, `product_images`, `product_attributes`
//! - `orders`, `order_items` - order management and exports
//! - `cities`, `zones`, `districts`, `shipping_costs` - delivery geography
//! - `dropship_products` - scraped products awaiting import
//! - `banner_slides` - home page hero
//! - `guests` - customer statistics on the dashboard
//! - `tower_sessions.session` - session storage
//!
//! # Migrations
//!
//! Migrations live in the workspace `migrations/` directory and run via:
//! ```bash
//! cargo run -p souq-cli -- migrate
//! ```

pub mod admins;
pub mod banners;
pub mod categories;
pub mod dashboard;
pub mod dropship;
pub mod geography;
pub mod orders;
pub mod products;

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use thiserror::Error;

pub use admins::AdminRepository;
pub use banners::{BannerInput, BannerRepository};
pub use categories::{CategoryRepository, DEFAULT_CATEGORY_NAME};
pub use dashboard::{
    ChartPoint, DashboardCounts, DashboardRepository, DeliveredRevenue, MonthlyDelivered,
    RevenueSummary, StatusCount, TopProduct,
};
pub use dropship::{DropshipRepository, is_stale};
pub use geography::{CityShipping, GeographyRepository, average_price};
pub use orders::{
    AddItemError, ExportRow, IncomeProductRow, IncomeRow, OrderFilter, OrderRepository,
    OrderSummary,
};
pub use products::{NewProduct, ProductRepository, ProductUpdate};

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

    /// Constraint violation (e.g., duplicate category name).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map unique violations to `Conflict`, everything else to `Database`.
pub(crate) fn unique_or_database(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// A `created_at` window. `until` is exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Window covering whole days, `end` included.
    #[must_use]
    pub fn from_days(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self {
            from: start.and_then(|d| d.and_hms_opt(0, 0, 0)).map(|d| d.and_utc()),
            until: end
                .and_then(|d| d.succ_opt())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|d| d.and_utc()),
        }
    }

    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.until.is_none()
    }

    /// Append ` AND column >= .. AND column < ..` for the bounds that are set.
    pub(crate) fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>, column: &str) {
        if let Some(from) = self.from {
            qb.push(format!(" AND {column} >= ")).push_bind(from);
        }
        if let Some(until) = self.until {
            qb.push(format!(" AND {column} < ")).push_bind(until);
        }
    }
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_date_range_includes_end_day() {
        let range = DateRange::from_days(
            NaiveDate::from_ymd_opt(2025, 3, 1),
            NaiveDate::from_ymd_opt(2025, 3, 31),
        );
        assert_eq!(range.from.unwrap().to_rfc3339(), "2025-03-01T00:00:00+00:00");
        assert_eq!(range.until.unwrap().to_rfc3339(), "2025-04-01T00:00:00+00:00");
        assert!(!range.is_unbounded());
    }

    #[test]
    fn test_date_range_single_bound() {
        let range = DateRange::from_days(None, NaiveDate::from_ymd_opt(2025, 1, 9));
        assert!(range.from.is_none());
        assert_eq!(range.until.unwrap().to_rfc3339(), "2025-01-10T00:00:00+00:00");
        assert!(DateRange::default().is_unbounded());
    }
}
