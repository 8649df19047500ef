//! Delivery geography: courier cities, zones, districts and shipping prices.
//!
//! Zones, districts and prices are keyed by the courier's city identifier
//! (`cities.city_id`), not by our row id.

use rust_decimal::Decimal;
use sqlx::PgPool;

use souq_core::models::{City, District, Zone};

use super::RepositoryError;

/// Repository for geography reads.
pub struct GeographyRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> GeographyRepository<'a> {
    /// Create a new geography repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All cities by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn cities(&self) -> Result<Vec<City>, RepositoryError> {
        let rows = sqlx::query_as::<_, City>(
            "SELECT id, name, city_id, created_at FROM cities ORDER BY name, id",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Find a city by its courier identifier.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn city(&self, city_id: &str) -> Result<Option<City>, RepositoryError> {
        let row = sqlx::query_as::<_, City>(
            "SELECT id, name, city_id, created_at FROM cities WHERE city_id = $1",
        )
        .bind(city_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Every zone, for building the nested city list in one pass.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn all_zones(&self) -> Result<Vec<Zone>, RepositoryError> {
        let rows = sqlx::query_as::<_, Zone>(
            "SELECT id, name, city_id, zone_id FROM zones ORDER BY name, id",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Every district.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn all_districts(&self) -> Result<Vec<District>, RepositoryError> {
        let rows = sqlx::query_as::<_, District>(
            "SELECT id, name, city_id, district_id FROM districts ORDER BY name, id",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Zones of a city.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn zones(&self, city_id: &str) -> Result<Vec<Zone>, RepositoryError> {
        let rows = sqlx::query_as::<_, Zone>(
            "SELECT id, name, city_id, zone_id FROM zones WHERE city_id = $1 ORDER BY name, id",
        )
        .bind(city_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Districts of a city.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn districts(&self, city_id: &str) -> Result<Vec<District>, RepositoryError> {
        let rows = sqlx::query_as::<_, District>(
            "SELECT id, name, city_id, district_id FROM districts \
             WHERE city_id = $1 ORDER BY name, id",
        )
        .bind(city_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Configured delivery price of a city.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn shipping_price(&self, city_id: &str) -> Result<Option<Decimal>, RepositoryError> {
        let price = sqlx::query_scalar::<_, Decimal>(
            "SELECT price FROM shipping_costs WHERE city_id = $1",
        )
        .bind(city_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(price)
    }
}
