//! Shipping geography: cities, zones, districts and per-city prices.

use rust_decimal::Decimal;
use sqlx::PgPool;

use souq_core::CityId;
use souq_core::models::City;

use super::{RepositoryError, unique_or_database};

/// A city row on the shipping page.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CityShipping {
    pub id: CityId,
    pub name: String,
    pub city_id: String,
    pub zones_count: i64,
    pub districts_count: i64,
    pub price: Option<Decimal>,
}

/// Average price over the cities that have one.
#[must_use]
pub fn average_price(rows: &[CityShipping]) -> Decimal {
    let prices: Vec<Decimal> = rows.iter().filter_map(|r| r.price).collect();
    if prices.is_empty() {
        return Decimal::ZERO;
    }
    let total: Decimal = prices.iter().sum();
    (total / Decimal::from(prices.len())).round_dp(2)
}

/// Repository for cities and their shipping data.
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
            "SELECT id, name, city_id, created_at FROM cities ORDER BY name",
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

    /// Shipping price configured for a city, if any.
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

    /// Set the shipping price of a city, creating the row when missing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails (including
    /// an unknown city).
    pub async fn upsert_shipping_price(
        &self,
        city_id: &str,
        price: Decimal,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO shipping_costs (city_id, price) VALUES ($1, $2) \
             ON CONFLICT (city_id) DO UPDATE SET price = EXCLUDED.price",
        )
        .bind(city_id)
        .bind(price)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Give every city without a shipping price the default one.
    ///
    /// Returns the number of rows created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn ensure_shipping_costs(&self, default_price: Decimal) -> Result<u64, RepositoryError> {
        let inserted = sqlx::query(
            "INSERT INTO shipping_costs (city_id, price) \
             SELECT c.city_id, $1 FROM cities c \
             WHERE NOT EXISTS (SELECT 1 FROM shipping_costs s WHERE s.city_id = c.city_id)",
        )
        .bind(default_price)
        .execute(self.pool)
        .await?;
        Ok(inserted.rows_affected())
    }

    /// Cities with their zone and district counts and price, by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn shipping_overview(&self) -> Result<Vec<CityShipping>, RepositoryError> {
        let rows = sqlx::query_as::<_, CityShipping>(
            "SELECT c.id, c.name, c.city_id, \
                    (SELECT COUNT(*) FROM zones z WHERE z.city_id = c.city_id) AS zones_count, \
                    (SELECT COUNT(*) FROM districts d WHERE d.city_id = c.city_id) AS districts_count, \
                    s.price \
             FROM cities c LEFT JOIN shipping_costs s ON s.city_id = c.city_id \
             ORDER BY c.name",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Total number of zones across all cities.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn zones_count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM zones")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Total number of districts across all cities.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn districts_count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM districts")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Create a city together with its shipping price.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the courier id is taken.
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn create_city(
        &self,
        name: &str,
        city_id: &str,
        price: Decimal,
    ) -> Result<City, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let city = sqlx::query_as::<_, City>(
            "INSERT INTO cities (name, city_id) VALUES ($1, $2) \
             RETURNING id, name, city_id, created_at",
        )
        .bind(name)
        .bind(city_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_or_database(e, "city id"))?;

        sqlx::query("INSERT INTO shipping_costs (city_id, price) VALUES ($1, $2)")
            .bind(city_id)
            .bind(price)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(city)
    }

    /// Delete a city with its shipping price, zones and districts.
    ///
    /// Returns the deleted city, or `None` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn delete_city(&self, id: CityId) -> Result<Option<City>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let city = sqlx::query_as::<_, City>(
            "SELECT id, name, city_id, created_at FROM cities WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(city) = city else {
            tx.rollback().await?;
            return Ok(None);
        };

        for table in ["shipping_costs", "zones", "districts"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE city_id = $1"))
                .bind(&city.city_id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM cities WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(city))
    }

    // =========================================================================
    // Courier sync
    // =========================================================================

    /// Insert or rename a city by courier id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn upsert_city(&self, city_id: &str, name: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO cities (name, city_id) VALUES ($1, $2) \
             ON CONFLICT (city_id) DO UPDATE SET name = EXCLUDED.name",
        )
        .bind(name)
        .bind(city_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Insert or rename a zone of a city.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn upsert_zone(
        &self,
        city_id: &str,
        zone_id: &str,
        name: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO zones (name, city_id, zone_id) VALUES ($1, $2, $3) \
             ON CONFLICT (city_id, zone_id) DO UPDATE SET name = EXCLUDED.name",
        )
        .bind(name)
        .bind(city_id)
        .bind(zone_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Insert or rename a district of a city.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn upsert_district(
        &self,
        city_id: &str,
        district_id: &str,
        name: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO districts (name, city_id, district_id) VALUES ($1, $2, $3) \
             ON CONFLICT (city_id, district_id) DO UPDATE SET name = EXCLUDED.name",
        )
        .bind(name)
        .bind(city_id)
        .bind(district_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(price: Option<i64>) -> CityShipping {
        CityShipping {
            id: CityId::new(1),
            name: "القاهره".to_owned(),
            city_id: "c1".to_owned(),
            zones_count: 0,
            districts_count: 0,
            price: price.map(Decimal::from),
        }
    }

    #[test]
    fn test_average_price_skips_cities_without_price() {
        let rows = [row(Some(80)), row(None), row(Some(100))];
        assert_eq!(average_price(&rows), Decimal::from(90));
    }

    #[test]
    fn test_average_price_empty() {
        assert_eq!(average_price(&[row(None)]), Decimal::ZERO);
    }
}
