//! Staging records for products scraped from other retailers.

use sqlx::PgPool;

use souq_core::models::DropshipProduct;
use souq_core::{DropshipProductId, DropshipStatus, ProductId};

use super::RepositoryError;
use crate::services::scraper::ScrapedProduct;

const DROPSHIP_COLUMNS: &str = "id, source_url, source_site, name, price, description, image_url, \
     additional_images, status, imported_product_id, error_message, created_at";

/// Whether an earlier record for the same URL may be replaced by a new scrape.
///
/// Failed scrapes and imports whose product was since deleted are stale.
#[must_use]
pub fn is_stale(record: &DropshipProduct) -> bool {
    match record.status {
        DropshipStatus::Error => true,
        DropshipStatus::Imported => record.imported_product_id.is_none(),
        DropshipStatus::Pending => false,
    }
}

/// Repository for dropshipping records.
pub struct DropshipRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DropshipRepository<'a> {
    /// Create a new dropshipping repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All records, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<DropshipProduct>, RepositoryError> {
        let sql = format!(
            "SELECT {DROPSHIP_COLUMNS} FROM dropship_products ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, DropshipProduct>(&sql)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Get a record by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: DropshipProductId) -> Result<Option<DropshipProduct>, RepositoryError> {
        let sql = format!("SELECT {DROPSHIP_COLUMNS} FROM dropship_products WHERE id = $1");
        let row = sqlx::query_as::<_, DropshipProduct>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Most recent record for a source URL.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_source_url(
        &self,
        url: &str,
    ) -> Result<Option<DropshipProduct>, RepositoryError> {
        let sql = format!(
            "SELECT {DROPSHIP_COLUMNS} FROM dropship_products WHERE source_url = $1 \
             ORDER BY id DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, DropshipProduct>(&sql)
            .bind(url)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Store a successful scrape as a pending record.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_pending(
        &self,
        url: &str,
        scraped: &ScrapedProduct,
    ) -> Result<DropshipProduct, RepositoryError> {
        let sql = format!(
            "INSERT INTO dropship_products \
                 (source_url, source_site, name, price, description, image_url, additional_images, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending') RETURNING {DROPSHIP_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DropshipProduct>(&sql)
            .bind(url)
            .bind(&scraped.source_site)
            .bind(&scraped.name)
            .bind(scraped.price)
            .bind(&scraped.description)
            .bind(scraped.image_url.as_deref())
            .bind(serde_json::json!(scraped.additional_images))
            .fetch_one(self.pool)
            .await?;
        Ok(row)
    }

    /// Store a failed scrape so the attempt stays visible.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_error(
        &self,
        url: &str,
        source_site: Option<&str>,
        message: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO dropship_products (source_url, source_site, status, error_message) \
             VALUES ($1, $2, 'error', $3)",
        )
        .bind(url)
        .bind(source_site)
        .bind(message)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Link a record to the product created from it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_imported(
        &self,
        id: DropshipProductId,
        product: ProductId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE dropship_products SET status = 'imported', imported_product_id = $2, \
                                          error_message = NULL \
             WHERE id = $1",
        )
        .bind(id)
        .bind(product)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Delete a record.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: DropshipProductId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM dropship_products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn record(status: DropshipStatus, product: Option<i32>) -> DropshipProduct {
        DropshipProduct {
            id: DropshipProductId::new(1),
            source_url: "https://www.noon.com/p".to_owned(),
            source_site: Some("noon.com".to_owned()),
            name: None,
            price: None,
            description: None,
            image_url: None,
            additional_images: serde_json::json!([]),
            status,
            imported_product_id: product.map(ProductId::new),
            error_message: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_stale_records_can_be_replaced() {
        assert!(is_stale(&record(DropshipStatus::Error, None)));
        assert!(is_stale(&record(DropshipStatus::Imported, None)));
    }

    #[test]
    fn test_live_records_block_rescrape() {
        assert!(!is_stale(&record(DropshipStatus::Imported, Some(4))));
        assert!(!is_stale(&record(DropshipStatus::Pending, None)));
    }
}
