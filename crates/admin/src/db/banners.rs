//! Home page hero slides.

use sqlx::PgPool;

use souq_core::BannerId;
use souq_core::models::BannerSlide;

use super::RepositoryError;

const BANNER_COLUMNS: &str = "id, image_url, title, subtitle, description, link_url, \
     highlight_regular_price, highlight_sale_price, highlight_discount, sort_order, is_active, \
     created_at";

/// Fields of a slide being created or edited.
#[derive(Debug, Clone, Default)]
pub struct BannerInput {
    pub image_url: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub link_url: Option<String>,
    pub highlight_regular_price: Option<String>,
    pub highlight_sale_price: Option<String>,
    pub highlight_discount: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
}

/// Repository for banner slides.
pub struct BannerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BannerRepository<'a> {
    /// Create a new banner repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All slides in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<BannerSlide>, RepositoryError> {
        let sql = format!("SELECT {BANNER_COLUMNS} FROM banner_slides ORDER BY sort_order, id");
        let rows = sqlx::query_as::<_, BannerSlide>(&sql)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Get one slide.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: BannerId) -> Result<Option<BannerSlide>, RepositoryError> {
        let sql = format!("SELECT {BANNER_COLUMNS} FROM banner_slides WHERE id = $1");
        let row = sqlx::query_as::<_, BannerSlide>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Insert a slide.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, input: &BannerInput) -> Result<BannerSlide, RepositoryError> {
        let sql = format!(
            "INSERT INTO banner_slides (image_url, title, subtitle, description, link_url, \
                 highlight_regular_price, highlight_sale_price, highlight_discount, sort_order, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {BANNER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, BannerSlide>(&sql)
            .bind(&input.image_url)
            .bind(input.title.as_deref())
            .bind(input.subtitle.as_deref())
            .bind(input.description.as_deref())
            .bind(input.link_url.as_deref())
            .bind(input.highlight_regular_price.as_deref())
            .bind(input.highlight_sale_price.as_deref())
            .bind(input.highlight_discount.as_deref())
            .bind(input.sort_order)
            .bind(input.is_active)
            .fetch_one(self.pool)
            .await?;
        Ok(row)
    }

    /// Replace every field of a slide.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the slide does not exist.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(&self, id: BannerId, input: &BannerInput) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE banner_slides SET image_url = $2, title = $3, subtitle = $4, description = $5, \
                 link_url = $6, highlight_regular_price = $7, highlight_sale_price = $8, \
                 highlight_discount = $9, sort_order = $10, is_active = $11 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&input.image_url)
        .bind(input.title.as_deref())
        .bind(input.subtitle.as_deref())
        .bind(input.description.as_deref())
        .bind(input.link_url.as_deref())
        .bind(input.highlight_regular_price.as_deref())
        .bind(input.highlight_sale_price.as_deref())
        .bind(input.highlight_discount.as_deref())
        .bind(input.sort_order)
        .bind(input.is_active)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a slide. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: BannerId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM banner_slides WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flip `is_active`. Returns the new value, or `None` if the slide is gone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn toggle(&self, id: BannerId) -> Result<Option<bool>, RepositoryError> {
        let active = sqlx::query_scalar::<_, bool>(
            "UPDATE banner_slides SET is_active = NOT is_active WHERE id = $1 RETURNING is_active",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(active)
    }
}
