//! Category repository.

use sqlx::PgPool;

use souq_core::CategoryId;
use souq_core::models::Category;

use super::{RepositoryError, unique_or_database};

const CATEGORY_COLUMNS: &str = "id, name, description, created_at";

/// Name of the category that must always exist.
pub const DEFAULT_CATEGORY_NAME: &str = "عام";
const DEFAULT_CATEGORY_DESCRIPTION: &str = "تصنيف عام";

/// Repository for category operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All categories, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query_as::<_, Category>(&sql)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Get a category by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        let row = sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, name: &str, description: &str) -> Result<Category, RepositoryError> {
        let sql = format!(
            "INSERT INTO categories (name, description) VALUES ($1, $2) RETURNING {CATEGORY_COLUMNS}"
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(name)
            .bind(description)
            .fetch_one(self.pool)
            .await
            .map_err(|e| unique_or_database(e, "category name"))
    }

    /// Rename and/or redescribe a category. `None` leaves a field unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the new name is taken.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(
        &self,
        id: CategoryId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE categories SET name = COALESCE($2, name), \
                                   description = COALESCE($3, description) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .execute(self.pool)
        .await
        .map_err(|e| unique_or_database(e, "category name"))?;
        Ok(())
    }

    /// Number of products filed under a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product_count(&self, id: CategoryId) -> Result<i64, RepositoryError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products WHERE category_id = $1")
                .bind(id)
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }

    /// Delete a category. Callers check that it is empty first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Total number of categories.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM categories")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Create the general category if it is missing.
    ///
    /// Returns whether a row was inserted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn ensure_default(&self) -> Result<bool, RepositoryError> {
        let inserted = sqlx::query(
            "INSERT INTO categories (name, description) VALUES ($1, $2) \
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(DEFAULT_CATEGORY_NAME)
        .bind(DEFAULT_CATEGORY_DESCRIPTION)
        .execute(self.pool)
        .await?;
        Ok(inserted.rows_affected() > 0)
    }
}
