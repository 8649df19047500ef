//! Product repository for catalog management.

use rust_decimal::Decimal;
use sqlx::PgPool;

use souq_core::models::{Product, ProductImage};
use souq_core::{CategoryId, ProductId, ProductImageId};

use super::RepositoryError;

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, discount, stock, image, views, category_id, created_at";

/// Fields of a product being created.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub discount: Decimal,
    pub stock: i32,
    pub image: String,
    pub category_id: CategoryId,
}

/// Fields of a product being edited. `image: None` keeps the current image.
#[derive(Debug, Clone)]
pub struct ProductUpdate {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub discount: Decimal,
    pub stock: i32,
    pub category_id: CategoryId,
    pub image: Option<String>,
}

/// Repository for product operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Products that can still be added to orders, by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn in_stock(&self) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE stock > 0 ORDER BY name");
        let rows = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let sql = format!(
            "INSERT INTO products (name, description, price, discount, stock, image, category_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Product>(&sql)
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price)
            .bind(product.discount)
            .bind(product.stock)
            .bind(&product.image)
            .bind(product.category_id)
            .fetch_one(self.pool)
            .await?;
        Ok(row)
    }

    /// Apply an edit.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(&self, id: ProductId, update: &ProductUpdate) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE products SET name = $2, description = $3, price = $4, discount = $5, \
                                 stock = $6, category_id = $7, image = COALESCE($8, image) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.description)
        .bind(update.price)
        .bind(update.discount)
        .bind(update.stock)
        .bind(update.category_id)
        .bind(update.image.as_deref())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a product with its gallery and attributes.
    ///
    /// Order lines keep their snapshot and lose the product link.
    ///
    /// Returns whether a product was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM product_images WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM product_attributes WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(deleted.rows_affected() > 0)
    }

    /// Total number of products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Gallery
    // =========================================================================

    /// Gallery images of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn images(&self, product: ProductId) -> Result<Vec<ProductImage>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductImage>(
            "SELECT id, product_id, image, created_at FROM product_images \
             WHERE product_id = $1 ORDER BY id",
        )
        .bind(product)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Get one gallery image.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn image(&self, id: ProductImageId) -> Result<Option<ProductImage>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductImage>(
            "SELECT id, product_id, image, created_at FROM product_images WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Append a gallery image.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn add_image(&self, product: ProductId, image: &str) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO product_images (product_id, image) VALUES ($1, $2)")
            .bind(product)
            .bind(image)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Remove a gallery image row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_image(&self, id: ProductImageId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM product_images WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
