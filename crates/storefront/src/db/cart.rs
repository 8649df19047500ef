//! Cart repository.
//!
//! Every statement that touches a single line is scoped by `guest_id`, so a
//! shopper can never read or modify another guest's cart.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use souq_core::models::{CartItem, CartLine};
use souq_core::{CartItemId, GuestId, ProductId};

use super::RepositoryError;

const LINE_SELECT: &str = "SELECT c.id, c.guest_id, c.product_id, c.quantity, c.created_at, \
            p.name, p.price, p.discount, p.stock, p.image \
     FROM cart_items c JOIN products p ON p.id = c.product_id";

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All lines of a guest's cart, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, guest: GuestId) -> Result<Vec<CartLine>, RepositoryError> {
        let sql = format!("{LINE_SELECT} WHERE c.guest_id = $1 ORDER BY c.id");
        let rows = sqlx::query_as::<_, CartLine>(&sql)
            .bind(guest)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// One line of the guest's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn line(
        &self,
        guest: GuestId,
        item: CartItemId,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let sql = format!("{LINE_SELECT} WHERE c.guest_id = $1 AND c.id = $2");
        let row = sqlx::query_as::<_, CartLine>(&sql)
            .bind(guest)
            .bind(item)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Number of lines in the guest's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self, guest: GuestId) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE guest_id = $1")
            .bind(guest)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Product ids currently in the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product_ids(&self, guest: GuestId) -> Result<Vec<ProductId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, ProductId>(
            "SELECT product_id FROM cart_items WHERE guest_id = $1",
        )
        .bind(guest)
        .fetch_all(self.pool)
        .await?;
        Ok(ids)
    }

    /// Existing line for a product, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_item(
        &self,
        guest: GuestId,
        product: ProductId,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let row = sqlx::query_as::<_, CartItem>(
            "SELECT id, guest_id, product_id, quantity, created_at FROM cart_items \
             WHERE guest_id = $1 AND product_id = $2",
        )
        .bind(guest)
        .bind(product)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Insert a line, or set the quantity of the existing one.
    ///
    /// Either way the line's `created_at` restarts, which postpones its expiry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert(
        &self,
        guest: GuestId,
        product: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO cart_items (guest_id, product_id, quantity) VALUES ($1, $2, $3) \
             ON CONFLICT (guest_id, product_id) \
             DO UPDATE SET quantity = EXCLUDED.quantity, created_at = NOW()",
        )
        .bind(guest)
        .bind(product)
        .bind(quantity)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Set the quantity of one of the guest's lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not in this cart.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_quantity(
        &self,
        guest: GuestId,
        item: CartItemId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE cart_items SET quantity = $3 WHERE guest_id = $1 AND id = $2")
                .bind(guest)
                .bind(item)
                .bind(quantity)
                .execute(self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove one of the guest's lines. Returns whether a line was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn remove(&self, guest: GuestId, item: CartItemId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE guest_id = $1 AND id = $2")
            .bind(guest)
            .bind(item)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Empty the guest's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear(&self, guest: GuestId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_items WHERE guest_id = $1")
            .bind(guest)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Delete lines of every cart added before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE created_at < $1")
            .bind(cutoff)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
