//! Order repository: placement, lookup and payment state.

use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;

use souq_core::models::{Order, OrderLine};
use souq_core::{GuestId, OrderId, PaymentMethod, PaymentStatus, ProductId, ShippingStatus};

use super::RepositoryError;

const ORDER_COLUMNS: &str = "id, guest_id, name, email, phone, address, status, city, zone_id, \
     district_id, business_reference, tracking_number, shipping_status, cod_amount, \
     payment_method, package_size, package_type, invoice_key, invoice_id, invoice_url, \
     payment_status, created_at";

/// Customer and delivery details for a new order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub guest_id: GuestId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    /// Courier city id.
    pub city: String,
    pub zone_id: String,
    pub district_id: String,
    pub cod_amount: Decimal,
    pub payment_method: PaymentMethod,
}

/// One product to put on a new order.
#[derive(Debug, Clone)]
pub struct LineRequest {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

/// Why an order could not be placed.
#[derive(Debug, Error)]
pub enum PlaceOrderError {
    /// Another order took the stock first.
    #[error("insufficient stock for {0}")]
    InsufficientStock(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for PlaceOrderError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create the order and its lines, take the stock and empty the cart.
    ///
    /// Runs in a single transaction: if any product no longer has enough
    /// stock nothing is written.
    ///
    /// # Errors
    ///
    /// Returns `PlaceOrderError::InsufficientStock` if a stock decrement fails.
    /// Returns `PlaceOrderError::Repository` if any statement fails.
    pub async fn place(
        &self,
        order: &NewOrder,
        lines: &[LineRequest],
    ) -> Result<Order, PlaceOrderError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO orders (guest_id, name, email, phone, address, city, zone_id, \
                                 district_id, cod_amount, payment_method) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {ORDER_COLUMNS}"
        );
        let created = sqlx::query_as::<_, Order>(&sql)
            .bind(order.guest_id)
            .bind(&order.name)
            .bind(&order.email)
            .bind(&order.phone)
            .bind(&order.address)
            .bind(&order.city)
            .bind(&order.zone_id)
            .bind(&order.district_id)
            .bind(order.cod_amount)
            .bind(order.payment_method)
            .fetch_one(&mut *tx)
            .await?;

        for line in lines {
            let taken = sqlx::query(
                "UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2",
            )
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
            if taken.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(PlaceOrderError::InsufficientStock(line.product_name.clone()));
            }

            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, product_name, unit_price, quantity) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(created.id)
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(line.unit_price)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM cart_items WHERE guest_id = $1")
            .bind(order.guest_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Most recent orders of a guest.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent_for_guest(
        &self,
        guest: GuestId,
        limit: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE guest_id = $1 ORDER BY id DESC LIMIT $2"
        );
        let rows = sqlx::query_as::<_, Order>(&sql)
            .bind(guest)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// The guest's latest order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn latest_for_guest(&self, guest: GuestId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.recent_for_guest(guest, 1).await?.into_iter().next())
    }

    /// Lines of an order, joined with the product image and category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, id: OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderLine>(
            "SELECT i.id, i.order_id, i.product_id, i.product_name, i.unit_price, i.quantity, \
                    p.image, c.name AS category_name \
             FROM order_items i \
             LEFT JOIN products p ON p.id = i.product_id \
             LEFT JOIN categories c ON c.id = p.category_id \
             WHERE i.order_id = $1 ORDER BY i.id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Find the order a payment gateway invoice belongs to.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_invoice_key(&self, key: &str) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE invoice_key = $1");
        let row = sqlx::query_as::<_, Order>(&sql)
            .bind(key)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Attach the gateway invoice to an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_invoice(
        &self,
        id: OrderId,
        invoice_key: &str,
        invoice_id: &str,
        invoice_url: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE orders SET invoice_key = $2, invoice_id = $3, invoice_url = $4 WHERE id = $1",
        )
        .bind(id)
        .bind(invoice_key)
        .bind(invoice_id)
        .bind(invoice_url)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Update the payment status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_payment_status(
        &self,
        id: OrderId,
        status: PaymentStatus,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE orders SET payment_status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Delete an order, putting its items back in stock unless the
    /// back-office already cancelled or returned it.
    ///
    /// Returns whether an order was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn delete_and_restock(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let status = sqlx::query_scalar::<_, ShippingStatus>(
            "SELECT shipping_status FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(status) = status else {
            tx.rollback().await?;
            return Ok(false);
        };

        if status.holds_stock() {
            sqlx::query(
                "UPDATE products p SET stock = p.stock + i.quantity \
                 FROM order_items i WHERE i.order_id = $1 AND i.product_id = p.id",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        let deleted = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(deleted.rows_affected() > 0)
    }
}
