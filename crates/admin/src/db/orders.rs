//! Order repository: listing, editing, shipping state and exports.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use thiserror::Error;

use souq_core::models::{Order, OrderItem, OrderLine, Product};
use souq_core::{
    OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus, ShippingStatus, StockMove,
};

use super::{DateRange, RepositoryError};

const ORDER_COLUMNS: &str = "o.id, o.guest_id, o.name, o.email, o.phone, o.address, o.status, \
     o.city, o.zone_id, o.district_id, o.business_reference, o.tracking_number, \
     o.shipping_status, o.cod_amount, o.payment_method, o.package_size, o.package_type, \
     o.invoice_key, o.invoice_id, o.invoice_url, o.payment_status, o.created_at";

/// Lock an order row and read its shipping status.
async fn lock_shipping_status(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<ShippingStatus>, sqlx::Error> {
    sqlx::query_scalar::<_, ShippingStatus>(
        "SELECT shipping_status FROM orders WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Apply `movement` to every line of an order.
async fn move_order_stock(
    conn: &mut PgConnection,
    id: OrderId,
    movement: StockMove,
) -> Result<(), sqlx::Error> {
    let sql = match movement {
        StockMove::Restore => {
            "UPDATE products p SET stock = p.stock + i.quantity \
             FROM order_items i WHERE i.order_id = $1 AND i.product_id = p.id"
        }
        StockMove::Take => {
            "UPDATE products p SET stock = GREATEST(p.stock - i.quantity, 0) \
             FROM order_items i WHERE i.order_id = $1 AND i.product_id = p.id"
        }
        StockMove::Keep => return Ok(()),
    };
    sqlx::query(sql).bind(id).execute(conn).await?;
    Ok(())
}

/// Order list filters. Unset fields do not restrict.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Name or phone substring, or an exact order id.
    pub search: Option<String>,
    pub status: Option<OrderStatus>,
    pub payment: Option<PaymentMethod>,
    pub shipping: Option<ShippingStatus>,
    pub dates: DateRange,
}

impl OrderFilter {
    fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if let Some(search) = &self.search {
            let pattern = format!("%{search}%");
            let id = search.trim().parse::<i32>().unwrap_or(0);
            qb.push(" AND (o.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR o.phone ILIKE ")
                .push_bind(pattern)
                .push(" OR o.id = ")
                .push_bind(id)
                .push(")");
        }
        if let Some(status) = self.status {
            qb.push(" AND o.status = ").push_bind(status);
        }
        if let Some(payment) = self.payment {
            qb.push(" AND o.payment_method = ").push_bind(payment);
        }
        if let Some(shipping) = self.shipping {
            qb.push(" AND o.shipping_status = ").push_bind(shipping);
        }
        self.dates.push_conditions(qb, "o.created_at");
    }
}

/// An order row in the back-office list.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderSummary {
    #[sqlx(flatten)]
    pub order: Order,
    pub city_name: Option<String>,
    pub items_count: i64,
}

impl OrderSummary {
    /// City name, or "unknown" when the courier city is not on file.
    #[must_use]
    pub fn city_label(&self) -> &str {
        self.city_name.as_deref().unwrap_or("غير معروف")
    }
}

/// One row of the courier spreadsheet.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ExportRow {
    pub name: String,
    pub phone: String,
    pub city_name: Option<String>,
    pub zone_id: String,
    pub address: String,
    pub cod_amount: Decimal,
    pub pieces: i64,
    pub description: String,
    pub business_reference: Option<String>,
}

/// A delivered or returned order for the income report.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IncomeRow {
    pub name: String,
    pub phone: String,
    pub shipping_status: ShippingStatus,
    pub cod_amount: Decimal,
    pub shipping_price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Units of a product sold in delivered orders.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IncomeProductRow {
    pub name: String,
    pub quantity: i64,
    /// List price at report time.
    pub price: Decimal,
}

/// Why a product could not be added to an order.
#[derive(Debug, Error)]
pub enum AddItemError {
    #[error("insufficient stock")]
    InsufficientStock,

    #[error("order not found")]
    OrderNotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for AddItemError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Repository for back-office order operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of orders matching `filter`, newest id first, and the
    /// number of matching orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: &OrderFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<OrderSummary>, i64), RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders o WHERE TRUE");
        filter.push_conditions(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ORDER_COLUMNS}, c.name AS city_name, \
                    (SELECT COUNT(*) FROM order_items i WHERE i.order_id = o.id) AS items_count \
             FROM orders o LEFT JOIN cities c ON c.city_id = o.city WHERE TRUE"
        ));
        filter.push_conditions(&mut qb);
        qb.push(" ORDER BY o.id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = qb.build_query_as::<OrderSummary>().fetch_all(self.pool).await?;

        Ok((rows, total))
    }

    /// Latest orders by creation time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent(&self, limit: i64) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders o ORDER BY o.created_at DESC LIMIT $1");
        let rows = sqlx::query_as::<_, Order>(&sql)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1");
        let row = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Lines of an order with product image and category.
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

    // =========================================================================
    // Line edits
    // =========================================================================

    /// Add `quantity` of `product` to an order at its current sale price.
    ///
    /// An existing line for the same product is increased instead of adding
    /// a second one. Stock and the collected amount move with the line.
    ///
    /// # Errors
    ///
    /// Returns `AddItemError::InsufficientStock` if the product has fewer
    /// units left, `OrderNotFound` if the order is gone, `Repository` if a
    /// statement fails.
    pub async fn add_item(
        &self,
        order: OrderId,
        product: &Product,
        quantity: i32,
    ) -> Result<(), AddItemError> {
        let unit_price = product.sale_price().round_dp(2);
        let mut tx = self.pool.begin().await?;

        let taken = sqlx::query("UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2")
            .bind(product.id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
        if taken.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AddItemError::InsufficientStock);
        }

        let merged = sqlx::query(
            "UPDATE order_items SET quantity = quantity + $3 \
             WHERE id = (SELECT id FROM order_items WHERE order_id = $1 AND product_id = $2 \
                         ORDER BY id LIMIT 1)",
        )
        .bind(order)
        .bind(product.id)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;
        if merged.rows_affected() == 0 {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, product_name, unit_price, quantity) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(order)
            .bind(product.id)
            .bind(&product.name)
            .bind(unit_price)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
        }

        let updated = sqlx::query("UPDATE orders SET cod_amount = cod_amount + $2 WHERE id = $1")
            .bind(order)
            .bind(unit_price * Decimal::from(quantity))
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AddItemError::OrderNotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Remove a line from an order and take its total off the collected
    /// amount. Its stock is restored unless the order was already restocked.
    ///
    /// Returns the removed line, or `None` if it does not belong to `order`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn remove_item(
        &self,
        order: OrderId,
        item: OrderItemId,
    ) -> Result<Option<OrderItem>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Some(status) = lock_shipping_status(&mut tx, order).await? else {
            tx.rollback().await?;
            return Ok(None);
        };

        let removed = sqlx::query_as::<_, OrderItem>(
            "DELETE FROM order_items WHERE id = $1 AND order_id = $2 \
             RETURNING id, order_id, product_id, product_name, unit_price, quantity, created_at",
        )
        .bind(item)
        .bind(order)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(removed) = removed else {
            tx.rollback().await?;
            return Ok(None);
        };

        if let Some(product) = removed.product_id.filter(|_| status.holds_stock()) {
            sqlx::query("UPDATE products SET stock = stock + $2 WHERE id = $1")
                .bind(product)
                .bind(removed.quantity)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("UPDATE orders SET cod_amount = GREATEST(cod_amount - $2, 0) WHERE id = $1")
            .bind(order)
            .bind(removed.unit_price * Decimal::from(removed.quantity))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(removed))
    }

    // =========================================================================
    // State changes
    // =========================================================================

    /// Move an order to a new shipping status.
    ///
    /// Entering a restocked state (cancelled, returned) puts the items back
    /// on the shelf; leaving one takes them again. Moving between two
    /// restocked states does not touch stock.
    ///
    /// Returns the previous status, or `None` if the order does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn set_shipping_status(
        &self,
        id: OrderId,
        status: ShippingStatus,
    ) -> Result<Option<ShippingStatus>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Some(previous) = lock_shipping_status(&mut tx, id).await? else {
            tx.rollback().await?;
            return Ok(None);
        };

        move_order_stock(&mut tx, id, previous.stock_move(status)).await?;

        sqlx::query("UPDATE orders SET shipping_status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(previous))
    }

    /// Mark an order shipped with its courier identifiers.
    ///
    /// An order coming back from a restocked state takes its items out of
    /// stock again.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn mark_shipped(
        &self,
        id: OrderId,
        tracking_number: &str,
        business_reference: &str,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Some(previous) = lock_shipping_status(&mut tx, id).await? else {
            tx.rollback().await?;
            return Err(RepositoryError::NotFound);
        };

        move_order_stock(&mut tx, id, previous.stock_move(ShippingStatus::Shipped)).await?;

        sqlx::query(
            "UPDATE orders SET shipping_status = 'shipped', tracking_number = $2, \
                               business_reference = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(tracking_number)
        .bind(business_reference)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Overwrite the collected amount.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_cod_amount(&self, id: OrderId, amount: Decimal) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE orders SET cod_amount = $2 WHERE id = $1")
            .bind(id)
            .bind(amount)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Update the order status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Update the payment method.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_payment_method(
        &self,
        id: OrderId,
        method: PaymentMethod,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE orders SET payment_method = $2 WHERE id = $1")
            .bind(id)
            .bind(method)
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

    /// Delete an order, putting its items back in stock unless a cancel or
    /// return already did.
    ///
    /// Returns whether an order was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn delete_and_restock(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Some(status) = lock_shipping_status(&mut tx, id).await? else {
            tx.rollback().await?;
            return Ok(false);
        };
        if status.holds_stock() {
            move_order_stock(&mut tx, id, StockMove::Restore).await?;
        }

        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(deleted.rows_affected() > 0)
    }

    // =========================================================================
    // Exports
    // =========================================================================

    /// Courier spreadsheet rows, newest id first. `ids: None` exports all.
    ///
    /// Piece counts and descriptions only cover lines whose product still
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn export_rows(&self, ids: Option<&[OrderId]>) -> Result<Vec<ExportRow>, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT o.name, o.phone, c.name AS city_name, o.zone_id, o.address, o.cod_amount, \
                    COALESCE((SELECT SUM(i.quantity) FROM order_items i \
                              JOIN products p ON p.id = i.product_id \
                              WHERE i.order_id = o.id), 0)::BIGINT AS pieces, \
                    COALESCE((SELECT string_agg(p.name, ', ' ORDER BY i.id) FROM order_items i \
                              JOIN products p ON p.id = i.product_id \
                              WHERE i.order_id = o.id), '') AS description, \
                    o.business_reference \
             FROM orders o LEFT JOIN cities c ON c.city_id = o.city WHERE TRUE",
        );
        if let Some(ids) = ids {
            let ids: Vec<i32> = ids.iter().map(OrderId::as_i32).collect();
            qb.push(" AND o.id = ANY(").push_bind(ids).push(")");
        }
        qb.push(" ORDER BY o.id DESC");
        let rows = qb.build_query_as::<ExportRow>().fetch_all(self.pool).await?;
        Ok(rows)
    }

    /// Delivered and returned orders in `dates`, with their city's shipping
    /// price (`0` when none is configured), oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn income_rows(&self, dates: DateRange) -> Result<Vec<IncomeRow>, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT o.name, o.phone, o.shipping_status, o.cod_amount, \
                    COALESCE(s.price, 0) AS shipping_price, o.created_at \
             FROM orders o LEFT JOIN shipping_costs s ON s.city_id = o.city \
             WHERE o.shipping_status IN ('delivered', 'returned')",
        );
        dates.push_conditions(&mut qb, "o.created_at");
        qb.push(" ORDER BY o.id");
        let rows = qb.build_query_as::<IncomeRow>().fetch_all(self.pool).await?;
        Ok(rows)
    }

    /// Units sold per product across delivered orders in `dates`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn income_products(
        &self,
        dates: DateRange,
    ) -> Result<Vec<IncomeProductRow>, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT p.name, SUM(i.quantity)::BIGINT AS quantity, p.price \
             FROM order_items i \
             JOIN products p ON p.id = i.product_id \
             JOIN orders o ON o.id = i.order_id \
             WHERE o.shipping_status = 'delivered'",
        );
        dates.push_conditions(&mut qb, "o.created_at");
        qb.push(" GROUP BY p.id, p.name, p.price ORDER BY MIN(o.id)");
        let rows = qb
            .build_query_as::<IncomeProductRow>()
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sql_for(filter: &OrderFilter) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM orders o WHERE TRUE");
        filter.push_conditions(&mut qb);
        qb.sql().to_owned()
    }

    #[test]
    fn test_empty_filter_adds_nothing() {
        assert_eq!(
            sql_for(&OrderFilter::default()),
            "SELECT 1 FROM orders o WHERE TRUE"
        );
    }

    #[test]
    fn test_filter_binds_each_condition() {
        let filter = OrderFilter {
            search: Some("010".to_owned()),
            status: Some(OrderStatus::Pending),
            payment: Some(PaymentMethod::Visa),
            shipping: Some(ShippingStatus::Shipped),
            dates: DateRange::from_days(chrono::NaiveDate::from_ymd_opt(2025, 1, 1), None),
        };
        let sql = sql_for(&filter);
        assert!(sql.contains("o.name ILIKE $1 OR o.phone ILIKE $2 OR o.id = $3"));
        assert!(sql.contains("o.status = $4"));
        assert!(sql.contains("o.payment_method = $5"));
        assert!(sql.contains("o.shipping_status = $6"));
        assert!(sql.contains("o.created_at >= $7"));
        assert!(!sql.contains("o.created_at <"));
    }
}
