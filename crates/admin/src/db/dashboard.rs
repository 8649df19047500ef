//! Dashboard figures.
//!
//! Raw rows come from SQL; the arithmetic that depends on the clock lives in
//! pure functions so it can be tested against a fixed `now`.

use chrono::{DateTime, Datelike, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use souq_core::{ProductId, ShippingStatus};

use super::{DateRange, RepositoryError};

/// Global counters shown in the stat cards.
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct DashboardCounts {
    pub products: i64,
    pub categories: i64,
    pub in_stock: i64,
    pub orders: i64,
    pub delivered: i64,
    pub pending: i64,
    pub shipped: i64,
    pub returned: i64,
    pub customers: i64,
    pub new_customers: i64,
    pub repeat_customers: i64,
}

/// A delivered order reduced to what revenue needs.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeliveredRevenue {
    pub created_at: DateTime<Utc>,
    pub cod_amount: Decimal,
    /// City shipping price, `0` when none is configured.
    pub shipping_price: Decimal,
}

/// Delivered totals of one calendar month.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MonthlyDelivered {
    pub year: i32,
    pub month: i32,
    pub revenue: Decimal,
    pub orders: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TopProduct {
    pub id: ProductId,
    pub name: String,
    pub image: String,
    pub total_sold: i64,
}

impl TopProduct {
    #[must_use]
    pub fn image_src(&self) -> String {
        souq_core::models::image_src(&self.image)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatusCount {
    pub shipping_status: ShippingStatus,
    pub count: i64,
}

/// Revenue figures over a set of delivered orders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevenueSummary {
    /// Sum of `max(0, cod - shipping)`.
    pub total: Decimal,
    pub shipping: Decimal,
    /// Part of `total` from the current calendar month.
    pub monthly: Decimal,
    /// Part of `total` from today.
    pub daily: Decimal,
}

/// Fold delivered orders into revenue figures relative to `now` (UTC).
#[must_use]
pub fn summarize(rows: &[DeliveredRevenue], now: DateTime<Utc>) -> RevenueSummary {
    let today = now.date_naive();
    rows.iter().fold(RevenueSummary::default(), |mut acc, row| {
        let revenue = (row.cod_amount - row.shipping_price).max(Decimal::ZERO);
        acc.total += revenue;
        acc.shipping += row.shipping_price;
        if row.created_at.year() == now.year() && row.created_at.month() == now.month() {
            acc.monthly += revenue;
        }
        if row.created_at.date_naive() == today {
            acc.daily += revenue;
        }
        acc
    })
}

/// Revenue per delivered order; `0` when nothing was delivered.
#[must_use]
pub fn average_order_value(total: Decimal, delivered: i64) -> Decimal {
    if delivered > 0 {
        (total / Decimal::from(delivered)).round_dp(2)
    } else {
        Decimal::ZERO
    }
}

/// One bar of the six-month chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartPoint {
    pub label: String,
    pub revenue: Decimal,
    pub orders: i64,
}

/// The six chart months, oldest first: `now - 30*i days` for `i = 5..=0`.
///
/// Steps are 30 days, so a month can appear twice and another be skipped.
#[must_use]
pub fn chart_months(now: DateTime<Utc>) -> Vec<(i32, u32, String)> {
    (0..6_i64)
        .rev()
        .map(|i| {
            let at = now - Duration::days(30 * i);
            (at.year(), at.month(), at.format("%B").to_string())
        })
        .collect()
}

/// Map monthly totals onto the chart months; absent months are zero.
#[must_use]
pub fn chart(now: DateTime<Utc>, months: &[MonthlyDelivered]) -> Vec<ChartPoint> {
    chart_months(now)
        .into_iter()
        .map(|(year, month, label)| {
            let found = months
                .iter()
                .find(|m| m.year == year && u32::try_from(m.month).is_ok_and(|m| m == month));
            ChartPoint {
                label,
                revenue: found.map_or(Decimal::ZERO, |m| m.revenue),
                orders: found.map_or(0, |m| m.orders),
            }
        })
        .collect()
}

/// Repository for dashboard aggregates.
pub struct DashboardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepository<'a> {
    /// Create a new dashboard repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Stat card counters. These ignore the dashboard date range.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn counts(&self) -> Result<DashboardCounts, RepositoryError> {
        let counts = sqlx::query_as::<_, DashboardCounts>(
            "SELECT \
                (SELECT COUNT(*) FROM products) AS products, \
                (SELECT COUNT(*) FROM categories) AS categories, \
                (SELECT COUNT(*) FROM products WHERE stock > 0) AS in_stock, \
                (SELECT COUNT(*) FROM orders) AS orders, \
                (SELECT COUNT(*) FROM orders WHERE shipping_status = 'delivered') AS delivered, \
                (SELECT COUNT(*) FROM orders WHERE shipping_status = 'pending') AS pending, \
                (SELECT COUNT(*) FROM orders WHERE shipping_status = 'shipped') AS shipped, \
                (SELECT COUNT(*) FROM orders WHERE shipping_status = 'returned') AS returned, \
                (SELECT COUNT(*) FROM guests) AS customers, \
                (SELECT COUNT(*) FROM guests WHERE created_at >= NOW() - INTERVAL '30 days') \
                    AS new_customers, \
                (SELECT COUNT(*) FROM (SELECT guest_id FROM orders GROUP BY guest_id \
                                       HAVING COUNT(*) > 1) r) AS repeat_customers",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(counts)
    }

    /// Delivered orders in `dates` with their city shipping price.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delivered_revenue(
        &self,
        dates: DateRange,
    ) -> Result<Vec<DeliveredRevenue>, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT o.created_at, o.cod_amount, COALESCE(s.price, 0) AS shipping_price \
             FROM orders o LEFT JOIN shipping_costs s ON s.city_id = o.city \
             WHERE o.shipping_status = 'delivered'",
        );
        dates.push_conditions(&mut qb, "o.created_at");
        let rows = qb
            .build_query_as::<DeliveredRevenue>()
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Delivered collected amount and order count per calendar month since
    /// `since`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn monthly_delivered(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<MonthlyDelivered>, RepositoryError> {
        let rows = sqlx::query_as::<_, MonthlyDelivered>(
            "SELECT EXTRACT(YEAR FROM created_at)::INT AS year, \
                    EXTRACT(MONTH FROM created_at)::INT AS month, \
                    COALESCE(SUM(cod_amount), 0) AS revenue, COUNT(*) AS orders \
             FROM orders \
             WHERE shipping_status = 'delivered' AND created_at >= date_trunc('month', $1::timestamptz) \
             GROUP BY 1, 2",
        )
        .bind(since)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Best sellers by delivered quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_products(&self, limit: i64) -> Result<Vec<TopProduct>, RepositoryError> {
        let rows = sqlx::query_as::<_, TopProduct>(
            "SELECT p.id, p.name, p.image, SUM(i.quantity)::BIGINT AS total_sold \
             FROM products p \
             JOIN order_items i ON i.product_id = p.id \
             JOIN orders o ON o.id = i.order_id \
             WHERE o.shipping_status = 'delivered' \
             GROUP BY p.id, p.name, p.image \
             ORDER BY total_sold DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Number of orders in each shipping status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn shipping_distribution(&self) -> Result<Vec<StatusCount>, RepositoryError> {
        let rows = sqlx::query_as::<_, StatusCount>(
            "SELECT shipping_status, COUNT(*) AS count FROM orders \
             GROUP BY shipping_status ORDER BY shipping_status",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn delivered(created_at: DateTime<Utc>, cod: i64, ship: i64) -> DeliveredRevenue {
        DeliveredRevenue {
            created_at,
            cod_amount: Decimal::from(cod),
            shipping_price: Decimal::from(ship),
        }
    }

    #[test]
    fn test_summarize_clamps_negative_revenue() {
        let now = at(2025, 6, 15);
        let rows = [
            delivered(at(2025, 6, 15), 500, 80),
            delivered(at(2025, 6, 2), 50, 80),
            delivered(at(2025, 5, 30), 300, 100),
        ];
        let summary = summarize(&rows, now);
        assert_eq!(summary.total, Decimal::from(620));
        assert_eq!(summary.shipping, Decimal::from(260));
        assert_eq!(summary.monthly, Decimal::from(420));
        assert_eq!(summary.daily, Decimal::from(420));
    }

    #[test]
    fn test_average_order_value() {
        assert_eq!(average_order_value(Decimal::from(620), 3), Decimal::new(20667, 2));
        assert_eq!(average_order_value(Decimal::from(620), 0), Decimal::ZERO);
    }

    #[test]
    fn test_chart_months_oldest_first() {
        let months = chart_months(at(2025, 6, 15));
        assert_eq!(months.len(), 6);
        assert_eq!(months.last().unwrap().2, "June");
        assert_eq!(months.first().unwrap().1, 1);
        assert_eq!(months.first().unwrap().2, "January");
    }

    #[test]
    fn test_chart_fills_missing_months_with_zero() {
        let points = chart(
            at(2025, 6, 15),
            &[MonthlyDelivered {
                year: 2025,
                month: 6,
                revenue: Decimal::from(900),
                orders: 3,
            }],
        );
        assert_eq!(points.last().unwrap().revenue, Decimal::from(900));
        assert_eq!(points.last().unwrap().orders, 3);
        assert_eq!(points.first().unwrap().orders, 0);
    }
}
