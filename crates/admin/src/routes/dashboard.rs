//! Dashboard route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use souq_core::models::Order;
use souq_core::time_ago::time_ago;

use crate::db::{
    ChartPoint, DashboardCounts, DashboardRepository, DateRange, OrderRepository,
    RevenueSummary, StatusCount, TopProduct, dashboard,
};
use crate::error::Result;
use crate::filters;
use crate::flash::{self, FlashKind};
use crate::middleware::RequireAdminAuth;
use crate::page::AdminPage;
use crate::routes::parse_date;
use crate::state::AppState;

const RECENT_ORDERS: i64 = 10;
const TOP_PRODUCTS: i64 = 5;

/// Oldest chart month is five 30-day steps back.
const CHART_SPAN_DAYS: i64 = 150;

const MSG_BAD_DATE: &str = "صيغة التاريخ غير صحيحة";

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// A chart bar with its height relative to the best month.
#[derive(Debug, Clone)]
pub struct ChartBar {
    pub point: ChartPoint,
    pub percent: u32,
}

fn chart_bars(points: Vec<ChartPoint>) -> Vec<ChartBar> {
    let max = points
        .iter()
        .map(|p| p.revenue)
        .max()
        .unwrap_or(Decimal::ZERO);
    points
        .into_iter()
        .map(|point| {
            let percent = if max > Decimal::ZERO {
                (point.revenue * Decimal::ONE_HUNDRED / max)
                    .round()
                    .to_u32()
                    .unwrap_or(0)
            } else {
                0
            };
            ChartBar { point, percent }
        })
        .collect()
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/index.html")]
pub struct DashboardTemplate {
    pub page: AdminPage,
    pub counts: DashboardCounts,
    pub revenue: RevenueSummary,
    pub average_order_value: Decimal,
    pub recent_orders: Vec<Order>,
    pub chart: Vec<ChartBar>,
    pub top_products: Vec<TopProduct>,
    pub distribution: Vec<StatusCount>,
    pub start_date: String,
    pub end_date: String,
}

/// Dashboard with the date range applied to the revenue figures.
#[instrument(skip(state, session, admin))]
pub async fn home(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Query(query): Query<DashboardQuery>,
) -> Result<DashboardTemplate> {
    let dates = match (
        parse_date(query.start_date.as_deref()),
        parse_date(query.end_date.as_deref()),
    ) {
        (Ok(start), Ok(end)) => DateRange::from_days(start, end),
        _ => {
            flash::push(&session, FlashKind::Danger, MSG_BAD_DATE).await;
            DateRange::default()
        }
    };

    let now = Utc::now();
    let repo = DashboardRepository::new(state.pool());
    let counts = repo.counts().await?;
    let revenue = dashboard::summarize(&repo.delivered_revenue(dates).await?, now);
    let months = repo
        .monthly_delivered(now - Duration::days(CHART_SPAN_DAYS))
        .await?;
    let top_products = repo.top_products(TOP_PRODUCTS).await?;
    let distribution = repo.shipping_distribution().await?;
    let recent_orders = OrderRepository::new(state.pool())
        .recent(RECENT_ORDERS)
        .await?;

    Ok(DashboardTemplate {
        page: AdminPage::load(&session, admin, "/admin/").await?,
        average_order_value: dashboard::average_order_value(revenue.total, counts.delivered),
        counts,
        revenue,
        recent_orders,
        chart: chart_bars(dashboard::chart(now, &months)),
        top_products,
        distribution,
        start_date: query.start_date.unwrap_or_default(),
        end_date: query.end_date.unwrap_or_default(),
    })
}

// =============================================================================
// API
// =============================================================================

#[derive(Debug, Serialize)]
pub struct RecentOrder {
    pub id: i32,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub cod_amount: Decimal,
    pub shipping_status: String,
    pub payment_status: String,
    pub created_at: String,
    pub time_ago: String,
}

#[derive(Debug, Serialize)]
pub struct RecentOrdersResponse {
    pub success: bool,
    pub orders: Vec<RecentOrder>,
    pub count: usize,
}

/// Latest orders for the dashboard poller.
#[instrument(skip(state, _admin))]
pub async fn recent_orders(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
) -> Result<Json<RecentOrdersResponse>> {
    let now = Utc::now();
    let orders: Vec<RecentOrder> = OrderRepository::new(state.pool())
        .recent(RECENT_ORDERS)
        .await?
        .into_iter()
        .map(|order| RecentOrder {
            id: order.id.as_i32(),
            time_ago: time_ago(order.created_at, now),
            created_at: order.created_at.format("%Y-%m-%d %H:%M").to_string(),
            shipping_status: order.shipping_status.to_string(),
            payment_status: order.payment_status.to_string(),
            cod_amount: order.cod_amount,
            name: order.name,
        })
        .collect();

    Ok(Json(RecentOrdersResponse {
        success: true,
        count: orders.len(),
        orders,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(label: &str, revenue: i64) -> ChartPoint {
        ChartPoint {
            label: label.to_string(),
            revenue: Decimal::from(revenue),
            orders: 1,
        }
    }

    #[test]
    fn test_chart_bars_scale_to_best_month() {
        let bars = chart_bars(vec![point("May", 50), point("June", 200), point("July", 0)]);
        let percents: Vec<u32> = bars.iter().map(|b| b.percent).collect();
        assert_eq!(percents, vec![25, 100, 0]);
    }

    #[test]
    fn test_chart_bars_all_zero() {
        let bars = chart_bars(vec![point("May", 0), point("June", 0)]);
        assert!(bars.iter().all(|b| b.percent == 0));
    }
}
