//! Order route handlers.
//!
//! Every state change redirects back to the order detail page with a notice.
//! Stock moves inside the repository transactions.

use std::str::FromStr;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, RawForm, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use souq_core::models::{Order, OrderLine, Product};
use souq_core::{OrderId, OrderItemId, OrderStatus, PaymentMethod, ProductId, ShippingStatus};

use crate::db::{
    AddItemError, DateRange, GeographyRepository, OrderFilter, OrderRepository, OrderSummary,
    ProductRepository,
};
use crate::error::{AppError, Result};
use crate::filters;
use crate::flash::{self, FlashKind};
use crate::middleware::RequireAdminAuth;
use crate::page::AdminPage;
use crate::routes::{IdPath, non_empty, parse_date, parse_decimal};
use crate::services::DeliveryRequest;
use crate::services::export::{
    self, INCOME_FILENAME, ORDERS_FILENAME, SELECTED_ORDERS_FILENAME, XLSX_CONTENT_TYPE,
};
use crate::state::AppState;

const ORDERS_PATH: &str = "/admin/orders";
const PER_PAGE: i64 = 12;
const NOT_AVAILABLE: &str = "غير متوفر";

const MSG_SELECT_PRODUCT: &str = "الرجاء اختيار منتج";
const MSG_INVALID_QUANTITY: &str = "الكمية غير صالحة";
const MSG_NOT_ENOUGH_STOCK: &str = "الكمية المطلوبة غير متوفرة في المخزون";
const MSG_ITEM_ADDED: &str = "تمت إضافة المنتج إلى الطلب بنجاح!";
const MSG_ITEM_NOT_FOUND: &str = "عنصر الطلب غير موجود";
const MSG_ITEM_REMOVED: &str = "تم حذف المنتج من الطلب بنجاح!";
const MSG_SHIPPING_REQUIRED: &str = "حالة الشحن مطلوبة";
const MSG_SHIPPING_INVALID: &str = "حالة الشحن غير صالحة";
const MSG_SHIPPING_UPDATED: &str = "تم تحديث حالة الشحن بنجاح!";
const MSG_ALREADY_SHIPPED: &str = "تم شحن هذا الطلب بالفعل";
const MSG_SHIP_CANCELLED: &str = "لا يمكن شحن طلب ملغي";
const MSG_SHIP_FAILED: &str = "حدث خطأ أثناء تحديث حالة الشحن";
const MSG_SHIPPING_PRICE_INVALID: &str = "تكلفة الشحن يجب أن تكون رقم موجب";
const MSG_SHIPPING_PRICE_UPDATED: &str = "تم تحديث تكلفة الشحن بنجاح";
const MSG_COD_INVALID: &str = "المبلغ الكلي يجب أن يكون رقم موجب";
const MSG_COD_UPDATED: &str = "تم تحديث المبلغ الكلي بنجاح";
const MSG_STATUS_REQUIRED: &str = "حالة الطلب مطلوبة";
const MSG_STATUS_INVALID: &str = "حالة الطلب غير صالحة";
const MSG_STATUS_UPDATED: &str = "تم تحديث حالة الطلب بنجاح!";
const MSG_PAYMENT_REQUIRED: &str = "طريقة الدفع مطلوبة";
const MSG_PAYMENT_INVALID: &str = "طريقة الدفع غير صالحة";
const MSG_PAYMENT_UPDATED: &str = "تم تحديث طريقة الدفع بنجاح!";
const MSG_DELETED: &str = "تم حذف الطلب بنجاح!";
const MSG_NONE_SELECTED: &str = "الرجاء اختيار طلبات للتصدير";
const MSG_BAD_DATES: &str = "خطأ في تنسيق التواريخ";

fn order_path(id: OrderId) -> String {
    format!("/admin/order/{id}")
}

// =============================================================================
// List
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub page: Option<i64>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub payment: Option<String>,
    pub shipping: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl OrdersQuery {
    /// Build the repository filter. Unknown values and malformed dates do
    /// not restrict the list.
    fn filter(&self) -> OrderFilter {
        let start = parse_date(self.start_date.as_deref()).unwrap_or_else(|()| {
            tracing::warn!(start_date = ?self.start_date, "Invalid order filter date");
            None
        });
        let end = parse_date(self.end_date.as_deref()).unwrap_or_else(|()| {
            tracing::warn!(end_date = ?self.end_date, "Invalid order filter date");
            None
        });

        OrderFilter {
            search: non_empty(self.search.as_deref()).map(str::to_owned),
            status: non_empty(self.status.as_deref()).and_then(|s| OrderStatus::from_str(s).ok()),
            payment: non_empty(self.payment.as_deref())
                .and_then(|s| PaymentMethod::from_str(s).ok()),
            shipping: non_empty(self.shipping.as_deref())
                .and_then(|s| ShippingStatus::from_str(s).ok()),
            dates: DateRange::from_days(start, end),
        }
    }

    /// The filter part of the query string, for pagination links.
    fn filter_query(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in [
            ("search", self.search.as_deref()),
            ("status", self.status.as_deref()),
            ("payment", self.payment.as_deref()),
            ("shipping", self.shipping.as_deref()),
            ("start_date", self.start_date.as_deref()),
            ("end_date", self.end_date.as_deref()),
        ] {
            if let Some(value) = non_empty(value) {
                query.append_pair(key, value);
            }
        }
        query.finish()
    }
}

/// A `<select>` entry.
#[derive(Debug, Clone)]
pub struct FilterOption {
    pub value: &'static str,
    pub label: &'static str,
}

impl FilterOption {
    /// Whether this entry is the submitted value.
    #[must_use]
    pub fn is(&self, current: &str) -> bool {
        self.value == current
    }
}

fn status_options() -> Vec<FilterOption> {
    OrderStatus::ALL
        .iter()
        .map(|s| FilterOption {
            value: s.as_str(),
            label: s.label(),
        })
        .collect()
}

fn payment_options() -> Vec<FilterOption> {
    PaymentMethod::ALL
        .iter()
        .map(|m| FilterOption {
            value: m.as_str(),
            label: m.filter_label(),
        })
        .collect()
}

fn shipping_options() -> Vec<FilterOption> {
    ShippingStatus::ALL
        .iter()
        .map(|s| FilterOption {
            value: s.as_str(),
            label: s.label(),
        })
        .collect()
}

#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersTemplate {
    pub page: AdminPage,
    pub orders: Vec<OrderSummary>,
    pub total_filtered: i64,
    pub current_page: i64,
    pub total_pages: i64,
    pub filter_query: String,
    pub search: String,
    pub status: String,
    pub payment: String,
    pub shipping: String,
    pub start_date: String,
    pub end_date: String,
    pub status_options: Vec<FilterOption>,
    pub payment_options: Vec<FilterOption>,
    pub shipping_options: Vec<FilterOption>,
}

const fn total_pages(total: i64) -> i64 {
    if total <= 0 { 1 } else { (total + PER_PAGE - 1) / PER_PAGE }
}

/// Filtered, paginated order list.
#[instrument(skip(state, session, admin))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Query(query): Query<OrdersQuery>,
) -> Result<OrdersTemplate> {
    let current_page = query.page.unwrap_or(1).max(1);
    let (orders, total_filtered) = OrderRepository::new(state.pool())
        .list(&query.filter(), PER_PAGE, (current_page - 1) * PER_PAGE)
        .await?;

    Ok(OrdersTemplate {
        page: AdminPage::load(&session, admin, ORDERS_PATH).await?,
        orders,
        total_filtered,
        current_page,
        total_pages: total_pages(total_filtered),
        filter_query: query.filter_query(),
        search: query.search.clone().unwrap_or_default(),
        status: query.status.clone().unwrap_or_default(),
        payment: query.payment.clone().unwrap_or_default(),
        shipping: query.shipping.clone().unwrap_or_default(),
        start_date: query.start_date.clone().unwrap_or_default(),
        end_date: query.end_date.clone().unwrap_or_default(),
        status_options: status_options(),
        payment_options: payment_options(),
        shipping_options: shipping_options(),
    })
}

// =============================================================================
// Detail
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "orders/detail.html")]
pub struct OrderDetailTemplate {
    pub page: AdminPage,
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub city_name: String,
    pub subtotal: Decimal,
    pub shipping_price: Decimal,
    /// Bosta's quote for this parcel, when the courier API is configured.
    pub courier_fee: Option<Decimal>,
    pub total: Decimal,
    pub created_at: String,
    pub tracking_number: String,
    pub business_reference: String,
    pub products: Vec<Product>,
    pub status_options: Vec<FilterOption>,
    pub payment_options: Vec<FilterOption>,
    pub shipping_options: Vec<FilterOption>,
}

async fn load_order(state: &AppState, id: OrderId) -> Result<Order> {
    OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

async fn courier_fee(state: &AppState, order: &Order, city_name: &str) -> Option<Decimal> {
    if !state.bosta().is_configured() {
        return None;
    }
    match state.bosta().shipping_fees(order.cod_amount, city_name).await {
        Ok(fee) => Some(fee),
        Err(e) => {
            tracing::warn!(order_id = %order.id, error = %e, "Courier fee quote failed");
            None
        }
    }
}

fn or_not_available(value: Option<&str>) -> String {
    non_empty(value).unwrap_or(NOT_AVAILABLE).to_owned()
}

/// Order detail with its lines and the products that can be added.
#[instrument(skip(state, session, admin))]
pub async fn detail(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    IdPath(id): IdPath<i32>,
) -> Result<OrderDetailTemplate> {
    let id = OrderId::new(id);
    let order = load_order(&state, id).await?;
    let lines = OrderRepository::new(state.pool()).lines(id).await?;

    let geography = GeographyRepository::new(state.pool());
    let city_name = geography
        .city(&order.city)
        .await?
        .map_or_else(|| "غير معروف".to_owned(), |c| c.name);
    let shipping_price = geography
        .shipping_price(&order.city)
        .await?
        .unwrap_or(Decimal::ZERO);
    let subtotal: Decimal = lines.iter().map(OrderLine::line_total).sum();
    let courier_fee = courier_fee(&state, &order, &city_name).await;

    Ok(OrderDetailTemplate {
        page: AdminPage::load(&session, admin, ORDERS_PATH).await?,
        products: ProductRepository::new(state.pool()).in_stock().await?,
        city_name,
        subtotal,
        shipping_price,
        courier_fee,
        total: subtotal + shipping_price,
        created_at: order.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        tracking_number: or_not_available(order.tracking_number.as_deref()),
        business_reference: or_not_available(order.business_reference.as_deref()),
        lines,
        order,
        status_options: status_options(),
        payment_options: payment_options(),
        shipping_options: shipping_options(),
    })
}

// =============================================================================
// Lines
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct AddItemForm {
    pub product_id: Option<String>,
    pub quantity: Option<String>,
}

/// Add a product line, merging with an existing line for the same product.
#[instrument(skip(state, session, _admin, form))]
pub async fn add_item(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    IdPath(id): IdPath<i32>,
    Form(form): Form<AddItemForm>,
) -> Result<Redirect> {
    let id = OrderId::new(id);
    let back = order_path(id);
    load_order(&state, id).await?;

    let product = match non_empty(form.product_id.as_deref()).and_then(|v| v.parse::<i32>().ok()) {
        Some(product_id) => {
            ProductRepository::new(state.pool())
                .get(ProductId::new(product_id))
                .await?
        }
        None => None,
    };
    let Some(product) = product else {
        return Ok(flash::danger(&session, MSG_SELECT_PRODUCT, &back).await);
    };

    let quantity = match non_empty(form.quantity.as_deref()) {
        None => 1,
        Some(raw) => match raw.parse::<i32>() {
            Ok(q) if q >= 1 => q,
            _ => return Ok(flash::danger(&session, MSG_INVALID_QUANTITY, &back).await),
        },
    };
    if quantity > product.stock {
        return Ok(flash::danger(&session, MSG_NOT_ENOUGH_STOCK, &back).await);
    }

    match OrderRepository::new(state.pool())
        .add_item(id, &product, quantity)
        .await
    {
        Ok(()) => Ok(flash::success(&session, MSG_ITEM_ADDED, &back).await),
        Err(AddItemError::InsufficientStock) => {
            Ok(flash::danger(&session, MSG_NOT_ENOUGH_STOCK, &back).await)
        }
        Err(AddItemError::OrderNotFound) => Err(AppError::NotFound(format!("order {id}"))),
        Err(AddItemError::Repository(e)) => Err(e.into()),
    }
}

/// Remove a line and restore its stock.
#[instrument(skip(state, session, _admin))]
pub async fn delete_item(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    IdPath((order_id, item_id)): IdPath<(i32, i32)>,
) -> Result<Redirect> {
    let id = OrderId::new(order_id);
    let back = order_path(id);
    load_order(&state, id).await?;

    let removed = OrderRepository::new(state.pool())
        .remove_item(id, OrderItemId::new(item_id))
        .await?;
    if removed.is_none() {
        return Ok(flash::danger(&session, MSG_ITEM_NOT_FOUND, &back).await);
    }
    Ok(flash::success(&session, MSG_ITEM_REMOVED, &back).await)
}

// =============================================================================
// Status changes
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: Option<String>,
}

/// Parse a required status field.
fn parse_required<T: FromStr>(
    value: Option<&str>,
    required: &'static str,
    invalid: &'static str,
) -> std::result::Result<T, &'static str> {
    let raw = non_empty(value).ok_or(required)?;
    T::from_str(raw).map_err(|_| invalid)
}

/// Set the shipping status; stock follows cancelled and returned.
#[instrument(skip(state, session, _admin, form))]
pub async fn update_shipping_status(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    IdPath(id): IdPath<i32>,
    Form(form): Form<StatusForm>,
) -> Result<Redirect> {
    let id = OrderId::new(id);
    let back = order_path(id);
    let status = match parse_required::<ShippingStatus>(
        form.status.as_deref(),
        MSG_SHIPPING_REQUIRED,
        MSG_SHIPPING_INVALID,
    ) {
        Ok(status) => status,
        Err(message) => return Ok(flash::danger(&session, message, &back).await),
    };

    let previous = OrderRepository::new(state.pool())
        .set_shipping_status(id, status)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;

    tracing::info!(order_id = %id, from = %previous, to = %status, "Shipping status changed");
    Ok(flash::success(&session, MSG_SHIPPING_UPDATED, &back).await)
}

/// `PREFIX-YYYYmmddHHMMSS-id`.
fn courier_reference(prefix: &str, stamp: &str, id: OrderId) -> String {
    format!("{prefix}-{stamp}-{id}")
}

/// Mark the order shipped, creating the delivery at the courier when an API
/// key is configured.
#[instrument(skip(state, session, _admin))]
pub async fn ship(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    IdPath(id): IdPath<i32>,
) -> Result<Redirect> {
    let id = OrderId::new(id);
    let back = order_path(id);
    let order = load_order(&state, id).await?;

    match order.shipping_status {
        ShippingStatus::Shipped => {
            return Ok(
                flash::redirect(&session, FlashKind::Warning, MSG_ALREADY_SHIPPED, &back).await,
            );
        }
        ShippingStatus::Cancelled => {
            return Ok(flash::danger(&session, MSG_SHIP_CANCELLED, &back).await);
        }
        _ => {}
    }

    let stamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
    let reference = non_empty(order.business_reference.as_deref())
        .map_or_else(|| courier_reference("ORD", &stamp, id), str::to_owned);

    let tracking = if state.bosta().is_configured() {
        match state
            .bosta()
            .create_delivery(&DeliveryRequest::for_order(&order, &reference))
            .await
        {
            Ok(tracking) => tracking,
            Err(e) => {
                tracing::error!(order_id = %id, error = %e, "Courier delivery creation failed");
                return Ok(flash::danger(&session, MSG_SHIP_FAILED, &back).await);
            }
        }
    } else {
        non_empty(order.tracking_number.as_deref())
            .map_or_else(|| courier_reference("TRK", &stamp, id), str::to_owned)
    };

    OrderRepository::new(state.pool())
        .mark_shipped(id, &tracking, &reference)
        .await?;

    tracing::info!(order_id = %id, tracking_number = %tracking, "Order shipped");
    Ok(flash::success(&session, MSG_SHIPPING_UPDATED, &back).await)
}

#[derive(Debug, Deserialize)]
pub struct ShippingPriceForm {
    pub shipping_price: Option<String>,
}

/// Set the shipping price of the order's city.
#[instrument(skip(state, session, _admin, form))]
pub async fn update_shipping_price(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    IdPath(id): IdPath<i32>,
    Form(form): Form<ShippingPriceForm>,
) -> Result<Redirect> {
    let id = OrderId::new(id);
    let back = order_path(id);
    let order = load_order(&state, id).await?;

    let Some(price) = parse_decimal(form.shipping_price.as_deref(), Decimal::ZERO)
        .filter(|p| *p >= Decimal::ZERO)
    else {
        return Ok(flash::danger(&session, MSG_SHIPPING_PRICE_INVALID, &back).await);
    };

    GeographyRepository::new(state.pool())
        .upsert_shipping_price(&order.city, price)
        .await?;
    Ok(flash::success(&session, MSG_SHIPPING_PRICE_UPDATED, &back).await)
}

#[derive(Debug, Deserialize)]
pub struct CodAmountForm {
    pub cod_amount: Option<String>,
}

/// Overwrite the amount to collect.
#[instrument(skip(state, session, _admin, form))]
pub async fn update_cod_amount(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    IdPath(id): IdPath<i32>,
    Form(form): Form<CodAmountForm>,
) -> Result<Redirect> {
    let id = OrderId::new(id);
    let back = order_path(id);
    load_order(&state, id).await?;

    let Some(amount) =
        parse_decimal(form.cod_amount.as_deref(), Decimal::ZERO).filter(|a| *a >= Decimal::ZERO)
    else {
        return Ok(flash::danger(&session, MSG_COD_INVALID, &back).await);
    };

    OrderRepository::new(state.pool())
        .set_cod_amount(id, amount)
        .await?;
    Ok(flash::success(&session, MSG_COD_UPDATED, &back).await)
}

/// Set the order status.
#[instrument(skip(state, session, _admin, form))]
pub async fn update_status(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    IdPath(id): IdPath<i32>,
    Form(form): Form<StatusForm>,
) -> Result<Redirect> {
    let id = OrderId::new(id);
    let back = order_path(id);
    load_order(&state, id).await?;

    let status = match parse_required::<OrderStatus>(
        form.status.as_deref(),
        MSG_STATUS_REQUIRED,
        MSG_STATUS_INVALID,
    ) {
        Ok(status) => status,
        Err(message) => return Ok(flash::danger(&session, message, &back).await),
    };

    OrderRepository::new(state.pool()).set_status(id, status).await?;
    Ok(flash::success(&session, MSG_STATUS_UPDATED, &back).await)
}

#[derive(Debug, Deserialize)]
pub struct PaymentMethodForm {
    pub payment_method: Option<String>,
}

/// Set the payment method.
#[instrument(skip(state, session, _admin, form))]
pub async fn update_payment_method(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    IdPath(id): IdPath<i32>,
    Form(form): Form<PaymentMethodForm>,
) -> Result<Redirect> {
    let id = OrderId::new(id);
    let back = order_path(id);
    load_order(&state, id).await?;

    let method = match parse_required::<PaymentMethod>(
        form.payment_method.as_deref(),
        MSG_PAYMENT_REQUIRED,
        MSG_PAYMENT_INVALID,
    ) {
        Ok(method) => method,
        Err(message) => return Ok(flash::danger(&session, message, &back).await),
    };

    OrderRepository::new(state.pool())
        .set_payment_method(id, method)
        .await?;
    Ok(flash::success(&session, MSG_PAYMENT_UPDATED, &back).await)
}

/// Delete the order and put its items back in stock.
#[instrument(skip(state, session, _admin))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    IdPath(id): IdPath<i32>,
) -> Result<Redirect> {
    let id = OrderId::new(id);
    if !OrderRepository::new(state.pool())
        .delete_and_restock(id)
        .await?
    {
        return Err(AppError::NotFound(format!("order {id}")));
    }
    tracing::info!(order_id = %id, "Order deleted");
    Ok(flash::success(&session, MSG_DELETED, ORDERS_PATH).await)
}

// =============================================================================
// Exports
// =============================================================================

fn xlsx_response(filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_owned()),
            (header::CONTENT_DISPOSITION, export::content_disposition(filename)),
        ],
        body,
    )
        .into_response()
}

/// Courier sheet for every order.
#[instrument(skip(state, _admin))]
pub async fn export_all(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
) -> Result<Response> {
    let rows = OrderRepository::new(state.pool()).export_rows(None).await?;
    let body = export::orders_workbook(&rows)?;
    Ok(xlsx_response(ORDERS_FILENAME, body))
}

/// Every `order_ids` value of a urlencoded body.
fn selected_ids(body: &[u8]) -> Vec<OrderId> {
    url::form_urlencoded::parse(body)
        .filter(|(key, _)| key == "order_ids")
        .filter_map(|(_, value)| value.trim().parse::<i32>().ok())
        .map(OrderId::new)
        .collect()
}

/// Courier sheet for the checked orders.
#[instrument(skip(state, session, _admin, body))]
pub async fn export_selected(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    RawForm(body): RawForm,
) -> Result<Response> {
    let ids = selected_ids(&body);
    if ids.is_empty() {
        return Ok(flash::danger(&session, MSG_NONE_SELECTED, ORDERS_PATH)
            .await
            .into_response());
    }

    let rows = OrderRepository::new(state.pool())
        .export_rows(Some(&ids))
        .await?;
    let body = export::orders_workbook(&rows)?;
    Ok(xlsx_response(SELECTED_ORDERS_FILENAME, body))
}

#[derive(Debug, Deserialize)]
pub struct IncomeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Income report over delivered and returned orders.
#[instrument(skip(state, session, _admin))]
pub async fn export_income(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Query(query): Query<IncomeQuery>,
) -> Result<Response> {
    let dates = match (
        parse_date(query.start_date.as_deref()),
        parse_date(query.end_date.as_deref()),
    ) {
        (Ok(start), Ok(end)) => DateRange::from_days(start, end),
        _ => {
            return Ok(flash::danger(&session, MSG_BAD_DATES, "/admin/")
                .await
                .into_response());
        }
    };

    let repo = OrderRepository::new(state.pool());
    let orders = repo.income_rows(dates).await?;
    let products = repo.income_products(dates).await?;
    let body = export::income_workbook(&export::income_report(&orders, &products))?;
    Ok(xlsx_response(INCOME_FILENAME, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_ignores_unknown_values() {
        let query = OrdersQuery {
            search: Some(" 0100 ".to_string()),
            status: Some("bogus".to_string()),
            payment: Some("visa".to_string()),
            shipping: Some("returned".to_string()),
            start_date: Some("not-a-date".to_string()),
            end_date: Some("2025-03-01".to_string()),
            ..OrdersQuery::default()
        };
        let filter = query.filter();
        assert_eq!(filter.search.as_deref(), Some("0100"));
        assert_eq!(filter.status, None);
        assert_eq!(filter.payment, Some(PaymentMethod::Visa));
        assert_eq!(filter.shipping, Some(ShippingStatus::Returned));
        assert!(filter.dates.from.is_none());
        assert!(filter.dates.until.is_some());
    }

    #[test]
    fn test_filter_query_keeps_only_set_fields() {
        let query = OrdersQuery {
            page: Some(3),
            search: Some("منى".to_string()),
            status: Some(String::new()),
            shipping: Some("pending".to_string()),
            ..OrdersQuery::default()
        };
        assert_eq!(
            query.filter_query(),
            "search=%D9%85%D9%86%D9%89&shipping=pending"
        );
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0), 1);
        assert_eq!(total_pages(12), 1);
        assert_eq!(total_pages(13), 2);
    }

    #[test]
    fn test_parse_required() {
        assert_eq!(
            parse_required::<OrderStatus>(None, MSG_STATUS_REQUIRED, MSG_STATUS_INVALID),
            Err(MSG_STATUS_REQUIRED)
        );
        assert_eq!(
            parse_required::<OrderStatus>(Some("shipped"), MSG_STATUS_REQUIRED, MSG_STATUS_INVALID),
            Err(MSG_STATUS_INVALID)
        );
        assert_eq!(
            parse_required::<OrderStatus>(Some("completed"), MSG_STATUS_REQUIRED, MSG_STATUS_INVALID),
            Ok(OrderStatus::Completed)
        );
    }

    #[test]
    fn test_selected_ids() {
        let ids = selected_ids(b"csrf_token=t&order_ids=3&order_ids=x&order_ids=7");
        assert_eq!(ids, vec![OrderId::new(3), OrderId::new(7)]);
        assert!(selected_ids(b"csrf_token=t").is_empty());
    }

    #[test]
    fn test_courier_reference() {
        assert_eq!(
            courier_reference("TRK", "20250301120000", OrderId::new(9)),
            "TRK-20250301120000-9"
        );
    }
}
