//! Payment gateway return pages and the status webhook.

use std::str::FromStr;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::instrument;

use souq_core::models::Order;
use souq_core::{OrderId, PaymentStatus};

use crate::db::{CartRepository, OrderRepository};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::GuestContext;
use crate::page::PageContext;
use crate::routes::catalog::parse_id;
use crate::state::AppState;

/// Header carrying the shared webhook secret.
const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// One of the guest's own orders, or 404.
async fn own_order(state: &AppState, guest: &GuestContext, raw_id: &str) -> Result<Order> {
    let id = OrderId::new(parse_id(raw_id)?);
    OrderRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|order| order.guest_id == guest.guest_id)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

#[derive(Template, WebTemplate)]
#[template(path = "payment/success.html")]
pub struct SuccessTemplate {
    pub page: PageContext,
    pub order: Order,
}

#[derive(Template, WebTemplate)]
#[template(path = "payment/fail.html")]
pub struct FailTemplate {
    pub page: PageContext,
    pub order_id: OrderId,
    pub amount: Decimal,
}

#[derive(Template, WebTemplate)]
#[template(path = "payment/pending.html")]
pub struct PendingTemplate {
    pub page: PageContext,
    pub order: Order,
}

/// Card payment completed: mark paid and empty the cart.
#[instrument(skip(state, session, guest))]
pub async fn success(
    State(state): State<AppState>,
    session: Session,
    mut guest: GuestContext,
    Path(order_id): Path<String>,
) -> Result<SuccessTemplate> {
    let mut order = own_order(&state, &guest, &order_id).await?;
    OrderRepository::new(state.pool())
        .set_payment_status(order.id, PaymentStatus::Paid)
        .await?;
    order.payment_status = PaymentStatus::Paid;
    CartRepository::new(state.pool()).clear(guest.guest_id).await?;
    guest.cart_count = 0;
    tracing::info!(order_id = %order.id, "Card payment succeeded");

    Ok(SuccessTemplate {
        page: PageContext::load(&state, &session, &guest).await?,
        order,
    })
}

/// Card payment failed: the order is removed and its stock released.
#[instrument(skip(state, session, guest))]
pub async fn fail(
    State(state): State<AppState>,
    session: Session,
    guest: GuestContext,
    Path(order_id): Path<String>,
) -> Result<FailTemplate> {
    let order = own_order(&state, &guest, &order_id).await?;
    if discards_on_failure(order.payment_status) {
        OrderRepository::new(state.pool())
            .delete_and_restock(order.id)
            .await?;
        tracing::info!(order_id = %order.id, "Card payment failed, order removed");
    } else {
        tracing::warn!(order_id = %order.id, "Ignoring failure redirect for a settled order");
    }

    Ok(FailTemplate {
        page: PageContext::load(&state, &session, &guest).await?,
        order_id: order.id,
        amount: order.cod_amount,
    })
}

/// Whether a failure redirect may remove the order and release its stock.
/// Money already collected keeps the order.
const fn discards_on_failure(status: PaymentStatus) -> bool {
    !matches!(status, PaymentStatus::Paid | PaymentStatus::Refunded)
}

/// Card payment pending at the gateway.
#[instrument(skip(state, session, guest))]
pub async fn pending(
    State(state): State<AppState>,
    session: Session,
    guest: GuestContext,
    Path(order_id): Path<String>,
) -> Result<PendingTemplate> {
    let mut order = own_order(&state, &guest, &order_id).await?;
    OrderRepository::new(state.pool())
        .set_payment_status(order.id, PaymentStatus::Pending)
        .await?;
    order.payment_status = PaymentStatus::Pending;

    Ok(PendingTemplate {
        page: PageContext::load(&state, &session, &guest).await?,
        order,
    })
}

// =============================================================================
// Webhook
// =============================================================================

fn webhook_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "status": "error", "message": message }))).into_response()
}

/// A decoded status callback.
#[derive(Debug, PartialEq, Eq)]
struct StatusUpdate {
    invoice_key: String,
    status: PaymentStatus,
}

/// Decode a webhook body, returning the error response for bad payloads.
fn parse_webhook(body: &[u8]) -> std::result::Result<StatusUpdate, Response> {
    let Ok(Value::Object(payload)) = serde_json::from_slice::<Value>(body) else {
        return Err(webhook_error(StatusCode::BAD_REQUEST, "Invalid payload"));
    };
    let field = |name: &str| {
        payload
            .get(name)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
    };
    let (Some(invoice_key), Some(status)) = (field("invoiceKey"), field("status")) else {
        return Err(webhook_error(StatusCode::BAD_REQUEST, "Missing required fields"));
    };
    let Ok(status) = PaymentStatus::from_str(status) else {
        return Err(webhook_error(StatusCode::BAD_REQUEST, "Invalid status"));
    };
    Ok(StatusUpdate {
        invoice_key: invoice_key.to_owned(),
        status,
    })
}

/// Gateway status callback.
///
/// When `PAYMENT_WEBHOOK_SECRET` is configured the `X-Webhook-Secret` header
/// must match it.
#[instrument(skip(state, headers, body))]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    if let Some(secret) = state.config().payment.webhook_secret.as_ref() {
        let incoming = headers
            .get(WEBHOOK_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !crate::middleware::csrf::constant_time_compare(
            incoming.as_bytes(),
            secret.expose_secret().as_bytes(),
        ) {
            tracing::warn!("Rejected webhook with a bad secret");
            return Ok(webhook_error(StatusCode::UNAUTHORIZED, "Unauthorized webhook"));
        }
    }

    let update = match parse_webhook(&body) {
        Ok(update) => update,
        Err(response) => return Ok(response),
    };

    let orders = OrderRepository::new(state.pool());
    let Some(order) = orders.find_by_invoice_key(&update.invoice_key).await? else {
        return Ok(webhook_error(StatusCode::NOT_FOUND, "Order not found"));
    };

    orders.set_payment_status(order.id, update.status).await?;
    if update.status == PaymentStatus::Paid {
        CartRepository::new(state.pool()).clear(order.guest_id).await?;
    }
    tracing::info!(order_id = %order.id, status = update.status.as_str(), "Payment status updated");

    Ok(Json(json!({ "status": "success" })).into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_discards_only_unsettled_orders() {
        assert!(discards_on_failure(PaymentStatus::Pending));
        assert!(discards_on_failure(PaymentStatus::Failed));
        assert!(discards_on_failure(PaymentStatus::Expired));
        assert!(!discards_on_failure(PaymentStatus::Paid));
        assert!(!discards_on_failure(PaymentStatus::Refunded));
    }

    #[test]
    fn test_parse_webhook_accepts_known_status() {
        let update = parse_webhook(br#"{"invoiceKey":"abc","status":"paid"}"#).unwrap();
        assert_eq!(
            update,
            StatusUpdate {
                invoice_key: "abc".to_owned(),
                status: PaymentStatus::Paid,
            }
        );
    }

    #[test]
    fn test_parse_webhook_rejects_non_object() {
        let response = parse_webhook(b"[1,2]").unwrap_err();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = parse_webhook(b"not json").unwrap_err();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_parse_webhook_requires_fields() {
        let response = parse_webhook(br#"{"invoiceKey":"abc"}"#).unwrap_err();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = parse_webhook(br#"{"invoiceKey":"","status":"paid"}"#).unwrap_err();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_parse_webhook_rejects_unknown_status() {
        let response = parse_webhook(br#"{"invoiceKey":"abc","status":"lost"}"#).unwrap_err();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
