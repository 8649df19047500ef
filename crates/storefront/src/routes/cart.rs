//! Cart route handlers.
//!
//! The cart belongs to the current guest. Every line lookup is scoped by the
//! guest, so a line id from another session behaves like a missing line.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use souq_core::models::{CartLine, Order, cart_subtotal};
use souq_core::{CartItemId, ProductId};

use crate::db::{CartRepository, CatalogRepository, OrderRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::flash::{self, FlashKind};
use crate::middleware::GuestContext;
use crate::page::PageContext;
use crate::routes::catalog::parse_id;
use crate::state::AppState;

const RECENT_ORDERS: i64 = 10;

const MSG_OUT_OF_STOCK: &str = "المنتج غير متوفر حالياً";
const MSG_INVALID_QUANTITY: &str = "الكمية غير صالحة";
const MSG_BAD_PAYLOAD: &str = "بيانات غير صحيحة";
const MSG_BAD_QUANTITY: &str = "الكمية غير صحيحة";
const MSG_NOT_ENOUGH_STOCK: &str = "الكمية المطلوبة غير متوفرة في المخزون";
const MSG_MERGE_EXCEEDS_STOCK: &str = "لا يمكن إضافة هذه الكمية، المخزون غير كافي";
const MSG_ADDED: &str = "تمت إضافة المنتج إلى السلة بنجاح!";
const MSG_REMOVED: &str = "تم حذف المنتج من السلة";
const MSG_STEP_EXCEEDS_STOCK: &str = "الكمية المطلوبة غير متوفرة";
const MSG_LINE_NOT_FOUND: &str = "المنتج غير موجود في السلة";

// =============================================================================
// Cart page
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub page: PageContext,
    pub lines: Vec<CartLine>,
    pub subtotal: Decimal,
    pub orders: Vec<Order>,
}

/// Cart page with the guest's recent orders.
#[instrument(skip(state, session, guest))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    guest: GuestContext,
) -> Result<CartShowTemplate> {
    let lines = CartRepository::new(state.pool()).lines(guest.guest_id).await?;
    let orders = OrderRepository::new(state.pool())
        .recent_for_guest(guest.guest_id, RECENT_ORDERS)
        .await?;

    Ok(CartShowTemplate {
        page: PageContext::load(&state, &session, &guest).await?,
        subtotal: cart_subtotal(&lines),
        lines,
        orders,
    })
}

// =============================================================================
// Add
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub quantity: Option<String>,
    #[serde(rename = "add-to-cart-checkout")]
    pub checkout: Option<String>,
}

/// Parse a requested quantity. Empty means one.
fn parse_quantity(raw: Option<&str>) -> Option<i32> {
    match raw.map(str::trim) {
        None | Some("") => Some(1),
        Some(value) => value.parse::<i32>().ok().filter(|q| *q >= 1),
    }
}

/// Why a quantity cannot be added to the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddRejection {
    OutOfStock,
    InvalidQuantity,
    NotEnoughStock,
    MergeExceedsStock,
}

impl AddRejection {
    const fn message(self) -> &'static str {
        match self {
            Self::OutOfStock => MSG_OUT_OF_STOCK,
            Self::InvalidQuantity => MSG_INVALID_QUANTITY,
            Self::NotEnoughStock => MSG_NOT_ENOUGH_STOCK,
            Self::MergeExceedsStock => MSG_MERGE_EXCEEDS_STOCK,
        }
    }
}

/// The line quantity after adding `requested` to what is already in the cart.
fn quantity_after_add(
    stock: i32,
    requested: Option<i32>,
    in_cart: Option<i32>,
) -> std::result::Result<i32, AddRejection> {
    if stock <= 0 {
        return Err(AddRejection::OutOfStock);
    }
    let requested = requested.ok_or(AddRejection::InvalidQuantity)?;
    if requested > stock {
        return Err(AddRejection::NotEnoughStock);
    }
    match in_cart {
        Some(existing) => {
            let merged = existing.saturating_add(requested);
            if merged > stock {
                Err(AddRejection::MergeExceedsStock)
            } else {
                Ok(merged)
            }
        }
        None => Ok(requested),
    }
}

/// Add a product to the cart.
#[instrument(skip(state, session, guest, form))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    guest: GuestContext,
    Path(product_id): Path<String>,
    Form(form): Form<AddToCartForm>,
) -> Result<Redirect> {
    let id = ProductId::new(parse_id(&product_id)?);
    let product = CatalogRepository::new(state.pool())
        .product(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    let product_page = format!("/{id}");

    let carts = CartRepository::new(state.pool());
    let existing = carts.find_item(guest.guest_id, id).await?;
    let requested = parse_quantity(form.quantity.as_deref());

    let quantity = match quantity_after_add(
        product.stock,
        requested,
        existing.as_ref().map(|item| item.quantity),
    ) {
        Ok(quantity) => quantity,
        Err(rejection) => {
            let to = if rejection == AddRejection::MergeExceedsStock {
                "/cart"
            } else {
                product_page.as_str()
            };
            return Ok(flash::redirect(&session, FlashKind::Danger, rejection.message(), to).await);
        }
    };

    carts.upsert(guest.guest_id, id, quantity).await?;
    let product_ref = id.to_string();
    add_breadcrumb(
        "cart",
        "Added product",
        Some(&[("product_id", product_ref.as_str())]),
    );
    guest
        .log_activity(state.pool(), &format!("cart_add product={id} quantity={quantity}"))
        .await;

    let to = if form.checkout.is_some() {
        "/cart"
    } else {
        product_page.as_str()
    };
    Ok(flash::redirect(&session, FlashKind::Success, MSG_ADDED, to).await)
}

// =============================================================================
// Update (JSON)
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct UpdateQuantity {
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub new_total: Option<Decimal>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub new_subtotal: Option<Decimal>,
}

fn update_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(UpdateResponse {
            success: false,
            message: Some(message.into()),
            new_total: None,
            new_subtotal: None,
        }),
    )
        .into_response()
}

/// A body that is JSON but has no integer `quantity` is a quantity error;
/// anything else is a payload error.
fn rejection_message(rejection: &JsonRejection) -> &'static str {
    match rejection {
        JsonRejection::JsonDataError(_) => MSG_BAD_QUANTITY,
        _ => MSG_BAD_PAYLOAD,
    }
}

/// Set a line's quantity from the cart page script.
#[instrument(skip(state, guest, payload))]
pub async fn update(
    State(state): State<AppState>,
    guest: GuestContext,
    Path(item_id): Path<String>,
    payload: std::result::Result<Json<UpdateQuantity>, JsonRejection>,
) -> Result<Response> {
    let Ok(item_id) = item_id.parse::<CartItemId>() else {
        return Ok(update_error(StatusCode::NOT_FOUND, MSG_LINE_NOT_FOUND));
    };
    let carts = CartRepository::new(state.pool());
    let Some(line) = carts.line(guest.guest_id, item_id).await? else {
        return Ok(update_error(StatusCode::NOT_FOUND, MSG_LINE_NOT_FOUND));
    };

    let quantity = match payload {
        Ok(Json(UpdateQuantity { quantity })) => quantity,
        Err(rejection) => {
            return Ok(update_error(StatusCode::BAD_REQUEST, rejection_message(&rejection)));
        }
    };
    if quantity < 1 || quantity > line.stock {
        return Ok(update_error(
            StatusCode::BAD_REQUEST,
            format!("الكمية يجب أن تكون بين 1 و {}", line.stock),
        ));
    }

    carts.set_quantity(guest.guest_id, item_id, quantity).await?;
    let lines = carts.lines(guest.guest_id).await?;
    let new_total = lines
        .iter()
        .find(|l| l.id == item_id)
        .map_or(Decimal::ZERO, CartLine::line_total);

    Ok(Json(UpdateResponse {
        success: true,
        message: None,
        new_total: Some(new_total.round_dp(2)),
        new_subtotal: Some(cart_subtotal(&lines).round_dp(2)),
    })
    .into_response())
}

// =============================================================================
// Remove / step quantity
// =============================================================================

/// Remove a line from the cart.
#[instrument(skip(state, session, guest))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    guest: GuestContext,
    Path(item_id): Path<String>,
) -> Result<Redirect> {
    let item_id = CartItemId::new(parse_id(&item_id)?);
    let removed = CartRepository::new(state.pool())
        .remove(guest.guest_id, item_id)
        .await?;
    if !removed {
        return Err(AppError::NotFound(format!("cart item {item_id}")));
    }
    guest
        .log_activity(state.pool(), &format!("cart_remove item={item_id}"))
        .await;
    Ok(flash::redirect(&session, FlashKind::Success, MSG_REMOVED, "/cart").await)
}

/// Direction of a quantity step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Plus,
    Minus,
}

impl Step {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "plus" => Some(Self::Plus),
            "minus" => Some(Self::Minus),
            _ => None,
        }
    }

    /// New quantity, or `None` when stepping up would exceed the stock.
    const fn apply(self, quantity: i32, stock: i32) -> Option<i32> {
        match self {
            Self::Plus if quantity >= stock => None,
            Self::Plus => Some(quantity + 1),
            Self::Minus if quantity <= 1 => Some(1),
            Self::Minus => Some(quantity - 1),
        }
    }
}

/// Step a line's quantity up or down by one.
#[instrument(skip(state, session, guest))]
pub async fn change_quantity(
    State(state): State<AppState>,
    session: Session,
    guest: GuestContext,
    Path((operation, item_id)): Path<(String, String)>,
) -> Result<Redirect> {
    let step = Step::parse(&operation)
        .ok_or_else(|| AppError::NotFound(format!("quantity operation {operation}")))?;
    let item_id = CartItemId::new(parse_id(&item_id)?);

    let carts = CartRepository::new(state.pool());
    let line = carts
        .line(guest.guest_id, item_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("cart item {item_id}")))?;

    match step.apply(line.quantity, line.stock) {
        Some(quantity) if quantity != line.quantity => {
            carts.set_quantity(guest.guest_id, item_id, quantity).await?;
        }
        Some(_) => {}
        None => flash::push(&session, FlashKind::Warning, MSG_STEP_EXCEEDS_STOCK).await,
    }
    Ok(Redirect::to("/cart"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn reject(content_type: &str, body: &'static str) -> &'static str {
        use axum::extract::FromRequest;

        let request = axum::http::Request::builder()
            .method("POST")
            .header(axum::http::header::CONTENT_TYPE, content_type)
            .body(axum::body::Body::from(body))
            .unwrap();
        let rejection = Json::<UpdateQuantity>::from_request(request, &())
            .await
            .unwrap_err();
        rejection_message(&rejection)
    }

    #[tokio::test]
    async fn test_update_rejects_non_integer_quantity() {
        assert_eq!(reject("application/json", r#"{"quantity":"3"}"#).await, "الكمية غير صحيحة");
        assert_eq!(reject("application/json", r#"{"qty":3}"#).await, "الكمية غير صحيحة");
        assert_eq!(reject("application/json", r#"{"quantity":1.5}"#).await, "الكمية غير صحيحة");
    }

    #[tokio::test]
    async fn test_update_rejects_bad_payload() {
        assert_eq!(reject("application/json", "{quantity").await, "بيانات غير صحيحة");
        assert_eq!(reject("text/plain", r#"{"quantity":3}"#).await, "بيانات غير صحيحة");
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(None), Some(1));
        assert_eq!(parse_quantity(Some(" ")), Some(1));
        assert_eq!(parse_quantity(Some("3")), Some(3));
        assert_eq!(parse_quantity(Some("0")), None);
        assert_eq!(parse_quantity(Some("-2")), None);
        assert_eq!(parse_quantity(Some("two")), None);
    }

    #[test]
    fn test_quantity_after_add_checks_in_order() {
        assert_eq!(
            quantity_after_add(0, Some(1), None),
            Err(AddRejection::OutOfStock)
        );
        assert_eq!(
            quantity_after_add(5, None, None),
            Err(AddRejection::InvalidQuantity)
        );
        assert_eq!(
            quantity_after_add(5, Some(6), None),
            Err(AddRejection::NotEnoughStock)
        );
        assert_eq!(quantity_after_add(5, Some(2), None), Ok(2));
    }

    #[test]
    fn test_quantity_after_add_merges_existing_line() {
        assert_eq!(quantity_after_add(5, Some(2), Some(3)), Ok(5));
        assert_eq!(
            quantity_after_add(5, Some(3), Some(3)),
            Err(AddRejection::MergeExceedsStock)
        );
    }

    #[test]
    fn test_step_plus_is_capped_by_stock() {
        assert_eq!(Step::Plus.apply(2, 3), Some(3));
        assert_eq!(Step::Plus.apply(3, 3), None);
    }

    #[test]
    fn test_step_minus_floors_at_one() {
        assert_eq!(Step::Minus.apply(3, 3), Some(2));
        assert_eq!(Step::Minus.apply(1, 3), Some(1));
    }

    #[test]
    fn test_step_parse() {
        assert_eq!(Step::parse("plus"), Some(Step::Plus));
        assert_eq!(Step::parse("minus"), Some(Step::Minus));
        assert_eq!(Step::parse("double"), None);
    }
}
