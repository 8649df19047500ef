//! Checkout: the order form, order placement and the order summaries.

use std::str::FromStr;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use souq_core::models::{CartLine, City, Order, OrderLine, cart_subtotal};
use souq_core::pricing::{
    CheckoutTotals, PromoDiscount, checkout_totals, combo_free_shipping, eid_shipping_offer,
    promotional_discount, quote_shipping,
};
use souq_core::{PaymentMethod, ProductId};

use crate::db::{
    CartRepository, GeographyRepository, LineRequest, NewOrder, OrderRepository, PlaceOrderError,
};
use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::flash::{self, FlashKind};
use crate::middleware::GuestContext;
use crate::page::PageContext;
use crate::services::notify::order_message;
use crate::services::payment::build_invoice_request;
use crate::services::PaymentError;
use crate::state::AppState;

const DEFAULT_EMAIL: &str = "test@gmail.com";

const MSG_EMPTY_CART: &str = "سلة التسوق فارغة";
const MSG_BAD_PAYMENT_METHOD: &str = "طريقة الدفع المختارة غير متاحة";
const MSG_NO_SHIPPING_COST: &str = "تكلفة الشحن غير متوفرة لهذه المدينة";
const MSG_ORDER_CREATED: &str = "تم إنشاء الطلب بنجاح!";
const MSG_ORDER_FAILED: &str = "حدث خطأ أثناء معالجة الطلب، الرجاء المحاولة مرة أخرى";
const MSG_INCOMPLETE_CUSTOMER: &str = "البيانات الأساسية للعميل غير مكتملة";
const MSG_INVOICE_REJECTED: &str = "فشل في إنشاء فاتورة الدفع";
const MSG_GATEWAY_UNREACHABLE: &str = "فشل في الاتصال بخدمة الدفع، الرجاء المحاولة مرة أخرى";
const MSG_NO_ORDERS: &str = "لا يوجد طلبات";
const MSG_NO_PREVIOUS_ORDERS: &str = "لا يوجد طلبات سابقة";

/// Wall-clock time the promotional windows are evaluated against.
fn shop_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// WhatsApp link asking the shop to pay for `items` with a mobile wallet.
#[must_use]
pub fn whatsapp_order_link<'a>(
    admin_phone: &str,
    store_name: &str,
    items: impl IntoIterator<Item = (&'a str, i32)>,
) -> String {
    let mut message = vec!["السلام عليكم، انا عاوز اشتري:".to_owned()];
    message.extend(
        items
            .into_iter()
            .map(|(name, quantity)| format!("- {name} × {quantity}")),
    );
    message.push(format!(
        "\nمن موقع {store_name}، وعاوز ادفع بالمحافظ الإلكترونية."
    ));
    format!(
        "https://wa.me/{admin_phone}?text={}",
        urlencoding::encode(&message.join("\n"))
    )
}

fn cart_whatsapp_link(state: &AppState, lines: &[CartLine]) -> String {
    let store = &state.config().store;
    whatsapp_order_link(
        &store.admin_phone,
        &store.name,
        lines.iter().map(|l| (l.name.as_str(), l.quantity)),
    )
}

// =============================================================================
// Checkout page
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub page: PageContext,
    pub lines: Vec<CartLine>,
    pub totals: CheckoutTotals,
    pub promo: PromoDiscount,
    pub cities: Vec<City>,
    pub whatsapp_link: String,
}

/// Checkout form.
#[instrument(skip(state, session, guest))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    guest: GuestContext,
) -> Result<Response> {
    let lines = CartRepository::new(state.pool()).lines(guest.guest_id).await?;
    if lines.is_empty() {
        return Ok(flash::redirect(&session, FlashKind::Danger, MSG_EMPTY_CART, "/cart")
            .await
            .into_response());
    }

    let promo = promotional_discount(shop_now());
    let totals = checkout_totals(cart_subtotal(&lines), &promo);
    let cities = GeographyRepository::new(state.pool()).cities().await?;
    let whatsapp_link = cart_whatsapp_link(&state, &lines);

    Ok(CheckoutTemplate {
        page: PageContext::load(&state, &session, &guest).await?,
        lines,
        totals,
        promo,
        cities,
        whatsapp_link,
    }
    .into_response())
}

// =============================================================================
// Order placement
// =============================================================================

/// Checkout form fields. The posted `total` is required but never trusted.
#[derive(Debug, Default, Deserialize)]
pub struct PlaceOrderForm {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub zone_id: Option<String>,
    pub district_id: Option<String>,
    pub total: Option<String>,
    pub payment_method: Option<String>,
    pub email: Option<String>,
}

/// A checkout form with every required field present.
#[derive(Debug)]
struct ValidForm {
    name: String,
    phone: String,
    address: String,
    city: String,
    zone_id: String,
    district_id: String,
    payment_method: String,
    email: String,
}

impl PlaceOrderForm {
    /// Names of the required fields that are absent or blank.
    fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("phone", &self.phone),
            ("address", &self.address),
            ("city", &self.city),
            ("zone_id", &self.zone_id),
            ("district_id", &self.district_id),
            ("total", &self.total),
            ("payment_method", &self.payment_method),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().is_none_or(|v| v.trim().is_empty()))
        .map(|(field, _)| field)
        .collect()
    }

    fn validate(self) -> std::result::Result<ValidForm, String> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(format!("الحقول التالية مطلوبة: {}", missing.join(", ")));
        }
        let field = |v: Option<String>| v.unwrap_or_default().trim().to_owned();
        let email = field(self.email);
        Ok(ValidForm {
            name: field(self.name),
            phone: field(self.phone),
            address: field(self.address),
            city: field(self.city),
            zone_id: field(self.zone_id),
            district_id: field(self.district_id),
            payment_method: field(self.payment_method),
            email: if email.is_empty() {
                DEFAULT_EMAIL.to_owned()
            } else {
                email
            },
        })
    }
}

/// Place an order from the guest's cart.
///
/// Validation failures flash a message and redirect. Unexpected failures roll
/// back, are reported and send the shopper back to the checkout form.
#[instrument(skip(state, session, guest, form))]
pub async fn place_order(
    State(state): State<AppState>,
    session: Session,
    guest: GuestContext,
    Form(form): Form<PlaceOrderForm>,
) -> Response {
    match place(&state, &session, &guest, form).await {
        Ok(response) => response,
        Err(e) => {
            let event_id = sentry::capture_error(&e);
            tracing::error!(
                error = %e,
                sentry_event_id = %event_id,
                "Order placement failed"
            );
            flash::redirect(&session, FlashKind::Danger, MSG_ORDER_FAILED, "/checkout")
                .await
                .into_response()
        }
    }
}

async fn place(
    state: &AppState,
    session: &Session,
    guest: &GuestContext,
    form: PlaceOrderForm,
) -> Result<Response> {
    let back = |kind: FlashKind, message: String, to: &'static str| async move {
        flash::redirect(session, kind, message, to)
            .await
            .into_response()
    };

    let form = match form.validate() {
        Ok(form) => form,
        Err(message) => return Ok(back(FlashKind::Danger, message, "/checkout").await),
    };

    let carts = CartRepository::new(state.pool());
    let lines = carts.lines(guest.guest_id).await?;
    if lines.is_empty() {
        return Ok(back(FlashKind::Danger, MSG_EMPTY_CART.to_owned(), "/cart").await);
    }

    let Ok(payment_method) = PaymentMethod::from_str(&form.payment_method) else {
        return Ok(back(FlashKind::Danger, MSG_BAD_PAYMENT_METHOD.to_owned(), "/checkout").await);
    };

    let geography = GeographyRepository::new(state.pool());
    let Some(standard_shipping) = geography.shipping_price(&form.city).await? else {
        return Ok(back(FlashKind::Danger, MSG_NO_SHIPPING_COST.to_owned(), "/checkout").await);
    };

    let now = shop_now();
    let promo = promotional_discount(now);
    let totals = checkout_totals(cart_subtotal(&lines), &promo);

    if let Some(short) = lines.iter().find(|l| l.stock < l.quantity) {
        return Ok(back(
            FlashKind::Danger,
            format!("الكمية المتاحة من {} غير كافية", short.name),
            "/cart",
        )
        .await);
    }

    let city_name = geography.city(&form.city).await?.map(|c| c.name);
    let product_ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
    let eid = eid_shipping_offer(&product_ids, city_name.as_deref().unwrap_or_default(), now);
    let combo = combo_free_shipping(&product_ids);
    let quote = quote_shipping(standard_shipping, &eid, &combo);
    if quote.discount_applied {
        tracing::info!(
            offer = quote.eid_offer_type.unwrap_or("combo"),
            shipping = %quote.shipping_cost,
            "Shipping discount applied"
        );
    }

    let whatsapp_link = cart_whatsapp_link(state, &lines);
    let new_order = NewOrder {
        guest_id: guest.guest_id,
        name: form.name,
        email: form.email,
        phone: form.phone,
        address: form.address,
        city: form.city,
        zone_id: form.zone_id,
        district_id: form.district_id,
        cod_amount: (totals.products_total + quote.shipping_cost).round_dp(2),
        payment_method,
    };
    let requests: Vec<LineRequest> = lines
        .iter()
        .map(|l| LineRequest {
            product_id: l.product_id,
            product_name: l.name.clone(),
            unit_price: l.unit_price().round_dp(2),
            quantity: l.quantity,
        })
        .collect();

    let orders = OrderRepository::new(state.pool());
    let order = match orders.place(&new_order, &requests).await {
        Ok(order) => order,
        Err(PlaceOrderError::InsufficientStock(name)) => {
            return Ok(back(
                FlashKind::Danger,
                format!("الكمية المتاحة من {name} غير كافية"),
                "/cart",
            )
            .await);
        }
        Err(PlaceOrderError::Repository(e)) => return Err(e.into()),
    };

    tracing::info!(order_id = %order.id, method = payment_method.as_str(), "Order placed");
    let order_ref = order.id.to_string();
    add_breadcrumb("checkout", "Order placed", Some(&[("order_id", order_ref.as_str())]));
    guest
        .log_activity(state.pool(), &format!("order_placed order={}", order.id))
        .await;

    let order_lines = orders.lines(order.id).await?;
    notify_new_order(state, &order, &order_lines, city_name.as_deref(), quote.shipping_cost);

    match payment_method {
        PaymentMethod::Visa => {
            Ok(start_card_payment(state, session, &order, &order_lines, standard_shipping, &promo).await)
        }
        PaymentMethod::VodafoneCash => {
            flash::push(session, FlashKind::Success, MSG_ORDER_CREATED).await;
            Ok(Redirect::to(&whatsapp_link).into_response())
        }
        PaymentMethod::CashOnDelivery => {
            Ok(back(FlashKind::Success, MSG_ORDER_CREATED.to_owned(), "/order_confirmation").await)
        }
    }
}

/// Post the new-order message in the background.
fn notify_new_order(
    state: &AppState,
    order: &Order,
    lines: &[OrderLine],
    city_name: Option<&str>,
    shipping_price: Decimal,
) {
    let notifier = state.notifier().clone();
    if !notifier.is_enabled() {
        return;
    }
    let message = order_message(order, lines, city_name, shipping_price, &state.config().store);
    let order_id = order.id;
    tokio::spawn(async move {
        if let Err(e) = notifier.send(&message).await {
            tracing::error!(error = %e, order_id = %order_id, "Failed to send order notification");
        }
    });
}

/// Create the gateway invoice and send the shopper to it.
async fn start_card_payment(
    state: &AppState,
    session: &Session,
    order: &Order,
    lines: &[OrderLine],
    shipping_price: Decimal,
    promo: &PromoDiscount,
) -> Response {
    let result = async {
        let request =
            build_invoice_request(order, lines, shipping_price, promo, &state.config().base_url)?;
        state.payment().create_invoice(&request).await
    }
    .await;

    let message = match result {
        Ok(invoice) => {
            match OrderRepository::new(state.pool())
                .set_invoice(order.id, &invoice.key, &invoice.id, &invoice.url)
                .await
            {
                Ok(()) => return Redirect::to(&invoice.url).into_response(),
                Err(e) => {
                    tracing::error!(error = %e, order_id = %order.id, "Failed to store invoice");
                    MSG_ORDER_FAILED
                }
            }
        }
        Err(PaymentError::IncompleteCustomer) => MSG_INCOMPLETE_CUSTOMER,
        Err(PaymentError::Http(e)) => {
            tracing::error!(error = %e, order_id = %order.id, "Payment gateway unreachable");
            MSG_GATEWAY_UNREACHABLE
        }
        Err(e) => {
            tracing::error!(error = %e, order_id = %order.id, "Invoice creation failed");
            MSG_INVOICE_REJECTED
        }
    };
    flash::redirect(session, FlashKind::Danger, message, "/checkout")
        .await
        .into_response()
}

// =============================================================================
// Order summaries
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "checkout/confirmation.html")]
pub struct ConfirmationTemplate {
    pub page: PageContext,
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

#[derive(Template, WebTemplate)]
#[template(path = "checkout/detail.html")]
pub struct DetailTemplate {
    pub page: PageContext,
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub shipping_cost: Option<Decimal>,
    pub products_price: Decimal,
}

/// Summary of the guest's latest order.
#[instrument(skip(state, session, guest))]
pub async fn order_confirmation(
    State(state): State<AppState>,
    session: Session,
    guest: GuestContext,
) -> Result<Response> {
    let orders = OrderRepository::new(state.pool());
    let Some(order) = orders.latest_for_guest(guest.guest_id).await? else {
        return Ok(flash::redirect(&session, FlashKind::Info, MSG_NO_ORDERS, "/")
            .await
            .into_response());
    };
    let lines = orders.lines(order.id).await?;

    Ok(ConfirmationTemplate {
        page: PageContext::load(&state, &session, &guest).await?,
        order,
        lines,
    }
    .into_response())
}

/// Detail of the guest's latest order with its shipping cost.
#[instrument(skip(state, session, guest))]
pub async fn order_detail(
    State(state): State<AppState>,
    session: Session,
    guest: GuestContext,
) -> Result<Response> {
    let orders = OrderRepository::new(state.pool());
    let Some(order) = orders.latest_for_guest(guest.guest_id).await? else {
        return Ok(
            flash::redirect(&session, FlashKind::Warning, MSG_NO_PREVIOUS_ORDERS, "/cart")
                .await
                .into_response(),
        );
    };
    let lines = orders.lines(order.id).await?;
    let shipping_cost = GeographyRepository::new(state.pool())
        .shipping_price(&order.city)
        .await?;
    let products_price = lines.iter().map(OrderLine::line_total).sum();

    Ok(DetailTemplate {
        page: PageContext::load(&state, &session, &guest).await?,
        order,
        lines,
        shipping_cost,
        products_price,
    }
    .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn full_form() -> PlaceOrderForm {
        PlaceOrderForm {
            name: Some("Ali".to_owned()),
            phone: Some("0100".to_owned()),
            address: Some("Street 1".to_owned()),
            city: Some("c1".to_owned()),
            zone_id: Some("z1".to_owned()),
            district_id: Some("d1".to_owned()),
            total: Some("100".to_owned()),
            payment_method: Some("visa".to_owned()),
            email: None,
        }
    }

    #[test]
    fn test_missing_fields_lists_blank_and_absent() {
        let form = PlaceOrderForm {
            phone: Some("  ".to_owned()),
            zone_id: None,
            ..full_form()
        };
        assert_eq!(form.missing_fields(), vec!["phone", "zone_id"]);
    }

    #[test]
    fn test_validate_reports_missing_fields() {
        let err = PlaceOrderForm::default().validate().unwrap_err();
        assert!(err.starts_with("الحقول التالية مطلوبة: name, phone"));
        assert!(err.ends_with("payment_method"));
    }

    #[test]
    fn test_validate_defaults_email() {
        let form = full_form().validate().unwrap();
        assert_eq!(form.email, DEFAULT_EMAIL);
        let form = PlaceOrderForm {
            email: Some(" sara@example.com ".to_owned()),
            ..full_form()
        }
        .validate()
        .unwrap();
        assert_eq!(form.email, "sara@example.com");
    }

    #[test]
    fn test_whatsapp_order_link_lists_items() {
        let link = whatsapp_order_link("201050188516", "Al Hamd", [("زيت", 2), ("سيروم", 1)]);
        assert!(link.starts_with("https://wa.me/201050188516?text="));
        let text = urlencoding::decode(link.split_once("?text=").unwrap().1).unwrap();
        assert_eq!(
            text,
            "السلام عليكم، انا عاوز اشتري:\n- زيت × 2\n- سيروم × 1\n\n\
             من موقع Al Hamd، وعاوز ادفع بالمحافظ الإلكترونية."
        );
    }
}
