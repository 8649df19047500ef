//! Fawaterak payment gateway client.
//!
//! Card payments are redirected to a hosted invoice page. The gateway then
//! sends the shopper back to one of our redirection URLs and reports the
//! final state through the webhook.

use std::time::Duration;

use rust_decimal::{Decimal, RoundingStrategy};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use souq_core::models::{Order, OrderLine};
use souq_core::pricing::{PROMO_LINE_ITEM, PromoDiscount};

use crate::config::PaymentConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when creating an invoice.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// No API key configured.
    #[error("payment gateway is not configured")]
    NotConfigured,

    /// The order lacks the customer name or phone.
    #[error("incomplete customer data")]
    IncompleteCustomer,

    /// Transport failure or non-2xx status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered but did not create an invoice.
    #[error("invoice rejected: {0}")]
    Rejected(String),
}

/// Invoice creation request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRequest {
    pub cart_total: String,
    pub currency: &'static str,
    pub customer: Customer,
    pub redirection_urls: RedirectionUrls,
    pub cart_items: Vec<CartItem>,
    #[serde(rename = "sendEmail")]
    pub send_email: bool,
    #[serde(rename = "sendSMS")]
    pub send_sms: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectionUrls {
    pub success_url: String,
    pub fail_url: String,
    pub pending_url: String,
    pub webhook_url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CartItem {
    pub name: String,
    pub price: String,
    pub quantity: String,
}

/// A created invoice.
#[derive(Debug, Clone)]
pub struct Invoice {
    pub key: String,
    pub id: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct InvoiceResponse {
    status: Option<String>,
    data: Option<InvoiceData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvoiceData {
    invoice_key: String,
    invoice_id: serde_json::Value,
    url: String,
}

fn money(value: Decimal) -> String {
    value
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
        .to_string()
}

fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Build the invoice body for an order.
///
/// `shipping_price` is the city's undiscounted delivery price. `base_url` is
/// used to build absolute redirection URLs.
///
/// # Errors
///
/// Returns `PaymentError::IncompleteCustomer` if the name or phone is empty.
pub fn build_invoice_request(
    order: &Order,
    lines: &[OrderLine],
    shipping_price: Decimal,
    promo: &PromoDiscount,
    base_url: &str,
) -> Result<InvoiceRequest, PaymentError> {
    let mut names = order.name.split_whitespace();
    let first_name = names.next().unwrap_or_default().to_owned();
    let rest = names.collect::<Vec<_>>().join(" ");
    let last_name = if rest.is_empty() { "N/A".to_owned() } else { rest };

    let phone: String = order.phone.chars().filter(char::is_ascii_digit).take(15).collect();
    if first_name.is_empty() || phone.is_empty() {
        return Err(PaymentError::IncompleteCustomer);
    }

    let mut cart_items = vec![CartItem {
        name: "Shipping Cost".to_owned(),
        price: money(shipping_price),
        quantity: "1".to_owned(),
    }];

    let mut products_total = Decimal::ZERO;
    for line in lines {
        cart_items.push(CartItem {
            name: truncate(&line.product_name, 255),
            price: money(line.unit_price),
            quantity: line.quantity.to_string(),
        });
        products_total += line.line_total();
    }

    let promo_off = promo.amount_off(products_total);
    if promo.eligible {
        cart_items.push(CartItem {
            name: PROMO_LINE_ITEM.to_owned(),
            price: money(-promo_off),
            quantity: "1".to_owned(),
        });
    }

    let address = order.address.trim();
    let email = order.email.trim();

    Ok(InvoiceRequest {
        cart_total: money(products_total - promo_off + shipping_price),
        currency: "EGP",
        customer: Customer {
            first_name: truncate(&first_name, 50),
            last_name: truncate(&last_name, 50),
            email: if email.is_empty() {
                "no-email@example.com".to_owned()
            } else {
                email.to_owned()
            },
            phone,
            address: if address.is_empty() {
                "N/A".to_owned()
            } else {
                truncate(address, 100)
            },
        },
        redirection_urls: RedirectionUrls {
            success_url: format!("{base_url}/payment/success/{}", order.id),
            fail_url: format!("{base_url}/payment/fail/{}", order.id),
            pending_url: format!("{base_url}/payment/pending/{}", order.id),
            webhook_url: format!("{base_url}/payment/webhook"),
        },
        cart_items,
        send_email: false,
        send_sms: false,
    })
}

/// Fawaterak API client.
#[derive(Clone)]
pub struct PaymentClient {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    api_url: String,
}

impl PaymentClient {
    /// Create a new payment client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
        })
    }

    /// Create a hosted invoice.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::NotConfigured` without an API key, `Http` on
    /// transport or status failures and `Rejected` when the gateway does not
    /// report success.
    pub async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, PaymentError> {
        let api_key = self.api_key.as_ref().ok_or(PaymentError::NotConfigured)?;

        tracing::debug!(cart_total = %request.cart_total, items = request.cart_items.len(), "Creating invoice");

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key.expose_secret())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Payment gateway error");
            return Err(PaymentError::Rejected(format!("HTTP {status}")));
        }

        let body: InvoiceResponse = response.json().await?;
        match (body.status.as_deref(), body.data) {
            (Some("success"), Some(data)) => Ok(Invoice {
                key: data.invoice_key,
                id: match data.invoice_id {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                },
                url: data.url,
            }),
            (status, _) => Err(PaymentError::Rejected(
                status.unwrap_or("missing status").to_owned(),
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use souq_core::pricing::promotional_discount;
    use souq_core::{
        GuestId, OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus, ProductId,
        ShippingStatus,
    };

    fn order(name: &str, phone: &str) -> Order {
        Order {
            id: OrderId::new(7),
            guest_id: GuestId::new(1),
            name: name.to_owned(),
            email: String::new(),
            phone: phone.to_owned(),
            address: String::new(),
            status: OrderStatus::Pending,
            city: "abc".to_owned(),
            zone_id: "z".to_owned(),
            district_id: "d".to_owned(),
            business_reference: None,
            tracking_number: None,
            shipping_status: ShippingStatus::Pending,
            cod_amount: Decimal::ZERO,
            payment_method: PaymentMethod::Visa,
            package_size: "SMALL".to_owned(),
            package_type: "Parcel".to_owned(),
            invoice_key: None,
            invoice_id: None,
            invoice_url: None,
            payment_status: PaymentStatus::Pending,
            created_at: Utc::now(),
        }
    }

    fn line(name: &str, price: i64, quantity: i32) -> OrderLine {
        OrderLine {
            id: OrderItemId::new(1),
            order_id: OrderId::new(7),
            product_id: Some(ProductId::new(1)),
            product_name: name.to_owned(),
            unit_price: Decimal::from(price),
            quantity,
            image: None,
            category_name: None,
        }
    }

    fn no_promo() -> PromoDiscount {
        promotional_discount(
            chrono::NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        )
    }

    #[test]
    fn test_invoice_shipping_first_and_total() {
        let req = build_invoice_request(
            &order("أحمد محمد علي", "+20 100-123-4567"),
            &[line("زيت", 150, 2)],
            Decimal::from(80),
            &no_promo(),
            "https://shop.example",
        )
        .unwrap();

        assert_eq!(req.cart_items[0].name, "Shipping Cost");
        assert_eq!(req.cart_items[0].price, "80");
        assert_eq!(req.cart_items[1].quantity, "2");
        assert_eq!(req.cart_total, "380");
        assert_eq!(req.customer.first_name, "أحمد");
        assert_eq!(req.customer.last_name, "محمد علي");
        assert_eq!(req.customer.phone, "201001234567");
        assert_eq!(req.customer.email, "no-email@example.com");
        assert_eq!(req.customer.address, "N/A");
        assert_eq!(
            req.redirection_urls.fail_url,
            "https://shop.example/payment/fail/7"
        );
    }

    #[test]
    fn test_invoice_promo_line_is_negative() {
        let promo = promotional_discount(
            chrono::NaiveDate::from_ymd_opt(2026, 1, 5)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        );
        let req = build_invoice_request(
            &order("سارة", "01001234567"),
            &[line("سيروم", 100, 1)],
            Decimal::from(50),
            &promo,
            "http://localhost:3000",
        )
        .unwrap();

        assert_eq!(req.customer.last_name, "N/A");
        let promo_line = req.cart_items.last().unwrap();
        assert_eq!(promo_line.name, PROMO_LINE_ITEM);
        assert_eq!(promo_line.price, "-10");
        assert_eq!(req.cart_total, "140");
    }

    #[test]
    fn test_invoice_requires_name_and_phone() {
        let err = build_invoice_request(
            &order("  ", "0100"),
            &[],
            Decimal::ZERO,
            &no_promo(),
            "http://x",
        )
        .unwrap_err();
        assert!(matches!(err, PaymentError::IncompleteCustomer));
    }

    #[test]
    fn test_invoice_request_serializes_gateway_field_names() {
        let req = build_invoice_request(
            &order("Ali", "0100"),
            &[],
            Decimal::from(10),
            &no_promo(),
            "http://x",
        )
        .unwrap();
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("cartTotal").is_some());
        assert!(json.get("sendSMS").is_some());
        assert!(json["redirectionUrls"].get("webhookUrl").is_some());
    }
}
