//! Bosta courier API client.
//!
//! Used to pull the delivery geography and to register shipments. All calls
//! send the raw API key in the `Authorization` header.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use souq_core::models::Order;

use crate::config::BostaConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Egypt, the only country the store ships to.
const COUNTRY_ID: &str = "60e4482c7cb7d4bc4849c4d5";

/// Warehouse city used for price quotes.
const PICKUP_CITY: &str = "Alexandria";

/// Delivery type code for a standard forward shipment.
const DELIVERY_TYPE_SEND: u8 = 10;

/// Errors from the courier API.
#[derive(Debug, Error)]
pub enum BostaError {
    /// `BOSTA_API_KEY` is not set.
    #[error("courier API is not configured")]
    NotConfigured,

    /// Transport failure or non-2xx status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered without the expected data.
    #[error("courier API error: {0}")]
    Api(String),
}

/// A city, zone or district as the courier names it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BostaPlace {
    pub id: String,
    pub name: String,
}

/// Shipment creation body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRequest {
    #[serde(rename = "type")]
    pub kind: u8,
    pub specs: DeliverySpecs,
    pub cod: f64,
    pub drop_off_address: DropOffAddress,
    pub business_reference: String,
    pub receiver: Receiver,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySpecs {
    pub size: String,
    pub package_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DropOffAddress {
    pub city: String,
    pub zone_id: String,
    pub district_id: String,
    pub first_line: String,
    pub is_work_address: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receiver {
    pub first_name: String,
    pub phone: String,
}

impl DeliveryRequest {
    /// Shipment body for an order with its business reference.
    #[must_use]
    pub fn for_order(order: &Order, business_reference: &str) -> Self {
        Self {
            kind: DELIVERY_TYPE_SEND,
            specs: DeliverySpecs {
                size: order.package_size.clone(),
                package_type: order.package_type.clone(),
            },
            cod: order.cod_amount.to_f64().unwrap_or_default(),
            drop_off_address: DropOffAddress {
                city: order.city.clone(),
                zone_id: order.zone_id.clone(),
                district_id: order.district_id.clone(),
                first_line: order.address.clone(),
                is_work_address: false,
            },
            business_reference: business_reference.to_owned(),
            receiver: Receiver {
                first_name: order.name.clone(),
                phone: order.phone.clone(),
            },
        }
    }
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// `priceAfterVat` of a calculator response that reports success.
fn parse_fee(body: &Value) -> Result<Decimal, BostaError> {
    if body.get("success").and_then(Value::as_bool) != Some(true) {
        let message = string_field(body, &["message"]).unwrap_or_else(|| "Unknown error".to_owned());
        return Err(BostaError::Api(message));
    }
    let price = match body.get("priceAfterVat") {
        Some(Value::Number(n)) => n.to_string().parse::<Decimal>().ok(),
        Some(Value::String(s)) => s.parse::<Decimal>().ok(),
        _ => None,
    };
    Ok(price.unwrap_or_default())
}

/// Read a place from a list entry. Arabic names are preferred since the
/// storefront matches offer cities by their Arabic spelling.
fn parse_place(value: &Value, id_keys: &[&str], name_keys: &[&str]) -> Option<BostaPlace> {
    Some(BostaPlace {
        id: string_field(value, id_keys)?,
        name: string_field(value, name_keys)?,
    })
}

fn parse_places(list: &Value) -> Vec<BostaPlace> {
    list.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| parse_place(v, &["_id", "id"], &["nameAr", "name"]))
                .collect()
        })
        .unwrap_or_default()
}

/// Districts may come flat or grouped under their zone.
fn parse_districts(list: &Value) -> Vec<BostaPlace> {
    let Some(items) = list.as_array() else {
        return Vec::new();
    };
    let mut districts = Vec::new();
    for item in items {
        if let Some(nested) = item.get("districts").and_then(Value::as_array) {
            districts.extend(nested.iter().filter_map(|d| {
                parse_place(
                    d,
                    &["districtId", "_id"],
                    &["districtOtherName", "districtName", "nameAr", "name"],
                )
            }));
        } else if let Some(place) = parse_place(
            item,
            &["districtId", "_id"],
            &["districtOtherName", "districtName", "nameAr", "name"],
        ) {
            districts.push(place);
        }
    }
    districts
}

/// Bosta API client.
#[derive(Clone)]
pub struct BostaClient {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    api_url: String,
}

impl BostaClient {
    /// Create a new courier client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &BostaConfig) -> Result<Self, BostaError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_url: config.api_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Whether an API key is configured.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str, BostaError> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .ok_or(BostaError::NotConfigured)
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, BostaError> {
        let response = self
            .client
            .get(format!("{}{path}", self.api_url))
            .header(reqwest::header::AUTHORIZATION, self.api_key()?)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, path, "Courier API error");
            return Err(BostaError::Api(format!("HTTP {status}")));
        }
        Ok(response.json().await?)
    }

    /// Cities of the store's country.
    ///
    /// # Errors
    ///
    /// Returns `BostaError` if the request fails or the key is missing.
    pub async fn cities(&self) -> Result<Vec<BostaPlace>, BostaError> {
        let body = self
            .get_json("/cities", &[("countryId", COUNTRY_ID.to_owned())])
            .await?;
        Ok(parse_places(&body["data"]["list"]))
    }

    /// Zones of a city.
    ///
    /// # Errors
    ///
    /// Returns `BostaError` if the request fails or the key is missing.
    pub async fn zones(&self, city_id: &str) -> Result<Vec<BostaPlace>, BostaError> {
        let body = self.get_json(&format!("/cities/{city_id}/zones"), &[]).await?;
        Ok(parse_places(&body["data"]))
    }

    /// Districts of a city.
    ///
    /// # Errors
    ///
    /// Returns `BostaError` if the request fails or the key is missing.
    pub async fn districts(&self, city_id: &str) -> Result<Vec<BostaPlace>, BostaError> {
        let body = self
            .get_json(&format!("/cities/{city_id}/districts"), &[])
            .await?;
        Ok(parse_districts(&body["data"]))
    }

    /// Quote the delivery fee for a parcel from the warehouse city.
    ///
    /// # Errors
    ///
    /// Returns `BostaError::Api` if the calculator does not report success.
    pub async fn shipping_fees(&self, cod: Decimal, drop_off_city: &str) -> Result<Decimal, BostaError> {
        let body = self
            .get_json(
                "/pricing/shipment/calculator",
                &[
                    ("cod", cod.to_string()),
                    ("dropOffCity", drop_off_city.to_owned()),
                    ("pickupCity", PICKUP_CITY.to_owned()),
                    ("size", "Normal".to_owned()),
                    ("type", "SEND".to_owned()),
                ],
            )
            .await?;
        parse_fee(&body)
    }

    /// Register a shipment and return its tracking number.
    ///
    /// # Errors
    ///
    /// Returns `BostaError::Api` if the response has no tracking number.
    pub async fn create_delivery(&self, request: &DeliveryRequest) -> Result<String, BostaError> {
        tracing::info!(business_reference = %request.business_reference, "Creating courier delivery");

        let response = self
            .client
            .post(format!("{}/deliveries", self.api_url))
            .header(reqwest::header::AUTHORIZATION, self.api_key()?)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Courier delivery rejected");
            return Err(BostaError::Api(format!("HTTP {status}")));
        }

        let body: Value = response.json().await?;
        string_field(&body["data"], &["trackingNumber"])
            .ok_or_else(|| BostaError::Api("missing tracking number".to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use souq_core::{GuestId, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ShippingStatus};

    use super::*;

    #[test]
    fn test_parse_places_prefers_arabic_name() {
        let list = json!([
            {"_id": "c1", "name": "Cairo", "nameAr": "القاهره"},
            {"_id": "c2", "name": "Giza"},
            {"name": "no id"}
        ]);
        assert_eq!(
            parse_places(&list),
            vec![
                BostaPlace { id: "c1".to_owned(), name: "القاهره".to_owned() },
                BostaPlace { id: "c2".to_owned(), name: "Giza".to_owned() },
            ]
        );
    }

    #[test]
    fn test_parse_fee_reads_price_after_vat() {
        let fee = parse_fee(&json!({"success": true, "priceAfterVat": 71.25})).unwrap();
        assert_eq!(fee, Decimal::new(7125, 2));
        let fee = parse_fee(&json!({"success": true, "priceAfterVat": "60"})).unwrap();
        assert_eq!(fee, Decimal::from(60));
    }

    #[test]
    fn test_parse_fee_rejects_failure() {
        let err = parse_fee(&json!({"success": false, "message": "Invalid city"})).unwrap_err();
        assert!(matches!(err, BostaError::Api(ref m) if m == "Invalid city"));
        assert!(parse_fee(&json!({"priceAfterVat": 10})).is_err());
    }

    #[test]
    fn test_parse_districts_flattens_zones() {
        let list = json!([
            {"zoneId": "z1", "districts": [
                {"districtId": "d1", "districtName": "Maadi", "districtOtherName": "المعادي"},
                {"districtId": "d2", "districtName": "Zahraa"}
            ]},
            {"_id": "d3", "name": "Flat"}
        ]);
        let ids: Vec<_> = parse_districts(&list).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["d1", "d2", "d3"]);
    }

    #[test]
    fn test_delivery_request_shape() {
        let order = Order {
            id: OrderId::new(7),
            guest_id: GuestId::new(1),
            name: "منى".to_owned(),
            email: "test@gmail.com".to_owned(),
            phone: "01000000000".to_owned(),
            address: "شارع النيل".to_owned(),
            status: OrderStatus::Pending,
            city: "c1".to_owned(),
            zone_id: "z1".to_owned(),
            district_id: "d1".to_owned(),
            business_reference: None,
            tracking_number: None,
            shipping_status: ShippingStatus::Pending,
            cod_amount: Decimal::new(35050, 2),
            payment_method: PaymentMethod::CashOnDelivery,
            package_size: "SMALL".to_owned(),
            package_type: "Parcel".to_owned(),
            invoice_key: None,
            invoice_id: None,
            invoice_url: None,
            payment_status: PaymentStatus::Pending,
            created_at: Utc::now(),
        };
        let body = serde_json::to_value(DeliveryRequest::for_order(&order, "ORD-1-7")).unwrap();
        assert_eq!(body["type"], 10);
        assert_eq!(body["specs"]["packageType"], "Parcel");
        assert_eq!(body["cod"], 350.5);
        assert_eq!(body["dropOffAddress"]["zoneId"], "z1");
        assert_eq!(body["dropOffAddress"]["isWorkAddress"], false);
        assert_eq!(body["businessReference"], "ORD-1-7");
        assert_eq!(body["receiver"]["firstName"], "منى");
    }

    #[test]
    fn test_unconfigured_client_refuses() {
        let client = BostaClient::new(&BostaConfig {
            api_key: None,
            api_url: "https://app.bosta.co/api/v2".to_owned(),
        })
        .unwrap();
        assert!(!client.is_configured());
        assert!(matches!(client.api_key(), Err(BostaError::NotConfigured)));
    }
}
