//! Delivery geography endpoints used by the checkout script.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use souq_core::models::{City, District, Zone};
use souq_core::pricing::{ShippingQuote, combo_free_shipping, eid_shipping_offer, quote_shipping};
use souq_core::{CityId, DistrictId, ZoneId};

use crate::db::{CartRepository, GeographyRepository};
use crate::error::Result;
use crate::middleware::GuestContext;
use crate::state::AppState;

/// Shipping price quoted for cities without a configured cost.
const FALLBACK_SHIPPING_PRICE: i64 = 80;

#[derive(Debug, Serialize)]
pub struct ZoneView {
    pub id: ZoneId,
    pub name: String,
    pub zone_id: String,
}

impl From<Zone> for ZoneView {
    fn from(zone: Zone) -> Self {
        Self {
            id: zone.id,
            name: zone.name,
            zone_id: zone.zone_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DistrictView {
    pub id: DistrictId,
    pub name: String,
    pub district_id: String,
}

impl From<District> for DistrictView {
    fn from(district: District) -> Self {
        Self {
            id: district.id,
            name: district.name,
            district_id: district.district_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CityView {
    pub id: CityId,
    pub name: String,
    pub city_id: String,
    pub zones: Vec<ZoneView>,
    pub districts: Vec<DistrictView>,
}

/// Nest zones and districts under their cities.
fn nest_cities(cities: Vec<City>, zones: Vec<Zone>, districts: Vec<District>) -> Vec<CityView> {
    let mut zones_by_city: HashMap<String, Vec<ZoneView>> = HashMap::new();
    for zone in zones {
        zones_by_city
            .entry(zone.city_id.clone())
            .or_default()
            .push(zone.into());
    }
    let mut districts_by_city: HashMap<String, Vec<DistrictView>> = HashMap::new();
    for district in districts {
        districts_by_city
            .entry(district.city_id.clone())
            .or_default()
            .push(district.into());
    }

    cities
        .into_iter()
        .map(|city| CityView {
            zones: zones_by_city.remove(&city.city_id).unwrap_or_default(),
            districts: districts_by_city.remove(&city.city_id).unwrap_or_default(),
            id: city.id,
            name: city.name,
            city_id: city.city_id,
        })
        .collect()
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CityQuery {
    pub city_id: Option<String>,
}

impl CityQuery {
    fn city_id(&self) -> &str {
        self.city_id.as_deref().unwrap_or_default()
    }
}

/// All cities with their zones and districts.
#[instrument(skip(state))]
pub async fn cities(State(state): State<AppState>) -> Result<Response> {
    let geography = GeographyRepository::new(state.pool());
    let cities = geography.cities().await?;
    let zones = geography.all_zones().await?;
    let districts = geography.all_districts().await?;

    Ok(Json(json!({ "city": nest_cities(cities, zones, districts) })).into_response())
}

/// Zones of `?city_id=`.
#[instrument(skip(state))]
pub async fn zones(State(state): State<AppState>, Query(query): Query<CityQuery>) -> Result<Response> {
    let zones: Vec<ZoneView> = GeographyRepository::new(state.pool())
        .zones(query.city_id())
        .await?
        .into_iter()
        .map(ZoneView::from)
        .collect();
    Ok(Json(json!({ "zones": zones })).into_response())
}

/// Districts of `?city_id=`.
#[instrument(skip(state))]
pub async fn districts(
    State(state): State<AppState>,
    Query(query): Query<CityQuery>,
) -> Result<Response> {
    let districts: Vec<DistrictView> = GeographyRepository::new(state.pool())
        .districts(query.city_id())
        .await?
        .into_iter()
        .map(DistrictView::from)
        .collect();
    Ok(Json(json!({ "districts": districts })).into_response())
}

#[derive(Debug, Serialize)]
struct CostResponse {
    #[serde(with = "rust_decimal::serde::float")]
    cost: Decimal,
}

/// Configured shipping price of `?city_id=`.
#[instrument(skip(state))]
pub async fn shipping_cost(
    State(state): State<AppState>,
    Query(query): Query<CityQuery>,
) -> Result<Response> {
    match GeographyRepository::new(state.pool())
        .shipping_price(query.city_id())
        .await?
    {
        Some(cost) => Ok(Json(CostResponse { cost }).into_response()),
        None => Ok(json_error(StatusCode::NOT_FOUND, "Shipping cost not found")),
    }
}

/// Zones of a city, by path.
#[instrument(skip(state))]
pub async fn zones_by_path(
    State(state): State<AppState>,
    Path(city_id): Path<String>,
) -> Result<Response> {
    zones(State(state), Query(CityQuery { city_id: Some(city_id) })).await
}

/// Districts of a known city, by path.
#[instrument(skip(state))]
pub async fn districts_by_path(
    State(state): State<AppState>,
    Path(city_id): Path<String>,
) -> Result<Response> {
    if GeographyRepository::new(state.pool())
        .city(&city_id)
        .await?
        .is_none()
    {
        return Ok(json_error(StatusCode::NOT_FOUND, "City not found"));
    }
    districts(State(state), Query(CityQuery { city_id: Some(city_id) })).await
}

/// Shipping quote as exposed to the checkout script.
#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    #[serde(with = "rust_decimal::serde::float")]
    pub shipping_cost: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub standard_cost: Decimal,
    pub discount_applied: bool,
    pub discount_message: Option<&'static str>,
    pub eid_offer_active: bool,
    pub eid_offer_type: Option<&'static str>,
}

impl From<ShippingQuote> for QuoteResponse {
    fn from(quote: ShippingQuote) -> Self {
        Self {
            shipping_cost: quote.shipping_cost,
            standard_cost: quote.standard_cost,
            discount_applied: quote.discount_applied,
            discount_message: quote.discount_message,
            eid_offer_active: quote.eid_offer_active,
            eid_offer_type: quote.eid_offer_type,
        }
    }
}

/// Discounted shipping price of a city for the guest's current cart.
#[instrument(skip(state, guest))]
pub async fn shipping_quote(
    State(state): State<AppState>,
    guest: GuestContext,
    Path(city_id): Path<String>,
) -> Result<Response> {
    let geography = GeographyRepository::new(state.pool());
    let Some(city) = geography.city(&city_id).await? else {
        return Ok(json_error(StatusCode::NOT_FOUND, "City not found"));
    };

    let standard = geography
        .shipping_price(&city.city_id)
        .await?
        .unwrap_or_else(|| Decimal::from(FALLBACK_SHIPPING_PRICE));
    let products = CartRepository::new(state.pool())
        .product_ids(guest.guest_id)
        .await?;

    let now = chrono::Local::now().naive_local();
    let eid = eid_shipping_offer(&products, &city.name, now);
    let combo = combo_free_shipping(&products);
    let quote = quote_shipping(standard, &eid, &combo);

    Ok(Json(QuoteResponse::from(quote)).into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn city(id: i32, city_id: &str) -> City {
        City {
            id: CityId::new(id),
            name: format!("city {id}"),
            city_id: city_id.to_owned(),
            created_at: Utc::now(),
        }
    }

    fn zone(id: i32, city_id: &str) -> Zone {
        Zone {
            id: ZoneId::new(id),
            name: format!("zone {id}"),
            city_id: city_id.to_owned(),
            zone_id: format!("z{id}"),
        }
    }

    #[test]
    fn test_nest_cities_groups_by_courier_city_id() {
        let nested = nest_cities(
            vec![city(1, "cA"), city(2, "cB")],
            vec![zone(1, "cA"), zone(2, "cA"), zone(3, "cB")],
            vec![District {
                id: DistrictId::new(9),
                name: "d".to_owned(),
                city_id: "cB".to_owned(),
                district_id: "d9".to_owned(),
            }],
        );
        assert_eq!(nested.len(), 2);
        assert_eq!(nested[0].zones.len(), 2);
        assert!(nested[0].districts.is_empty());
        assert_eq!(nested[1].zones.len(), 1);
        assert_eq!(nested[1].districts[0].district_id, "d9");
    }

    #[test]
    fn test_quote_response_serializes_numbers() {
        let quote = QuoteResponse {
            shipping_cost: Decimal::from(40),
            standard_cost: Decimal::from(80),
            discount_applied: true,
            discount_message: Some("x"),
            eid_offer_active: true,
            eid_offer_type: Some("eid_50_percent"),
        };
        let json = serde_json::to_value(&quote).unwrap();
        assert_eq!(json["shipping_cost"], 40.0);
        assert_eq!(json["standard_cost"], 80.0);
        assert_eq!(json["eid_offer_type"], "eid_50_percent");
    }
}
