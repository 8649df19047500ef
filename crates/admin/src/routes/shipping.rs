//! Shipping cities and prices.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::Redirect,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use souq_core::CityId;

use crate::db::{CityShipping, GeographyRepository, RepositoryError, average_price};
use crate::error::{AppError, Result};
use crate::filters;
use crate::flash;
use crate::middleware::RequireAdminAuth;
use crate::page::AdminPage;
use crate::routes::{IdPath, non_empty, parse_decimal};
use crate::state::AppState;

const SHIPPING_PATH: &str = "/admin/shipping";

/// Price given to cities that have none yet.
const DEFAULT_SHIPPING_PRICE: Decimal = Decimal::ONE_HUNDRED;

const MSG_CITY_NAME_REQUIRED: &str = "اسم المدينة مطلوب";
const MSG_CITY_ID_REQUIRED: &str = "معرف المدينة مطلوب";
const MSG_CITY_EXISTS: &str = "مدينة بهذا المعرف موجودة بالفعل";
const MSG_PRICE_INVALID: &str = "تكلفة الشحن يجب أن تكون رقم موجب";
const MSG_CITY_ADDED: &str = "تمت إضافة المدينة بنجاح!";
const MSG_CITY_DELETED: &str = "تم حذف المدينة بنجاح!";
const MSG_COST_UPDATED: &str = "تم تحديث تكلفة الشحن بنجاح!";

#[derive(Template, WebTemplate)]
#[template(path = "shipping/index.html")]
pub struct ShippingTemplate {
    pub page: AdminPage,
    pub cities: Vec<CityShipping>,
    pub total_zones: i64,
    pub total_districts: i64,
    pub average_cost: Decimal,
}

/// Cities with their prices; cities without a price get the default first.
#[instrument(skip(state, session, admin))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
) -> Result<ShippingTemplate> {
    let geography = GeographyRepository::new(state.pool());
    let created = geography.ensure_shipping_costs(DEFAULT_SHIPPING_PRICE).await?;
    if created > 0 {
        tracing::info!(created, "Added default shipping costs");
    }

    let cities = geography.shipping_overview().await?;
    Ok(ShippingTemplate {
        page: AdminPage::load(&session, admin, SHIPPING_PATH).await?,
        average_cost: average_price(&cities),
        total_zones: geography.zones_count().await?,
        total_districts: geography.districts_count().await?,
        cities,
    })
}

#[derive(Debug, Deserialize)]
pub struct AddCityForm {
    pub name: Option<String>,
    pub city_id: Option<String>,
    pub shipping_price: Option<String>,
}

#[instrument(skip(state, session, _admin, form))]
pub async fn add_city(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Form(form): Form<AddCityForm>,
) -> Result<Redirect> {
    let Some(name) = non_empty(form.name.as_deref()) else {
        return Ok(flash::danger(&session, MSG_CITY_NAME_REQUIRED, SHIPPING_PATH).await);
    };
    let Some(city_id) = non_empty(form.city_id.as_deref()) else {
        return Ok(flash::danger(&session, MSG_CITY_ID_REQUIRED, SHIPPING_PATH).await);
    };
    let Some(price) = parse_decimal(form.shipping_price.as_deref(), DEFAULT_SHIPPING_PRICE)
        .filter(|p| *p >= Decimal::ZERO)
    else {
        return Ok(flash::danger(&session, MSG_PRICE_INVALID, SHIPPING_PATH).await);
    };

    match GeographyRepository::new(state.pool())
        .create_city(name, city_id, price)
        .await
    {
        Ok(city) => {
            tracing::info!(city_id = %city.city_id, "City added");
            Ok(flash::success(&session, MSG_CITY_ADDED, SHIPPING_PATH).await)
        }
        Err(RepositoryError::Conflict(_)) => {
            Ok(flash::danger(&session, MSG_CITY_EXISTS, SHIPPING_PATH).await)
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete a city with its price, zones and districts.
#[instrument(skip(state, session, _admin))]
pub async fn delete_city(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    IdPath(id): IdPath<i32>,
) -> Result<Redirect> {
    let id = CityId::new(id);
    let city = GeographyRepository::new(state.pool())
        .delete_city(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("city {id}")))?;

    tracing::info!(city_id = %city.city_id, "City deleted");
    Ok(flash::success(&session, MSG_CITY_DELETED, SHIPPING_PATH).await)
}

#[derive(Debug, Deserialize)]
pub struct ShippingCostForm {
    pub city_id: Option<String>,
    pub price: Option<String>,
}

#[instrument(skip(state, session, _admin, form))]
pub async fn update_cost(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Form(form): Form<ShippingCostForm>,
) -> Result<Redirect> {
    let Some(city_id) = non_empty(form.city_id.as_deref()) else {
        return Ok(flash::danger(&session, MSG_CITY_ID_REQUIRED, SHIPPING_PATH).await);
    };
    let Some(price) =
        parse_decimal(form.price.as_deref(), Decimal::ZERO).filter(|p| *p >= Decimal::ZERO)
    else {
        return Ok(flash::danger(&session, MSG_PRICE_INVALID, SHIPPING_PATH).await);
    };

    GeographyRepository::new(state.pool())
        .upsert_shipping_price(city_id, price)
        .await?;
    Ok(flash::success(&session, MSG_COST_UPDATED, SHIPPING_PATH).await)
}
