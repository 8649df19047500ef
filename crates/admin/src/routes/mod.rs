//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /admin/login                          - Login form
//! POST /admin/login                          - Login (rate limited)
//! GET  /admin/logout                         - Logout
//!
//! GET  /admin/                               - Dashboard (start_date, end_date)
//! GET  /admin/api/recent-orders              - Latest orders (JSON)
//!
//! # Catalog
//! GET  /admin/products                       - Product list with add form
//! POST /admin/add_product                    - Create (multipart)
//! GET  /admin/product/{id}/edit              - Edit form fragment
//! POST /admin/edit_product/{id}              - Update (multipart)
//! GET|POST /admin/delete_product/{id}        - Delete
//! POST /admin/delete_additional_image/{id}   - Delete a gallery image (JSON)
//! GET  /admin/products/missing-images        - Products without a usable image
//! GET|POST /admin/categories                 - Category list
//! POST /admin/add_category                   - Create
//! POST /admin/edit_category/{id}             - Update
//! POST /admin/delete_category/{id}           - Delete when empty
//!
//! # Orders
//! GET  /admin/orders                         - Filtered, paginated list
//! GET  /admin/order/{id}                     - Detail
//! POST /admin/add_item_to_order/{id}         - Add a product line
//! POST /admin/delete_item_from_order/{order}/{item}
//! POST /admin/update_shipping_status/{id}
//! POST /admin/order/{id}/ship                - Ship (courier when configured)
//! POST /admin/order/{id}/update-shipping-price
//! POST /admin/order/{id}/update-cod-amount
//! POST /admin/order/{id}/update-status
//! POST /admin/order/{id}/update-payment-method
//! POST /admin/delete_order/{id}
//! GET  /admin/export_orders                  - Courier sheet (xlsx)
//! POST /admin/export_selected_orders         - Courier sheet for selected ids
//! GET  /admin/export_income_stats            - Income report (xlsx)
//!
//! # Shipping
//! GET  /admin/shipping                       - Cities and prices
//! POST /admin/add_city
//! GET  /admin/delete_city/{id}
//! POST /admin/update_shipping_cost
//!
//! # Dropshipping
//! GET  /admin/dropshipping
//! POST /admin/dropshipping/scrape
//! POST /admin/dropshipping/import/{id}
//! POST /admin/dropshipping/delete/{id}
//! POST /admin/dropshipping/api/scrape        - Scrape preview (JSON)
//!
//! # Home page banners
//! GET  /admin/banners
//! POST /admin/banners/add
//! POST /admin/banners/edit/{id}
//! POST /admin/banners/delete/{id}
//! POST /admin/banners/toggle/{id}
//! ```

pub mod auth;
pub mod banners;
pub mod categories;
pub mod dashboard;
pub mod dropshipping;
pub mod orders;
pub mod products;
pub mod shipping;

use std::collections::HashMap;
use std::str::FromStr;

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRequestParts, Multipart, Path},
    http::request::Parts,
    routing::{get, post},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};
use crate::middleware::login_rate_limiter;
use crate::state::AppState;

/// Upload limit for product and banner forms.
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Login and logout.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/login",
            get(auth::login_page).post(auth::login).layer(login_rate_limiter()),
        )
        .route("/logout", get(auth::logout))
}

fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::index))
        .route("/add_product", post(products::add))
        .route("/product/{id}/edit", get(products::edit_form))
        .route("/edit_product/{id}", post(products::edit))
        .route(
            "/delete_product/{id}",
            get(products::delete).post(products::delete),
        )
        .route(
            "/delete_additional_image/{id}",
            post(products::delete_additional_image),
        )
        .route("/products/missing-images", get(products::missing_images))
        .route(
            "/categories",
            get(categories::index).post(categories::index),
        )
        .route("/add_category", post(categories::add))
        .route("/edit_category/{id}", post(categories::edit))
        .route("/delete_category/{id}", post(categories::delete))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(orders::index))
        .route("/order/{id}", get(orders::detail))
        .route("/add_item_to_order/{id}", post(orders::add_item))
        .route(
            "/delete_item_from_order/{order_id}/{item_id}",
            post(orders::delete_item),
        )
        .route(
            "/update_shipping_status/{id}",
            post(orders::update_shipping_status),
        )
        .route("/order/{id}/ship", post(orders::ship))
        .route(
            "/order/{id}/update-shipping-price",
            post(orders::update_shipping_price),
        )
        .route("/order/{id}/update-cod-amount", post(orders::update_cod_amount))
        .route("/order/{id}/update-status", post(orders::update_status))
        .route(
            "/order/{id}/update-payment-method",
            post(orders::update_payment_method),
        )
        .route("/delete_order/{id}", post(orders::delete))
        .route("/export_orders", get(orders::export_all))
        .route("/export_selected_orders", post(orders::export_selected))
        .route("/export_income_stats", get(orders::export_income))
}

fn shipping_routes() -> Router<AppState> {
    Router::new()
        .route("/shipping", get(shipping::index))
        .route("/add_city", post(shipping::add_city))
        .route("/delete_city/{id}", get(shipping::delete_city))
        .route("/update_shipping_cost", post(shipping::update_cost))
}

fn dropshipping_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dropshipping::index))
        .route("/scrape", post(dropshipping::scrape))
        .route("/import/{id}", post(dropshipping::import))
        .route("/delete/{id}", post(dropshipping::delete))
        .route("/api/scrape", post(dropshipping::api_scrape))
}

fn banner_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(banners::index))
        .route("/add", post(banners::add))
        .route("/edit/{id}", post(banners::edit))
        .route("/delete/{id}", post(banners::delete))
        .route("/toggle/{id}", post(banners::toggle))
}

/// Every route under `/admin`.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::home))
        .route("/api/recent-orders", get(dashboard::recent_orders))
        .merge(auth_routes())
        .merge(catalog_routes())
        .merge(order_routes())
        .merge(shipping_routes())
        .nest("/dropshipping", dropshipping_routes())
        .nest("/banners", banner_routes())
}

// =============================================================================
// Extractors
// =============================================================================

/// `Path` whose rejection renders the localized 404 page.
///
/// A non-numeric `/order/abc` answers like a missing order.
pub struct IdPath<T>(pub T);

impl<T, S> FromRequestParts<S> for IdPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

// =============================================================================
// Form helpers
// =============================================================================

/// Trimmed, non-empty value of an optional form field.
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parse an optional `%Y-%m-%d` field.
///
/// `Ok(None)` when the field is empty, `Err(())` when it is malformed.
pub(crate) fn parse_date(value: Option<&str>) -> std::result::Result<Option<NaiveDate>, ()> {
    non_empty(value).map_or(Ok(None), |raw| {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ())
    })
}

/// Parse a decimal form field; empty counts as `default`.
pub(crate) fn parse_decimal(value: Option<&str>, default: Decimal) -> Option<Decimal> {
    non_empty(value).map_or(Some(default), |raw| Decimal::from_str(raw).ok())
}

/// An uploaded file.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// A fully buffered multipart form.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Vec<UploadedFile>>,
}

impl MultipartForm {
    /// Buffer every field of `multipart`. File inputs left empty keep no file.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the body is not valid multipart.
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_owned();
            if let Some(file_name) = field.file_name().map(str::to_owned) {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                if file_name.is_empty() || bytes.is_empty() {
                    // An input left empty still counts as sent.
                    form.fields.entry(name).or_default();
                } else {
                    form.files.entry(name).or_default().push(UploadedFile {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        fields: HashMap<String, String>,
        files: HashMap<String, Vec<UploadedFile>>,
    ) -> Self {
        Self { fields, files }
    }

    /// A text field, as sent.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Whether a part with this name was sent at all.
    #[must_use]
    pub fn has_part(&self, name: &str) -> bool {
        self.fields.contains_key(name) || self.files.contains_key(name)
    }

    /// The first uploaded file of an input.
    #[must_use]
    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name).and_then(|files| files.first())
    }

    /// Every uploaded file of a multi-file input.
    #[must_use]
    pub fn files(&self, name: &str) -> &[UploadedFile] {
        self.files.get(name).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date(None), Ok(None));
        assert_eq!(parse_date(Some("  ")), Ok(None));
        assert_eq!(
            parse_date(Some("2025-02-28")),
            Ok(NaiveDate::from_ymd_opt(2025, 2, 28))
        );
        assert_eq!(parse_date(Some("28/02/2025")), Err(()));
    }

    async fn status_of(uri: &str) -> reqwest::StatusCode {
        async fn show(IdPath(id): IdPath<i32>) -> String {
            id.to_string()
        }
        async fn line(IdPath((order, item)): IdPath<(i32, i32)>) -> String {
            format!("{order}/{item}")
        }

        let app = Router::new()
            .route("/order/{id}", get(show))
            .route("/delete_item_from_order/{order}/{item}", get(line));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        reqwest::get(format!("http://{addr}{uri}"))
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_malformed_id_is_not_found() {
        assert_eq!(status_of("/order/42").await, reqwest::StatusCode::OK);
        assert_eq!(status_of("/order/abc").await, reqwest::StatusCode::NOT_FOUND);
        assert_eq!(
            status_of("/delete_item_from_order/7/x").await,
            reqwest::StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal(None, Decimal::TEN), Some(Decimal::TEN));
        assert_eq!(parse_decimal(Some("12.5"), Decimal::ZERO), Some(Decimal::new(125, 1)));
        assert_eq!(parse_decimal(Some("abc"), Decimal::ZERO), None);
    }
}
