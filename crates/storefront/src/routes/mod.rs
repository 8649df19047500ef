//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                              - Home page
//! GET  /shop                          - Product listing (search, filters, pages)
//! GET  /{product_id}                  - Product detail
//! GET  /about                         - About page
//! GET  /return-policy                 - Return policy
//!
//! # Cart
//! GET  /cart                          - Cart page with recent orders
//! POST /cart/add/{product_id}         - Add to cart (form)
//! POST /cart/update/{item_id}         - Set quantity (JSON)
//! GET  /cart/remove/{item_id}         - Remove a line
//! GET  /cart/change-quantity/{op}/{item_id} - Step quantity (plus|minus)
//!
//! # Checkout
//! GET  /checkout                      - Checkout form
//! POST /checkout/place_order          - Place the order
//! GET  /order_confirmation            - Latest order summary
//! GET  /order_detail                  - Latest order detail
//!
//! # Payment gateway
//! GET  /payment/success/{order_id}    - Card payment succeeded
//! GET  /payment/fail/{order_id}       - Card payment failed (order removed)
//! GET  /payment/pending/{order_id}    - Card payment pending
//! POST /payment/webhook               - Gateway status callback (no guest, no CSRF)
//!
//! # Delivery geography (JSON)
//! GET  /api/cities                    - Cities with zones and districts
//! GET  /api/zones?city_id=            - Zones of a city
//! GET  /api/districts?city_id=        - Districts of a city
//! GET  /api/shipping-cost?city_id=    - Configured shipping price
//! GET  /get_zones/{city_id}           - Zones of a city
//! GET  /get_districts/{city_id}       - Districts of a city
//! GET  /get_shipping_cost/{city_id}   - Discounted shipping quote for the cart
//! ```

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod geo;
pub mod payment;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{api_rate_limiter, checkout_rate_limiter};
use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add/{product_id}", post(cart::add))
        .route("/update/{item_id}", post(cart::update))
        .route("/remove/{item_id}", get(cart::remove))
        .route(
            "/change-quantity/{operation}/{item_id}",
            get(cart::change_quantity),
        )
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show))
        .route(
            "/place_order",
            post(checkout::place_order).layer(checkout_rate_limiter()),
        )
}

/// Create the shopper-facing payment result routes.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/success/{order_id}", get(payment::success))
        .route("/fail/{order_id}", get(payment::fail))
        .route("/pending/{order_id}", get(payment::pending))
}

/// Create the geography JSON routes.
pub fn geo_routes() -> Router<AppState> {
    Router::new()
        .route("/api/cities", get(geo::cities))
        .route("/api/zones", get(geo::zones))
        .route("/api/districts", get(geo::districts))
        .route("/api/shipping-cost", get(geo::shipping_cost))
        .route("/get_zones/{city_id}", get(geo::zones_by_path))
        .route("/get_districts/{city_id}", get(geo::districts_by_path))
        .route("/get_shipping_cost/{city_id}", get(geo::shipping_quote))
        .layer(api_rate_limiter())
}

/// Routes that need the guest and CSRF middleware.
pub fn shop_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(catalog::home))
        .route("/shop", get(catalog::shop))
        .route("/about", get(catalog::about))
        .route("/return-policy", get(catalog::return_policy))
        .route("/{product_id}", get(catalog::product))
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .route("/order_confirmation", get(checkout::order_confirmation))
        .route("/order_detail", get(checkout::order_detail))
        .nest("/payment", payment_routes())
        .merge(geo_routes())
}

/// Gateway callbacks, authenticated by the shared webhook secret.
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/payment/webhook", post(payment::webhook))
}
