//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span)
//! 3. Request ID
//! 4. Security headers
//! 5. Session layer (tower-sessions with `PostgreSQL` store)
//! 6. Guest resolution (shop routes only)
//! 7. CSRF check (shop routes only)
//! 8. Rate limiting (checkout and JSON endpoints)

pub mod csrf;
pub mod guest;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use csrf::{csrf_middleware, csrf_token};
pub use guest::{GuestContext, guest_middleware};
pub use rate_limit::{api_rate_limiter, checkout_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
