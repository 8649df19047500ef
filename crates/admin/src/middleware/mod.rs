//! HTTP middleware stack for admin.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span)
//! 3. Request ID
//! 4. Security headers (no third-party scripts or form targets)
//! 5. Session layer (tower-sessions with `PostgreSQL` store)
//! 6. CSRF check on every POST
//! 7. Rate limiting (login only)
//! 8. `RequireAdminAuth` extractor in each protected handler

pub mod auth;
pub mod csrf;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{LOGIN_PATH, RequireAdminAuth, clear_current_admin, set_current_admin};
pub use csrf::{csrf_middleware, csrf_token};
pub use rate_limit::login_rate_limiter;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
