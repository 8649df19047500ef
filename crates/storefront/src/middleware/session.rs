//! Session middleware configuration.
//!
//! Guests are anonymous, so the session is their whole identity: it holds the
//! guest token, the CSRF token and pending flash messages.

use sqlx::PgPool;
use tower_sessions::cookie::{SameSite, time::Duration};
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "souq_session";

/// Cookie lifetime. Carts expire much sooner, see `guest`.
const SESSION_LIFETIME_DAYS: i64 = 365;

/// Create the session layer with `PostgreSQL` store.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore> {
    // The session table is created by the workspace migrations
    let store = PostgresStore::new(pool.clone());

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::days(SESSION_LIFETIME_DAYS)))
        .with_secure(config.base_url.starts_with("https://"))
        // Lax so the payment gateway's redirect back still carries the cookie
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
