//! Session middleware configuration for admin.
//!
//! Back-office sessions are short lived and never sent cross-site
//! (SameSite=Strict, 24 hour inactivity expiry).

use sqlx::PgPool;
use tower_sessions::cookie::{SameSite, time::Duration};
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::AdminConfig;

/// Session cookie name for admin.
pub const SESSION_COOKIE_NAME: &str = "souq_admin_session";

/// Inactivity window before an admin must log in again.
const SESSION_IDLE_HOURS: i64 = 24;

/// Create the session layer with `PostgreSQL` store.
///
/// Shares the `tower_sessions.session` table with the storefront; the cookie
/// names keep the two apart.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &AdminConfig,
) -> SessionManagerLayer<PostgresStore> {
    SessionManagerLayer::new(PostgresStore::new(pool.clone()))
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::hours(SESSION_IDLE_HOURS)))
        .with_secure(config.base_url.starts_with("https://"))
        .with_same_site(SameSite::Strict)
        .with_http_only(true)
        .with_path("/")
}
