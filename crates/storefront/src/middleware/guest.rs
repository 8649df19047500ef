//! Anonymous shopper identity.
//!
//! Each browser session is bound to a guest row through a random token kept
//! in the session. The middleware resolves (or creates) the guest on every
//! request and exposes it to handlers as [`GuestContext`].

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sqlx::PgPool;
use tower_sessions::Session;

use souq_core::GuestId;
use souq_core::models::Guest;

use crate::db::{CartRepository, GuestRepository};
use crate::error::{AppError, set_sentry_guest};
use crate::state::AppState;

/// Session key for the guest token.
pub const GUEST_TOKEN_KEY: &str = "guest_token";

/// Inactivity after which a guest starts over with an empty cart.
const GUEST_IDLE_DAYS: i64 = 30;

/// Age after which cart lines are dropped.
const CART_ITEM_TTL_HOURS: i64 = 24;

/// The current shopper, available to every storefront handler.
#[derive(Debug, Clone)]
pub struct GuestContext {
    pub guest_id: GuestId,
    pub session_token: String,
    pub cart_count: i64,
}

impl GuestContext {
    /// Record a shopper action. Failures are logged and otherwise ignored.
    pub async fn log_activity(&self, pool: &PgPool, action: &str) {
        if let Err(e) = GuestRepository::new(pool)
            .log_activity(self.guest_id, &self.session_token, action)
            .await
        {
            tracing::warn!(error = %e, action, "Failed to record guest activity");
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for GuestContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| AppError::Internal("guest middleware not installed".to_owned()))
    }
}

/// Whether a guest last seen at `last_activity` must start over.
fn is_idle(last_activity: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - last_activity > Duration::days(GUEST_IDLE_DAYS)
}

/// Cart lines created before this moment are dropped.
fn cart_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::hours(CART_ITEM_TTL_HOURS)
}

fn mint_token() -> String {
    let mut bytes = [0u8; 24];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

async fn new_guest(state: &AppState, session: &Session) -> Result<Guest, AppError> {
    let token = mint_token();
    let guest = GuestRepository::new(state.pool()).create(&token).await?;
    session.insert(GUEST_TOKEN_KEY, &token).await?;
    tracing::debug!(guest_id = %guest.id, "Created guest");
    Ok(guest)
}

/// Resolve the guest for this request.
///
/// - no token, or a token without a guest row: start a new guest
/// - guest idle for more than 30 days: empty its cart and start a new guest
/// - otherwise: record the activity
///
/// Cart lines older than a day are purged for everyone on each request.
///
/// # Errors
///
/// Returns `AppError` if the session store or database fails.
pub async fn guest_middleware(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let now = Utc::now();
    let carts = CartRepository::new(state.pool());
    let guests = GuestRepository::new(state.pool());

    match carts.purge_older_than(cart_cutoff(now)).await {
        Ok(0) => {}
        Ok(purged) => tracing::debug!(purged, "Removed expired cart lines"),
        Err(e) => tracing::warn!(error = %e, "Failed to purge expired cart lines"),
    }

    let token: Option<String> = session.get(GUEST_TOKEN_KEY).await?;
    let existing = match token {
        Some(token) => guests.find_by_token(&token).await?,
        None => None,
    };

    let guest = match existing {
        Some(guest) if is_idle(guest.last_activity, now) => {
            carts.clear(guest.id).await?;
            new_guest(&state, &session).await?
        }
        Some(guest) => {
            guests.touch(guest.id, now).await?;
            guest
        }
        None => new_guest(&state, &session).await?,
    };

    set_sentry_guest(&guest.id);
    let cart_count = carts.count(guest.id).await?;
    request.extensions_mut().insert(GuestContext {
        guest_id: guest.id,
        session_token: guest.session_token,
        cart_count,
    });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).single().unwrap_or_default()
    }

    #[test]
    fn test_guest_idle_after_thirty_days() {
        let now = at(31, 12);
        assert!(!is_idle(at(1, 12), now));
        assert!(is_idle(at(1, 11), now));
        assert!(!is_idle(now, now));
    }

    #[test]
    fn test_cart_lines_expire_after_a_day() {
        let now = at(10, 9);
        assert_eq!(cart_cutoff(now), at(9, 9));
        assert!(at(9, 8) < cart_cutoff(now));
        assert!(at(9, 10) > cart_cutoff(now));
    }

    #[test]
    fn test_mint_token_is_48_hex_chars() {
        let token = mint_token();
        assert_eq!(token.len(), 48);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
