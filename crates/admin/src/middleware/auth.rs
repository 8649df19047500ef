//! Authentication extractor for admin handlers.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{CurrentAdmin, session_keys};

/// Login page for unauthenticated browsers.
pub const LOGIN_PATH: &str = "/admin/login";

/// Extractor that requires admin authentication.
///
/// If the admin is not logged in, returns a redirect to the login page
/// for HTML requests, or 401 Unauthorized for `/admin/api/*` requests.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAdminAuth(admin): RequireAdminAuth,
/// ) -> impl IntoResponse {
///     format!("مرحباً {}", admin.name)
/// }
/// ```
pub struct RequireAdminAuth(pub CurrentAdmin);

/// Returned when a protected route is hit without a session admin.
#[derive(Debug, PartialEq, Eq)]
pub enum AdminAuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// Unauthorized response (for API requests).
    Unauthorized,
}

impl IntoResponse for AdminAuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(LOGIN_PATH).into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

fn rejection_for(path: &str) -> AdminAuthRejection {
    if path.starts_with("/admin/api/") || path.starts_with("/api/") {
        AdminAuthRejection::Unauthorized
    } else {
        AdminAuthRejection::RedirectToLogin
    }
}

impl<S> FromRequestParts<S> for RequireAdminAuth
where
    S: Send + Sync,
{
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AdminAuthRejection::Unauthorized)?;

        let admin: CurrentAdmin = session
            .get(session_keys::CURRENT_ADMIN)
            .await
            .ok()
            .flatten()
            .ok_or_else(|| rejection_for(parts.uri.path()))?;

        Ok(Self(admin))
    }
}

/// Store the logged-in admin and rotate the session id.
///
/// # Errors
///
/// Returns the session store error if the session cannot be written.
pub async fn set_current_admin(
    session: &Session,
    admin: &CurrentAdmin,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_ADMIN, admin).await
}

/// Forget the logged-in admin.
///
/// # Errors
///
/// Returns the session store error if the session cannot be written.
pub async fn clear_current_admin(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_paths_get_unauthorized() {
        assert_eq!(
            rejection_for("/admin/api/recent-orders"),
            AdminAuthRejection::Unauthorized
        );
        assert_eq!(rejection_for("/admin/orders"), AdminAuthRejection::RedirectToLogin);
    }

    #[test]
    fn test_redirect_targets_login() {
        let response = AdminAuthRejection::RedirectToLogin.into_response();
        assert_eq!(
            response
                .headers()
                .get(axum::http::header::LOCATION)
                .and_then(|v| v.to_str().ok()),
            Some(LOGIN_PATH)
        );
        assert_eq!(
            AdminAuthRejection::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
