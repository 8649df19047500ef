//! Unified error handling with Sentry integration.
//!
//! Handlers return `Result<T, AppError>`. Validation problems are flashed and
//! redirected by the handlers themselves; what reaches `AppError` is either a
//! missing resource or a server-side failure.

use askama::Template;
use axum::{
    extract::rejection::PathRejection,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{AuthError, BostaError, ExportError, ImageError, ScrapeError};

/// Application-level error type for admin.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Session store failure.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Courier API failed.
    #[error("Courier error: {0}")]
    Bosta(#[from] BostaError),

    #[error("Scrape error: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unauthorized access.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Template)]
#[template(path = "errors/error.html")]
struct ErrorPage {
    status: u16,
    title: &'static str,
    message: &'static str,
}

fn error_page(status: StatusCode, title: &'static str, message: &'static str) -> Response {
    let page = ErrorPage {
        status: status.as_u16(),
        title,
        message,
    };
    let body = page.render().unwrap_or_else(|e| {
        tracing::error!("Template render error: {}", e);
        title.to_owned()
    });
    (status, Html(body)).into_response()
}

impl AppError {
    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Session(_)
                | Self::Bosta(_)
                | Self::Scrape(_)
                | Self::Image(_)
                | Self::Export(_)
                | Self::Auth(_)
                | Self::Internal(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        }

        match &self {
            Self::NotFound(_) => error_page(
                StatusCode::NOT_FOUND,
                "الصفحة غير موجودة",
                "العنصر المطلوب غير موجود أو تم حذفه.",
            ),
            Self::Bosta(_) | Self::Scrape(_) => error_page(
                StatusCode::BAD_GATEWAY,
                "خدمة خارجية غير متاحة",
                "فشل الاتصال بخدمة خارجية، الرجاء المحاولة لاحقاً.",
            ),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()).into_response(),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()).into_response(),
            Self::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()).into_response(),
            Self::Database(_)
            | Self::Session(_)
            | Self::Image(_)
            | Self::Export(_)
            | Self::Auth(_)
            | Self::Internal(_) => error_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "حدث خطأ في الخادم",
                "حدث خطأ غير متوقع. تم تسجيل الخطأ وسيتم التحقق منه.",
            ),
        }
    }
}

/// A malformed path id names nothing, so it renders the 404 page.
impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::NotFound(rejection.body_text())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from the signed-in admin.
pub fn set_sentry_user(admin_id: i32, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(admin_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order 7".to_string());
        assert_eq!(err.to_string(), "Not found: order 7");

        let err = AppError::Scrape(ScrapeError::Timeout);
        assert_eq!(err.to_string(), "Scrape error: انتهت مهلة الاتصال بالموقع");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Bosta(BostaError::NotConfigured)),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
