//! CSRF protection for back-office posts.
//!
//! The token is stored in the session and must come back on every POST:
//! in the `csrf_token` form field for urlencoded forms, in the query string
//! for multipart uploads, or in the `X-CSRF-Token` header for scripts.
//! JSON bodies are exempt because browsers cannot send them cross-site
//! without a preflight.

use axum::{
    body::{Body, to_bytes},
    extract::Request,
    http::{Method, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use rand::RngCore;
use tower_sessions::Session;

use crate::flash::{self, FlashKind};

/// Session key holding the token.
pub const CSRF_SESSION_KEY: &str = "_admin_csrf_token";

/// Form field and query parameter name.
pub const CSRF_FIELD: &str = "csrf_token";

/// Header name for script-driven requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

const MAX_FORM_BYTES: usize = 1024 * 1024;

const REJECTED_MESSAGE: &str = "جلسة النموذج غير صالحة، أعد المحاولة";

/// The session's token, generated on first use.
///
/// # Errors
///
/// Returns the session store error if the token cannot be read or saved.
pub async fn csrf_token(session: &Session) -> Result<String, tower_sessions::session::Error> {
    if let Some(token) = session.get::<String>(CSRF_SESSION_KEY).await? {
        return Ok(token);
    }
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    let token = hex::encode(bytes);
    session.insert(CSRF_SESSION_KEY, &token).await?;
    Ok(token)
}

/// Compare two byte slices in constant time.
pub(crate) fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn content_type(request: &Request) -> &str {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn find_field(encoded: &[u8]) -> Option<String> {
    url::form_urlencoded::parse(encoded)
        .find(|(key, _)| key == CSRF_FIELD)
        .map(|(_, value)| value.into_owned())
}

/// Same-origin path of the referring page.
fn back_to(request: &Request) -> String {
    request
        .headers()
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(|r| url::Url::parse(r).ok())
        .map_or_else(
            || "/admin/".to_owned(),
            |u| match u.query() {
                Some(q) => format!("{}?{q}", u.path()),
                None => u.path().to_owned(),
            },
        )
}

/// Reject POSTs whose token does not match the session.
pub async fn csrf_middleware(session: Session, request: Request, next: Next) -> Response {
    if request.method() != Method::POST || content_type(&request).starts_with("application/json") {
        return next.run(request).await;
    }

    let expected = session
        .get::<String>(CSRF_SESSION_KEY)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read CSRF token");
            None
        });

    let mut submitted = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .or_else(|| request.uri().query().and_then(|q| find_field(q.as_bytes())));

    let referer = back_to(&request);
    let is_form = content_type(&request).starts_with("application/x-www-form-urlencoded");
    let request = if submitted.is_none() && is_form {
        let (parts, body) = request.into_parts();
        let Ok(bytes) = to_bytes(body, MAX_FORM_BYTES).await else {
            return flash::redirect(&session, FlashKind::Danger, REJECTED_MESSAGE, &referer)
                .await
                .into_response();
        };
        submitted = find_field(&bytes);
        Request::from_parts(parts, Body::from(bytes))
    } else {
        request
    };

    let valid = matches!(
        (expected.as_deref(), submitted.as_deref()),
        (Some(expected), Some(submitted)) if constant_time_compare(expected.as_bytes(), submitted.as_bytes())
    );

    if !valid {
        tracing::warn!(path = %request.uri().path(), "Admin CSRF token mismatch");
        flash::push(&session, FlashKind::Danger, REJECTED_MESSAGE).await;
        return Redirect::to(&referer).into_response();
    }

    next.run(request).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"token", b"token"));
        assert!(!constant_time_compare(b"token", b"tokem"));
        assert!(!constant_time_compare(b"", b"x"));
    }

    #[test]
    fn test_find_field_in_query() {
        assert_eq!(find_field(b"csrf_token=abc&x=1"), Some("abc".to_owned()));
        assert_eq!(find_field(b""), None);
    }

    #[test]
    fn test_back_to_defaults_to_dashboard() {
        let request = Request::builder()
            .header(header::REFERER, "https://admin.example/admin/orders?page=2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(back_to(&request), "/admin/orders?page=2");
        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(back_to(&bare), "/admin/");
    }
}
