//! CSRF protection for form posts.
//!
//! Every session carries a random token. POST requests must echo it back in
//! the `csrf_token` form field, the `csrf_token` query parameter or the
//! `X-CSRF-Token` header. JSON requests and the payment webhook are exempt.

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
pub const CSRF_SESSION_KEY: &str = "_csrf_token";

/// Form field and query parameter name.
pub const CSRF_FIELD: &str = "csrf_token";

/// Header name for script-driven requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Paths that authenticate by other means.
const EXEMPT_PATHS: [&str; 1] = ["/payment/webhook"];

/// Largest form body buffered for token extraction.
const MAX_FORM_BYTES: usize = 1024 * 1024;

const REJECTED_MESSAGE: &str = "انتهت صلاحية النموذج، أعد المحاولة";

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

fn is_exempt(request: &Request) -> bool {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    is_json || EXEMPT_PATHS.contains(&request.uri().path())
}

fn find_field(encoded: &[u8]) -> Option<String> {
    url::form_urlencoded::parse(encoded)
        .find(|(key, _)| key == CSRF_FIELD)
        .map(|(_, value)| value.into_owned())
}

/// Path and query of the referrer, so a rejected post returns to its form.
fn back_to(request: &Request, fallback: &str) -> String {
    request
        .headers()
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(|r| url::Url::parse(r).ok())
        .map_or_else(
            || fallback.to_owned(),
            |u| match u.query() {
                Some(q) => format!("{}?{q}", u.path()),
                None => u.path().to_owned(),
            },
        )
}

/// Reject POSTs whose token does not match the session.
pub async fn csrf_middleware(session: Session, request: Request, next: Next) -> Response {
    if request.method() != Method::POST || is_exempt(&request) {
        return next.run(request).await;
    }

    let expected = match session.get::<String>(CSRF_SESSION_KEY).await {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read CSRF token");
            None
        }
    };

    let mut submitted = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .or_else(|| request.uri().query().and_then(|q| find_field(q.as_bytes())));

    let is_form = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    let referer = back_to(&request, "/");
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
        tracing::warn!(path = %request.uri().path(), "CSRF token mismatch");
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
        assert!(constant_time_compare(b"abc", b"abc"));
        assert!(!constant_time_compare(b"abc", b"abd"));
        assert!(!constant_time_compare(b"abc", b"ab"));
    }

    #[test]
    fn test_find_field_in_form_body() {
        assert_eq!(
            find_field(b"quantity=2&csrf_token=f00d"),
            Some("f00d".to_owned())
        );
        assert_eq!(find_field(b"quantity=2"), None);
    }

    #[test]
    fn test_json_and_webhook_exempt() {
        let json = Request::builder()
            .method(Method::POST)
            .uri("/cart/update/1")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::empty())
            .unwrap();
        assert!(is_exempt(&json));

        let webhook = Request::builder()
            .method(Method::POST)
            .uri("/payment/webhook")
            .body(Body::empty())
            .unwrap();
        assert!(is_exempt(&webhook));

        let form = Request::builder()
            .method(Method::POST)
            .uri("/checkout/place_order")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::empty())
            .unwrap();
        assert!(!is_exempt(&form));
    }

    #[test]
    fn test_back_to_strips_origin() {
        let request = Request::builder()
            .header(header::REFERER, "https://shop.example/12?x=1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(back_to(&request, "/"), "/12?x=1");
        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(back_to(&bare, "/"), "/");
    }
}
