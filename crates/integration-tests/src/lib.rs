//! Integration tests for Souq.
//!
//! Most tests talk HTTP to servers that are already running; `tests/stock.rs`
//! drives the repositories against the database directly. All of them are
//! marked `#[ignore]`, so a plain `cargo test` skips them.
//!
//! # Running Tests
//!
//! ```bash
//! souq-cli migrate && souq-cli seed --demo
//! cargo run -p souq-storefront &
//! cargo run -p souq-admin &
//! cargo test -p souq-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_BASE_URL` (default `http://localhost:3000`)
//! - `ADMIN_BASE_URL` (default `http://localhost:3001`)
//! - `ADMIN_EMAIL` / `ADMIN_PASSWORD` - an existing admin account
//! - `DATABASE_URL` - the migrated database, for `tests/stock.rs`

use reqwest::Client;

/// Base URL of the running storefront.
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Base URL of the running admin server.
#[must_use]
pub fn admin_base_url() -> String {
    std::env::var("ADMIN_BASE_URL").unwrap_or_else(|_| "http://localhost:3001".to_string())
}

/// Client that keeps cookies and does not follow redirects, so tests can
/// assert on `Location`.
///
/// # Panics
///
/// Panics if the TLS backend cannot be initialized.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// Pull the CSRF token out of a rendered page, from the `csrf-token` meta tag
/// or a hidden `csrf_token` input.
#[must_use]
pub fn extract_csrf_token(html: &str) -> Option<String> {
    const MARKERS: [(&str, &str); 2] = [
        (r#"name="csrf-token" content=""#, "\""),
        (r#"name="csrf_token" value=""#, "\""),
    ];
    MARKERS.iter().find_map(|(start, end)| {
        let rest = &html[html.find(start)? + start.len()..];
        let token = &rest[..rest.find(end)?];
        (!token.is_empty()).then(|| token.to_owned())
    })
}

/// GET `url` and return the CSRF token the page carries.
///
/// # Panics
///
/// Panics if the request fails or the page has no token.
pub async fn fetch_csrf_token(client: &Client, url: &str) -> String {
    let body = client
        .get(url)
        .send()
        .await
        .expect("Failed to load page")
        .text()
        .await
        .expect("Failed to read page");
    extract_csrf_token(&body).expect("Page has no CSRF token")
}

/// A client logged into the admin with `ADMIN_EMAIL` / `ADMIN_PASSWORD`.
///
/// # Panics
///
/// Panics if the credentials are missing or the login is rejected.
pub async fn admin_client() -> Client {
    let email = std::env::var("ADMIN_EMAIL").expect("ADMIN_EMAIL not set");
    let password = std::env::var("ADMIN_PASSWORD").expect("ADMIN_PASSWORD not set");
    let base_url = admin_base_url();
    let client = client();

    let token = fetch_csrf_token(&client, &format!("{base_url}/admin/login")).await;
    let resp = client
        .post(format!("{base_url}/admin/login"))
        .form(&[
            ("username", email.as_str()),
            ("password", password.as_str()),
            ("csrf_token", token.as_str()),
        ])
        .send()
        .await
        .expect("Failed to log in");

    let location = resp
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    assert!(resp.status().is_redirection(), "login did not redirect");
    assert_eq!(location, "/admin/", "login was rejected");
    client
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_csrf_token_from_meta() {
        let html = r#"<head><meta name="csrf-token" content="abc123"></head>"#;
        assert_eq!(extract_csrf_token(html).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_extract_csrf_token_from_hidden_input() {
        let html = r#"<form><input type="hidden" name="csrf_token" value="f00d"></form>"#;
        assert_eq!(extract_csrf_token(html).as_deref(), Some("f00d"));
    }

    #[test]
    fn test_extract_csrf_token_missing_or_empty() {
        assert_eq!(extract_csrf_token("<p>no form</p>"), None);
        assert_eq!(extract_csrf_token(r#"<meta name="csrf-token" content="">"#), None);
    }
}
