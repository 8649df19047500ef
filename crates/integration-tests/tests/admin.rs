//! Integration tests for the back-office.
//!
//! These tests require:
//! - A migrated database with an admin (`souq-cli admin create ...`)
//! - The admin server running (`cargo run -p souq-admin`)
//! - `ADMIN_EMAIL` / `ADMIN_PASSWORD` for that admin

use reqwest::StatusCode;
use serde_json::{Value, json};

use souq_integration_tests::{admin_base_url, admin_client, client, fetch_csrf_token};

fn location(resp: &reqwest::Response) -> String {
    resp.headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_anonymous_dashboard_redirects_to_login() {
    let base_url = admin_base_url();
    let resp = client()
        .get(format!("{base_url}/admin/orders"))
        .send()
        .await
        .expect("orders");

    assert!(resp.status().is_redirection());
    assert_eq!(location(&resp), "/admin/login");
}

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_login_with_wrong_password_flashes_error() {
    let base_url = admin_base_url();
    let client = client();
    let token = fetch_csrf_token(&client, &format!("{base_url}/admin/login")).await;

    let resp = client
        .post(format!("{base_url}/admin/login"))
        .form(&[
            ("username", "nobody@example.com"),
            ("password", "definitely-wrong"),
            ("csrf_token", token.as_str()),
        ])
        .send()
        .await
        .expect("login");
    assert!(resp.status().is_redirection());
    assert_eq!(location(&resp), "/admin/login");

    let page = client
        .get(format!("{base_url}/admin/login"))
        .send()
        .await
        .expect("login page")
        .text()
        .await
        .expect("body");
    assert!(page.contains("alert-danger"));
}

#[tokio::test]
#[ignore = "Requires running admin server and ADMIN_EMAIL/ADMIN_PASSWORD"]
async fn test_dashboard_renders_after_login() {
    let client = admin_client().await;
    let base_url = admin_base_url();

    let resp = client
        .get(format!("{base_url}/admin/?start_date=2025-01-01&end_date=2025-12-31"))
        .send()
        .await
        .expect("dashboard");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running admin server and ADMIN_EMAIL/ADMIN_PASSWORD"]
async fn test_recent_orders_api() {
    let client = admin_client().await;
    let base_url = admin_base_url();

    let body: Value = client
        .get(format!("{base_url}/admin/api/recent-orders"))
        .send()
        .await
        .expect("recent orders")
        .json()
        .await
        .expect("json");

    assert_eq!(body["success"], json!(true));
    let orders = body["orders"].as_array().expect("orders array");
    assert!(orders.len() <= 10);
    assert_eq!(body["count"], json!(orders.len()));
}

#[tokio::test]
#[ignore = "Requires running admin server and ADMIN_EMAIL/ADMIN_PASSWORD"]
async fn test_category_lifecycle() {
    let client = admin_client().await;
    let base_url = admin_base_url();
    let token = fetch_csrf_token(&client, &format!("{base_url}/admin/categories")).await;
    let name = format!("اختبار {}", std::process::id());

    let resp = client
        .post(format!("{base_url}/admin/add_category"))
        .form(&[
            ("name", name.as_str()),
            ("description", "تصنيف مؤقت"),
            ("csrf_token", token.as_str()),
        ])
        .send()
        .await
        .expect("add category");
    assert!(resp.status().is_redirection());

    let page = client
        .get(format!("{base_url}/admin/categories"))
        .send()
        .await
        .expect("categories")
        .text()
        .await
        .expect("body");
    assert!(page.contains(&name));

    // Adding the same name again is refused with a flash, not an error page
    let resp = client
        .post(format!("{base_url}/admin/add_category"))
        .form(&[("name", name.as_str()), ("csrf_token", token.as_str())])
        .send()
        .await
        .expect("duplicate category");
    assert!(resp.status().is_redirection());
}

#[tokio::test]
#[ignore = "Requires running admin server and ADMIN_EMAIL/ADMIN_PASSWORD"]
async fn test_missing_order_is_not_found() {
    let client = admin_client().await;
    let base_url = admin_base_url();

    let resp = client
        .get(format!("{base_url}/admin/order/999999999"))
        .send()
        .await
        .expect("order");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running admin server and ADMIN_EMAIL/ADMIN_PASSWORD"]
async fn test_export_orders_is_xlsx() {
    let client = admin_client().await;
    let base_url = admin_base_url();

    let resp = client
        .get(format!("{base_url}/admin/export_orders"))
        .send()
        .await
        .expect("export");
    assert_eq!(resp.status(), StatusCode::OK);

    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    assert!(content_type.contains("spreadsheetml"));

    let bytes = resp.bytes().await.expect("body");
    assert!(bytes.starts_with(b"PK"), "xlsx is a zip archive");
}

#[tokio::test]
#[ignore = "Requires running admin server and ADMIN_EMAIL/ADMIN_PASSWORD"]
async fn test_api_scrape_rejects_empty_url() {
    let client = admin_client().await;
    let base_url = admin_base_url();

    let resp = client
        .post(format!("{base_url}/admin/dropshipping/api/scrape"))
        .json(&json!({ "url": "" }))
        .send()
        .await
        .expect("scrape");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
#[ignore = "Requires running admin server and ADMIN_EMAIL/ADMIN_PASSWORD"]
async fn test_logout_clears_session() {
    let client = admin_client().await;
    let base_url = admin_base_url();

    client
        .get(format!("{base_url}/admin/logout"))
        .send()
        .await
        .expect("logout");

    let resp = client
        .get(format!("{base_url}/admin/products"))
        .send()
        .await
        .expect("products");
    assert!(resp.status().is_redirection());
    assert_eq!(location(&resp), "/admin/login");
}
