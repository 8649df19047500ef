//! Integration tests for the public storefront.
//!
//! These tests require:
//! - A migrated and seeded database (`souq-cli migrate && souq-cli seed --demo`)
//! - The storefront running (`cargo run -p souq-storefront`)

use reqwest::StatusCode;
use serde_json::{Value, json};

use souq_integration_tests::{client, fetch_csrf_token, storefront_base_url};

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_health_endpoints() {
    let base_url = storefront_base_url();
    let client = client();

    let resp = client.get(format!("{base_url}/health")).send().await.expect("health");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.expect("body"), "ok");

    let resp = client
        .get(format!("{base_url}/health/ready"))
        .send()
        .await
        .expect("ready");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_home_sets_guest_cookie_and_renders_rtl() {
    let base_url = storefront_base_url();
    let resp = client().get(format!("{base_url}/")).send().await.expect("home");

    assert_eq!(resp.status(), StatusCode::OK);
    let has_session = resp
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .any(|v| v.to_str().is_ok_and(|c| c.starts_with("souq_session=")));
    assert!(has_session, "guest session cookie missing");

    let body = resp.text().await.expect("body");
    assert!(body.contains(r#"dir="rtl""#));
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_shop_accepts_filters() {
    let base_url = storefront_base_url();
    let resp = client()
        .get(format!(
            "{base_url}/shop?q=ساعة&min_price=10&max_price=5000&sort=price_asc&page=1"
        ))
        .send()
        .await
        .expect("shop");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_unknown_product_is_not_found() {
    let base_url = storefront_base_url();
    let resp = client()
        .get(format!("{base_url}/999999999"))
        .send()
        .await
        .expect("product");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_cart_post_without_csrf_is_bounced() {
    let base_url = storefront_base_url();
    let client = client();
    client.get(format!("{base_url}/")).send().await.expect("home");

    let resp = client
        .post(format!("{base_url}/cart/add/1"))
        .form(&[("quantity", "1")])
        .send()
        .await
        .expect("add");
    assert!(resp.status().is_redirection());

    let cart = client
        .get(format!("{base_url}/cart"))
        .send()
        .await
        .expect("cart")
        .text()
        .await
        .expect("body");
    assert!(cart.contains("alert-danger"), "rejection flash missing");
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_cart_update_unknown_line_returns_json_error() {
    let base_url = storefront_base_url();
    let client = client();
    let token = fetch_csrf_token(&client, &format!("{base_url}/cart")).await;

    let resp = client
        .post(format!("{base_url}/cart/update/999999999"))
        .header("X-CSRF-Token", token)
        .json(&json!({ "quantity": 2 }))
        .send()
        .await
        .expect("update");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["success"], json!(false));
    assert!(body["message"].is_string());
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_cities_api_nests_zones_and_districts() {
    let base_url = storefront_base_url();
    let resp = client()
        .get(format!("{base_url}/api/cities"))
        .send()
        .await
        .expect("cities");
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.expect("json");
    let cities = body.as_array().expect("array of cities");
    for city in cities {
        assert!(city["city_id"].is_string());
        assert!(city["zones"].is_array());
        assert!(city["districts"].is_array());
    }
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_checkout_with_empty_cart_redirects() {
    let base_url = storefront_base_url();
    let resp = client()
        .get(format!("{base_url}/checkout"))
        .send()
        .await
        .expect("checkout");
    assert!(resp.status().is_redirection());
}
