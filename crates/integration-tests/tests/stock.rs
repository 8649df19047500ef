//! Stock bookkeeping across order placement and back-office changes.
//!
//! These tests talk to the database directly (`DATABASE_URL`, migrated) and
//! drive the same repositories the two servers use.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use rust_decimal::Decimal;
use sqlx::PgPool;

use souq_admin::db::OrderRepository as AdminOrders;
use souq_core::models::Order;
use souq_core::{GuestId, PaymentMethod, ProductId, ShippingStatus};
use souq_storefront::db::{LineRequest, NewOrder, OrderRepository as StoreOrders};

const INITIAL_STOCK: i32 = 10;
const ORDERED: i32 = 2;

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgPool::connect(&url).await.unwrap()
}

fn unique(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{prefix}-{nanos}")
}

/// A fresh product with `INITIAL_STOCK` units and a guest to buy it.
async fn product_and_guest(pool: &PgPool) -> (ProductId, GuestId) {
    let category: i32 = sqlx::query_scalar("INSERT INTO categories (name) VALUES ($1) RETURNING id")
        .bind(unique("stock-test"))
        .fetch_one(pool)
        .await
        .unwrap();
    let product: i32 = sqlx::query_scalar(
        "INSERT INTO products (name, price, stock, category_id) \
         VALUES ('منتج اختبار', 150, $1, $2) RETURNING id",
    )
    .bind(INITIAL_STOCK)
    .bind(category)
    .fetch_one(pool)
    .await
    .unwrap();
    let guest: i32 =
        sqlx::query_scalar("INSERT INTO guests (session_token) VALUES ($1) RETURNING id")
            .bind(unique("token"))
            .fetch_one(pool)
            .await
            .unwrap();
    (ProductId::new(product), GuestId::new(guest))
}

async fn place(pool: &PgPool, product: ProductId, guest: GuestId) -> Order {
    sqlx::query("INSERT INTO cart_items (guest_id, product_id, quantity) VALUES ($1, $2, $3)")
        .bind(guest)
        .bind(product)
        .bind(ORDERED)
        .execute(pool)
        .await
        .unwrap();

    let order = NewOrder {
        guest_id: guest,
        name: "عميل اختبار".to_string(),
        email: "test@gmail.com".to_string(),
        phone: "01000000000".to_string(),
        address: "شارع التجربة".to_string(),
        city: "test-city".to_string(),
        zone_id: "z1".to_string(),
        district_id: "d1".to_string(),
        cod_amount: Decimal::from(380),
        payment_method: PaymentMethod::CashOnDelivery,
    };
    let lines = [LineRequest {
        product_id: product,
        product_name: "منتج اختبار".to_string(),
        unit_price: Decimal::from(150),
        quantity: ORDERED,
    }];
    StoreOrders::new(pool).place(&order, &lines).await.unwrap()
}

async fn stock(pool: &PgPool, product: ProductId) -> i32 {
    sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
        .bind(product)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "Requires a migrated database"]
async fn test_place_takes_stock_and_clears_cart() {
    let pool = pool().await;
    let (product, guest) = product_and_guest(&pool).await;
    let order = place(&pool, product, guest).await;

    assert_eq!(stock(&pool, product).await, INITIAL_STOCK - ORDERED);

    let lines = AdminOrders::new(&pool).lines(order.id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, ORDERED);
    assert_eq!(lines[0].unit_price, Decimal::from(150));

    let cart: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE guest_id = $1")
        .bind(guest)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(cart, 0);
}

#[tokio::test]
#[ignore = "Requires a migrated database"]
async fn test_place_rejects_more_than_stock() {
    let pool = pool().await;
    let (product, guest) = product_and_guest(&pool).await;
    sqlx::query("UPDATE products SET stock = 1 WHERE id = $1")
        .bind(product)
        .execute(&pool)
        .await
        .unwrap();

    let order = NewOrder {
        guest_id: guest,
        name: "عميل".to_string(),
        email: "test@gmail.com".to_string(),
        phone: "01000000000".to_string(),
        address: "عنوان".to_string(),
        city: "test-city".to_string(),
        zone_id: "z1".to_string(),
        district_id: "d1".to_string(),
        cod_amount: Decimal::from(300),
        payment_method: PaymentMethod::CashOnDelivery,
    };
    let lines = [LineRequest {
        product_id: product,
        product_name: "منتج اختبار".to_string(),
        unit_price: Decimal::from(150),
        quantity: ORDERED,
    }];
    let result = StoreOrders::new(&pool).place(&order, &lines).await;

    assert!(result.is_err());
    assert_eq!(stock(&pool, product).await, 1);
}

#[tokio::test]
#[ignore = "Requires a migrated database"]
async fn test_cancel_then_delete_restores_once() {
    let pool = pool().await;
    let (product, guest) = product_and_guest(&pool).await;
    let order = place(&pool, product, guest).await;
    let orders = AdminOrders::new(&pool);

    orders
        .set_shipping_status(order.id, ShippingStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(stock(&pool, product).await, INITIAL_STOCK);

    assert!(orders.delete_and_restock(order.id).await.unwrap());
    assert_eq!(stock(&pool, product).await, INITIAL_STOCK);
}

#[tokio::test]
#[ignore = "Requires a migrated database"]
async fn test_delete_pending_order_restores() {
    let pool = pool().await;
    let (product, guest) = product_and_guest(&pool).await;
    let order = place(&pool, product, guest).await;

    assert!(AdminOrders::new(&pool).delete_and_restock(order.id).await.unwrap());
    assert_eq!(stock(&pool, product).await, INITIAL_STOCK);
}

#[tokio::test]
#[ignore = "Requires a migrated database"]
async fn test_remove_item_from_returned_order_keeps_stock() {
    let pool = pool().await;
    let (product, guest) = product_and_guest(&pool).await;
    let order = place(&pool, product, guest).await;
    let orders = AdminOrders::new(&pool);

    orders
        .set_shipping_status(order.id, ShippingStatus::Returned)
        .await
        .unwrap();
    let item = orders.lines(order.id).await.unwrap()[0].id;
    assert!(orders.remove_item(order.id, item).await.unwrap().is_some());

    assert_eq!(stock(&pool, product).await, INITIAL_STOCK);
}

#[tokio::test]
#[ignore = "Requires a migrated database"]
async fn test_reship_returned_order_takes_stock_again() {
    let pool = pool().await;
    let (product, guest) = product_and_guest(&pool).await;
    let order = place(&pool, product, guest).await;
    let orders = AdminOrders::new(&pool);

    orders
        .set_shipping_status(order.id, ShippingStatus::Returned)
        .await
        .unwrap();
    assert_eq!(stock(&pool, product).await, INITIAL_STOCK);

    let reference = unique("ORD");
    orders
        .mark_shipped(order.id, &unique("TRK"), &reference)
        .await
        .unwrap();
    assert_eq!(stock(&pool, product).await, INITIAL_STOCK - ORDERED);

    orders
        .set_shipping_status(order.id, ShippingStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(stock(&pool, product).await, INITIAL_STOCK);
}

#[tokio::test]
#[ignore = "Requires a migrated database"]
async fn test_payment_failure_restores_unless_cancelled() {
    let pool = pool().await;
    let (product, guest) = product_and_guest(&pool).await;

    let order = place(&pool, product, guest).await;
    assert!(StoreOrders::new(&pool).delete_and_restock(order.id).await.unwrap());
    assert_eq!(stock(&pool, product).await, INITIAL_STOCK);

    let order = place(&pool, product, guest).await;
    AdminOrders::new(&pool)
        .set_shipping_status(order.id, ShippingStatus::Cancelled)
        .await
        .unwrap();
    assert!(StoreOrders::new(&pool).delete_and_restock(order.id).await.unwrap());
    assert_eq!(stock(&pool, product).await, INITIAL_STOCK);
}
