//! Database records shared by the storefront and the back-office.
//!
//! With the `postgres` feature every record derives `sqlx::FromRow`, so the
//! repositories can map rows straight into these structs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{
    AdminId, BannerId, CartItemId, CategoryId, CityId, DistrictId, DropshipProductId,
    ActivityLogId, DropshipStatus, GuestId, OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus,
    ProductAttributeId, ProductId, ProductImageId, PromoCodeId, ShippingCostId, ShippingStatus,
    ZoneId, apply_discount,
};

/// A back-office account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Admin {
    pub id: AdminId,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string. Rows created before hashing was introduced hold
    /// the plaintext password until the next successful login.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// An anonymous shopper identified by the session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Guest {
    pub id: GuestId,
    pub session_token: String,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A catalog product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// List price before the product discount.
    pub price: Decimal,
    /// Percentage off the list price (`0` for none).
    pub discount: Decimal,
    pub stock: i32,
    /// Either an absolute URL or a path relative to the media root,
    /// e.g. `static/uploads/abc.png`.
    pub image: String,
    pub views: i32,
    pub category_id: CategoryId,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Price after the product discount.
    #[must_use]
    pub fn sale_price(&self) -> Decimal {
        apply_discount(self.price, self.discount)
    }

    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    #[must_use]
    pub fn has_discount(&self) -> bool {
        self.discount > Decimal::ZERO
    }

    /// Discount rounded to a whole percentage for badges.
    #[must_use]
    pub fn discount_label(&self) -> String {
        self.discount.round().normalize().to_string()
    }

    /// URL usable in an `<img src>`.
    #[must_use]
    pub fn image_src(&self) -> String {
        image_src(&self.image)
    }
}

/// Resolve a stored image reference to a browser URL.
///
/// Absolute `http(s)` URLs pass through, relative paths become root-relative.
#[must_use]
pub fn image_src(image: &str) -> String {
    if image.starts_with("http://") || image.starts_with("https://") || image.starts_with('/') {
        image.to_owned()
    } else {
        format!("/{image}")
    }
}

/// An extra gallery image of a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct ProductImage {
    pub id: ProductImageId,
    pub product_id: ProductId,
    pub image: String,
    pub created_at: DateTime<Utc>,
}

impl ProductImage {
    #[must_use]
    pub fn image_src(&self) -> String {
        image_src(&self.image)
    }
}

/// A key/value attribute row shown on the product page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct ProductAttribute {
    pub id: ProductAttributeId,
    pub product_id: ProductId,
    pub key: String,
    pub value: String,
}

/// A product in a guest's cart. Lines older than a day are purged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct CartItem {
    pub id: CartItemId,
    pub guest_id: GuestId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// A cart line joined with the product it points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct CartLine {
    pub id: CartItemId,
    pub guest_id: GuestId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub price: Decimal,
    pub discount: Decimal,
    pub stock: i32,
    pub image: String,
}

impl CartLine {
    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        apply_discount(self.price, self.discount)
    }

    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price() * Decimal::from(self.quantity)
    }

    #[must_use]
    pub fn image_src(&self) -> String {
        image_src(&self.image)
    }
}

/// Sum of line totals.
#[must_use]
pub fn cart_subtotal(lines: &[CartLine]) -> Decimal {
    lines.iter().map(CartLine::line_total).sum()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Order {
    pub id: OrderId,
    pub guest_id: GuestId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub status: OrderStatus,
    /// Courier city identifier (`cities.city_id`).
    pub city: String,
    pub zone_id: String,
    pub district_id: String,
    pub business_reference: Option<String>,
    pub tracking_number: Option<String>,
    pub shipping_status: ShippingStatus,
    /// Amount the courier collects: discounted products plus shipping.
    pub cod_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub package_size: String,
    pub package_type: String,
    pub invoice_key: Option<String>,
    pub invoice_id: Option<String>,
    pub invoice_url: Option<String>,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

/// A purchased product, snapshotted at checkout.
///
/// `product_id` becomes `NULL` if the product is later deleted; name and
/// unit price stay as they were when the order was placed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// An order line joined with its product (when the product still exists).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct OrderLine {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub image: Option<String>,
    pub category_name: Option<String>,
}

impl OrderLine {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    #[must_use]
    pub fn image_src(&self) -> String {
        self.image.as_deref().map(image_src).unwrap_or_default()
    }
}

/// A discount code. Codes are managed directly in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct PromoCode {
    pub id: PromoCodeId,
    pub code: String,
    pub discount: Decimal,
    pub remaining_uses: i32,
    pub created_at: DateTime<Utc>,
}

/// Audit trail of shopper actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct ActivityLog {
    pub id: ActivityLogId,
    pub guest_id: Option<GuestId>,
    pub session_token: Option<String>,
    pub action: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct City {
    pub id: CityId,
    pub name: String,
    /// Courier-side identifier; zones, districts and prices hang off it.
    pub city_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    pub city_id: String,
    pub zone_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct District {
    pub id: DistrictId,
    pub name: String,
    pub city_id: String,
    pub district_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct ShippingCost {
    pub id: ShippingCostId,
    pub city_id: String,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A product scraped from a third-party retailer, awaiting import.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct DropshipProduct {
    pub id: DropshipProductId,
    pub source_url: String,
    pub source_site: Option<String>,
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// JSON array of gallery image URLs.
    pub additional_images: serde_json::Value,
    pub status: DropshipStatus,
    pub imported_product_id: Option<ProductId>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DropshipProduct {
    /// Gallery URLs, ignoring anything that is not a string.
    #[must_use]
    pub fn gallery(&self) -> Vec<String> {
        self.additional_images
            .as_array()
            .map(|urls| {
                urls.iter()
                    .filter_map(|u| u.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A home page hero slide.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct BannerSlide {
    pub id: BannerId,
    pub image_url: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub link_url: Option<String>,
    pub highlight_regular_price: Option<String>,
    pub highlight_sale_price: Option<String>,
    pub highlight_discount: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl BannerSlide {
    #[must_use]
    pub fn image_src(&self) -> String {
        image_src(&self.image_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: i64, discount: i64) -> Product {
        Product {
            id: ProductId::new(1),
            name: "زيت".to_owned(),
            description: String::new(),
            price: Decimal::from(price),
            discount: Decimal::from(discount),
            stock: 3,
            image: "static/uploads/a.png".to_owned(),
            views: 0,
            category_id: CategoryId::new(1),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_sale_price_applies_discount() {
        assert_eq!(product(300, 25).sale_price(), Decimal::from(225));
        assert_eq!(product(300, 0).sale_price(), Decimal::from(300));
        assert!(product(300, 25).has_discount());
        assert_eq!(product(300, 25).discount_label(), "25");
    }

    #[test]
    fn test_image_src() {
        assert_eq!(image_src("static/uploads/a.png"), "/static/uploads/a.png");
        assert_eq!(image_src("https://cdn.x/a.png"), "https://cdn.x/a.png");
        assert_eq!(image_src("/static/a.png"), "/static/a.png");
    }

    #[test]
    fn test_cart_subtotal_uses_sale_price() {
        let line = CartLine {
            id: CartItemId::new(1),
            guest_id: GuestId::new(1),
            product_id: ProductId::new(1),
            quantity: 2,
            created_at: Utc::now(),
            name: "سبراي".to_owned(),
            price: Decimal::from(200),
            discount: Decimal::from(10),
            stock: 5,
            image: String::new(),
        };
        assert_eq!(line.line_total(), Decimal::from(360));
        assert_eq!(cart_subtotal(&[line.clone(), line]), Decimal::from(720));
    }

    #[test]
    fn test_dropship_gallery_skips_non_strings() {
        let record = DropshipProduct {
            id: DropshipProductId::new(1),
            source_url: "https://example.com/p".to_owned(),
            source_site: None,
            name: None,
            price: None,
            description: None,
            image_url: None,
            additional_images: serde_json::json!(["https://a/1.jpg", 5, "https://a/2.jpg"]),
            status: DropshipStatus::Pending,
            imported_product_id: None,
            error_message: None,
            created_at: Utc::now(),
        };
        assert_eq!(record.gallery(), vec!["https://a/1.jpg", "https://a/2.jpg"]);
    }
}
