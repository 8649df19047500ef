//! New-order notifications posted to a Discord webhook.

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use thiserror::Error;

use souq_core::PaymentMethod;
use souq_core::models::{Order, OrderLine};

use crate::config::StoreConfig;

/// Errors that can occur when posting a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

const PRODUCT_EMOJIS: [(&str, &str); 16] = [
    ("زيت", "🌿"),
    ("oil", "🌿"),
    ("سبراي", "💨"),
    ("spray", "💨"),
    ("سيروم", "✨"),
    ("serum", "✨"),
    ("كريم", "🧴"),
    ("cream", "🧴"),
    ("شامبو", "🧴"),
    ("shampoo", "🧴"),
    ("بلسم", "💧"),
    ("conditioner", "💧"),
    ("ماسك", "🎭"),
    ("mask", "🎭"),
    ("لوشن", "🧴"),
    ("lotion", "🧴"),
];

fn product_emoji(name: &str) -> &'static str {
    let name = name.to_lowercase();
    PRODUCT_EMOJIS
        .iter()
        .find(|(keyword, _)| name.contains(keyword))
        .map_or("🛍️", |(_, emoji)| emoji)
}

struct PaymentStyle {
    emoji: &'static str,
    text_en: &'static str,
    text_ar: &'static str,
    color: u32,
}

const fn payment_style(method: PaymentMethod) -> PaymentStyle {
    match method {
        PaymentMethod::Visa => PaymentStyle {
            emoji: "💳",
            text_en: "Credit Card",
            text_ar: "بطاقة ائتمان",
            color: 0x0042_85f4,
        },
        PaymentMethod::VodafoneCash => PaymentStyle {
            emoji: "📱",
            text_en: "Vodafone Cash",
            text_ar: "فودافون كاش",
            color: 0x00e6_0000,
        },
        PaymentMethod::CashOnDelivery => PaymentStyle {
            emoji: "💵",
            text_en: "Cash on Delivery",
            text_ar: "الدفع عند الاستلام",
            color: 0x0034_a853,
        },
    }
}

/// `wa.me` link for a customer phone number.
#[must_use]
pub fn whatsapp_link(phone: &str) -> String {
    let mut digits: String = phone.chars().filter(|c| *c != ' ' && *c != '+').collect();
    if !digits.starts_with('2') {
        digits.insert(0, '2');
    }
    format!("https://wa.me/{digits}")
}

fn whole(value: Decimal) -> String {
    value.round().normalize().to_string()
}

/// Build the webhook message for a new order.
#[must_use]
pub fn order_message(
    order: &Order,
    lines: &[OrderLine],
    city_name: Option<&str>,
    shipping_price: Decimal,
    store: &StoreConfig,
) -> Value {
    let mut products_total = Decimal::ZERO;
    let mut items_count = 0;
    let mut details = Vec::with_capacity(lines.len());
    for line in lines {
        let line_total = line.line_total();
        products_total += line_total;
        items_count += line.quantity;
        details.push(format!(
            "{} **{}**\n   └ Qty: `{}` × `{} EGP` = **{} EGP**",
            product_emoji(&line.product_name),
            line.product_name,
            line.quantity,
            whole(line.unit_price),
            whole(line_total),
        ));
    }
    let total = products_total + shipping_price;

    let payment = payment_style(order.payment_method);
    let whatsapp = whatsapp_link(&order.phone);
    let admin_url = &store.admin_url;
    let logo = &store.logo_url;
    let email = if order.email.trim().is_empty() {
        "Not provided | غير متوفر"
    } else {
        order.email.as_str()
    };

    let items = if details.is_empty() {
        "❌ No products found".to_owned()
    } else {
        details.join("\n")
    };

    let embed = json!({
        "title": format!("🎉 New Order Received! | طلب جديد وصل! #{}", order.id),
        "description": format!(
            "### 🌟 A new customer has placed an order for our premium products!\n\
             ### عميل جديد قام بطلب منتجاتنا المميزة!\n\n\
             > 💼 **[Order Management | إدارة الطلبات]({admin_url})**\n\
             > 📱 **[WhatsApp Contact | تواصل واتساب]({whatsapp})**"
        ),
        "color": payment.color,
        "fields": [
            {
                "name": "👤 Customer Information | بيانات العميل",
                "value": format!(
                    "```yaml\n\
                     Name     | الاسم    : {}\n\
                     Phone    | الهاتف   : {}\n\
                     Email    | الإيميل  : {email}\n\
                     City     | المدينة  : {}\n\
                     Address  | العنوان  : {}\n\
                     ```",
                    order.name,
                    order.phone,
                    city_name.unwrap_or("Unknown City"),
                    order.address,
                ),
                "inline": false,
            },
            {
                "name": "🛒 Order Items | منتجات الطلب",
                "value": items,
                "inline": false,
            },
            {
                "name": "💰 Financial Summary | الملخص المالي",
                "value": format!(
                    "```diff\n\
                     + Products Value | قيمة المنتجات: {} EGP\n\
                     + Shipping Cost | رسوم الشحن   : {} EGP\n\
                     - - - - - - - - - - - - - - - - - - - - - - - -\n\
                     = Total Amount  | الإجمالي      : {} EGP\n\
                     ```",
                    whole(products_total),
                    whole(shipping_price),
                    whole(total),
                ),
                "inline": true,
            },
            {
                "name": "📊 Order Details | تفاصيل الطلب",
                "value": format!(
                    "{} **Payment | الدفع:** {} | {}\n\
                     📦 **Items Count | عدد القطع:** {items_count}\n\
                     🕐 **Time | التوقيت:** {}\n\
                     🆔 **Order ID | رقم الطلب:** `#{}`\n\
                     🏪 **Store | المتجر:** {}",
                    payment.emoji,
                    payment.text_en,
                    payment.text_ar,
                    order.created_at.format("%d/%m/%Y - %H:%M"),
                    order.id,
                    store.name,
                ),
                "inline": true,
            },
        ],
        "thumbnail": { "url": logo },
        "image": { "url": logo },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "footer": {
            "text": format!("💎 {} - Premium Products | منتجات مميزة", store.name),
            "icon_url": logo,
        },
        "author": {
            "name": "Order Management System | نظام إدارة الطلبات",
            "icon_url": logo,
            "url": admin_url,
        },
    });

    json!({
        "username": format!("🌟 {}", store.name),
        "content": format!(
            "@everyone 🔔 **NEW ORDER ALERT | تنبيه طلب جديد**\n\
             📋 **Order #{}** | **Customer:** {} | **Amount:** {} EGP\n\
             🎯 **Payment:** {} | {}",
            order.id,
            order.name,
            whole(total),
            payment.text_en,
            payment.text_ar,
        ),
        "embeds": [embed],
    })
}

/// Discord webhook client. Does nothing when no webhook URL is configured.
#[derive(Clone)]
pub struct DiscordNotifier {
    client: reqwest::Client,
    webhook_url: Option<SecretString>,
}

impl DiscordNotifier {
    /// Create a notifier sharing the given HTTP client.
    #[must_use]
    pub const fn new(client: reqwest::Client, webhook_url: Option<SecretString>) -> Self {
        Self {
            client,
            webhook_url,
        }
    }

    /// Whether a webhook is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Post a message.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError` on transport failure or any status other than 204.
    pub async fn send(&self, message: &Value) -> Result<(), NotifyError> {
        let Some(url) = self.webhook_url.as_ref() else {
            return Ok(());
        };

        let response = self
            .client
            .post(url.expose_secret())
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::NO_CONTENT {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_emoji_by_keyword() {
        assert_eq!(product_emoji("زيت الأرغان"), "🌿");
        assert_eq!(product_emoji("Hair SERUM"), "✨");
        assert_eq!(product_emoji("ماسك الشعر"), "🎭");
        assert_eq!(product_emoji("مشط"), "🛍️");
    }

    #[test]
    fn test_whatsapp_link_normalizes_phone() {
        assert_eq!(whatsapp_link("+20 100 123 4567"), "https://wa.me/201001234567");
        assert_eq!(whatsapp_link("01001234567"), "https://wa.me/201001234567");
    }

    #[test]
    fn test_payment_style_colors() {
        assert_eq!(payment_style(PaymentMethod::Visa).color, 0x4285f4);
        assert_eq!(payment_style(PaymentMethod::VodafoneCash).color, 0xe60000);
        assert_eq!(payment_style(PaymentMethod::CashOnDelivery).color, 0x34a853);
    }
}
