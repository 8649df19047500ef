//! Checkout discount rules.
//!
//! Three rules exist:
//!
//! - **Combo free shipping**: products 1, 2 and 3 together ship free.
//! - **Promotional discount**: a fixed percentage off every order during a
//!   date window.
//! - **Eid shipping offer**: during a date window, carts containing product 4
//!   ship free to a set of governorates and at half price elsewhere.
//!
//! The Eid offer takes priority over the combo rule. All windows are compared
//! against the store's local wall-clock time.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::{ProductId, percent_of};

const COMBO_PRODUCTS: [i32; 3] = [1, 2, 3];
const EID_PACKAGE_PRODUCT: i32 = 4;

/// Governorates that get free shipping during the Eid offer, as spelled in
/// the courier's city list.
pub const EID_FREE_SHIPPING_CITIES: [&str; 4] = ["الاسكندريه", "القاهره", "الجيزه", "البحيره"];

pub const PROMO_PERCENT: i64 = 10;
pub const PROMO_MESSAGE: &str = "خصم 10% على جميع الطلبات! 🎉";
/// Label of the negative line item sent to the payment gateway.
pub const PROMO_LINE_ITEM: &str = "خصم 10% - عرض خاص";

pub const EID_FREE_MESSAGE: &str = "🎉 شحن مجاني - عرض عيد الأضحى على باقة العناية الكاملة";
pub const EID_HALF_MESSAGE: &str = "🎉 خصم 50% على الشحن - عرض عيد الأضحى على باقة العناية الكاملة";
pub const COMBO_MESSAGE: &str = "Free shipping - Special offer for products #1, #2, and #3";

/// An inclusive local-time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl OfferWindow {
    /// Window from midnight on `start` to 23:59:59 on `end`.
    #[must_use]
    pub fn days(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: start.and_time(chrono::NaiveTime::MIN),
            end: end.and_hms_opt(23, 59, 59).unwrap_or(end.and_time(chrono::NaiveTime::MIN)),
        }
    }

    #[must_use]
    pub fn contains(&self, now: NaiveDateTime) -> bool {
        now >= self.start && now <= self.end
    }
}

/// 10% off everything, 4 to 9 January 2026.
#[must_use]
pub fn promo_window() -> OfferWindow {
    window(2026, 1, 4, 9)
}

/// Eid al-Adha shipping offer, 5 to 11 June 2025.
#[must_use]
pub fn eid_window() -> OfferWindow {
    window(2025, 6, 5, 11)
}

fn window(year: i32, month: u32, first: u32, last: u32) -> OfferWindow {
    let start = NaiveDate::from_ymd_opt(year, month, first).unwrap_or_default();
    let end = NaiveDate::from_ymd_opt(year, month, last).unwrap_or_default();
    OfferWindow::days(start, end)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComboDiscount {
    pub eligible: bool,
    pub discount_type: Option<&'static str>,
}

/// Products 1, 2 and 3 all present in the cart.
#[must_use]
pub fn combo_free_shipping(products: &[ProductId]) -> ComboDiscount {
    let eligible = COMBO_PRODUCTS
        .iter()
        .all(|wanted| products.iter().any(|p| p.as_i32() == *wanted));
    ComboDiscount {
        eligible,
        discount_type: eligible.then_some("combo_1_2_3"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PromoDiscount {
    pub eligible: bool,
    pub percent: Decimal,
    pub message: Option<&'static str>,
}

impl PromoDiscount {
    /// Amount taken off `subtotal`.
    #[must_use]
    pub fn amount_off(&self, subtotal: Decimal) -> Decimal {
        if self.eligible {
            percent_of(subtotal, self.percent)
        } else {
            Decimal::ZERO
        }
    }
}

#[must_use]
pub fn promotional_discount(now: NaiveDateTime) -> PromoDiscount {
    if promo_window().contains(now) {
        PromoDiscount {
            eligible: true,
            percent: Decimal::from(PROMO_PERCENT),
            message: Some(PROMO_MESSAGE),
        }
    } else {
        PromoDiscount {
            eligible: false,
            percent: Decimal::ZERO,
            message: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EidOffer {
    pub eligible: bool,
    /// Fraction of the shipping price waived: `1` free, `0.5` half.
    pub discount: Decimal,
    pub message: Option<&'static str>,
    /// The window is open, regardless of cart contents.
    pub offer_active: bool,
    pub offer_type: Option<&'static str>,
}

impl EidOffer {
    const fn inactive(offer_active: bool) -> Self {
        Self {
            eligible: false,
            discount: Decimal::ZERO,
            message: None,
            offer_active,
            offer_type: None,
        }
    }
}

/// Evaluate the Eid offer for a cart shipping to `city_name`.
#[must_use]
pub fn eid_shipping_offer(products: &[ProductId], city_name: &str, now: NaiveDateTime) -> EidOffer {
    if !eid_window().contains(now) {
        return EidOffer::inactive(false);
    }
    if !products.iter().any(|p| p.as_i32() == EID_PACKAGE_PRODUCT) {
        return EidOffer::inactive(true);
    }

    let city = city_name.to_lowercase();
    if EID_FREE_SHIPPING_CITIES.iter().any(|c| city.contains(&c.to_lowercase())) {
        EidOffer {
            eligible: true,
            discount: Decimal::ONE,
            message: Some(EID_FREE_MESSAGE),
            offer_active: true,
            offer_type: Some("eid_free_shipping"),
        }
    } else {
        EidOffer {
            eligible: true,
            discount: Decimal::new(5, 1),
            message: Some(EID_HALF_MESSAGE),
            offer_active: true,
            offer_type: Some("eid_50_percent"),
        }
    }
}

/// Shipping price after discounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShippingQuote {
    pub shipping_cost: Decimal,
    pub standard_cost: Decimal,
    pub discount_applied: bool,
    pub discount_message: Option<&'static str>,
    pub eid_offer_active: bool,
    pub eid_offer_type: Option<&'static str>,
}

/// Apply the Eid offer, falling back to the combo rule.
#[must_use]
pub fn quote_shipping(standard: Decimal, eid: &EidOffer, combo: &ComboDiscount) -> ShippingQuote {
    let (shipping_cost, discount_applied, discount_message) = if eid.eligible {
        (standard - standard * eid.discount, true, eid.message)
    } else if combo.eligible {
        (Decimal::ZERO, true, Some(COMBO_MESSAGE))
    } else {
        (standard, false, None)
    };

    ShippingQuote {
        shipping_cost,
        standard_cost: standard,
        discount_applied,
        discount_message,
        eid_offer_active: eid.offer_active,
        eid_offer_type: eid.offer_type,
    }
}

/// Products total after the promotional discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckoutTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub products_total: Decimal,
}

#[must_use]
pub fn checkout_totals(subtotal: Decimal, promo: &PromoDiscount) -> CheckoutTotals {
    let discount_amount = promo.amount_off(subtotal);
    CheckoutTotals {
        subtotal,
        discount_amount,
        products_total: subtotal - discount_amount,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn ids(raw: &[i32]) -> Vec<ProductId> {
        raw.iter().copied().map(ProductId::new).collect()
    }

    #[test]
    fn test_combo_requires_all_three() {
        assert!(combo_free_shipping(&ids(&[3, 1, 2, 9])).eligible);
        assert_eq!(
            combo_free_shipping(&ids(&[1, 2, 3])).discount_type,
            Some("combo_1_2_3")
        );
        let partial = combo_free_shipping(&ids(&[1, 2]));
        assert!(!partial.eligible);
        assert_eq!(partial.discount_type, None);
    }

    #[test]
    fn test_promo_window_bounds_inclusive() {
        assert!(promotional_discount(at(2026, 1, 4, 0, 0, 0)).eligible);
        assert!(promotional_discount(at(2026, 1, 9, 23, 59, 59)).eligible);
        assert!(!promotional_discount(at(2026, 1, 10, 0, 0, 0)).eligible);
        assert!(!promotional_discount(at(2026, 1, 3, 23, 59, 59)).eligible);
    }

    #[test]
    fn test_promo_amount() {
        let promo = promotional_discount(at(2026, 1, 5, 12, 0, 0));
        assert_eq!(promo.percent, Decimal::from(10));
        assert_eq!(promo.message, Some(PROMO_MESSAGE));
        let totals = checkout_totals(Decimal::from(500), &promo);
        assert_eq!(totals.discount_amount, Decimal::from(50));
        assert_eq!(totals.products_total, Decimal::from(450));
    }

    #[test]
    fn test_no_promo_outside_window() {
        let promo = promotional_discount(at(2026, 2, 1, 12, 0, 0));
        let totals = checkout_totals(Decimal::from(500), &promo);
        assert_eq!(totals.discount_amount, Decimal::ZERO);
        assert_eq!(totals.products_total, Decimal::from(500));
    }

    #[test]
    fn test_eid_offer_outside_window() {
        let offer = eid_shipping_offer(&ids(&[4]), "القاهره", at(2025, 6, 12, 0, 0, 0));
        assert!(!offer.eligible);
        assert!(!offer.offer_active);
    }

    #[test]
    fn test_eid_offer_without_package() {
        let offer = eid_shipping_offer(&ids(&[1]), "القاهره", at(2025, 6, 6, 10, 0, 0));
        assert!(!offer.eligible);
        assert!(offer.offer_active);
    }

    #[test]
    fn test_eid_offer_free_and_half() {
        let now = at(2025, 6, 8, 10, 0, 0);
        let free = eid_shipping_offer(&ids(&[4]), "محافظة الجيزه", now);
        assert_eq!(free.discount, Decimal::ONE);
        assert_eq!(free.offer_type, Some("eid_free_shipping"));

        let half = eid_shipping_offer(&ids(&[4]), "اسوان", now);
        assert_eq!(half.discount, Decimal::new(5, 1));
        assert_eq!(half.offer_type, Some("eid_50_percent"));
    }

    #[test]
    fn test_quote_eid_beats_combo() {
        let now = at(2025, 6, 8, 10, 0, 0);
        let cart = ids(&[1, 2, 3, 4]);
        let eid = eid_shipping_offer(&cart, "اسوان", now);
        let combo = combo_free_shipping(&cart);
        let quote = quote_shipping(Decimal::from(100), &eid, &combo);
        assert_eq!(quote.shipping_cost, Decimal::from(50));
        assert_eq!(quote.discount_message, Some(EID_HALF_MESSAGE));
    }

    #[test]
    fn test_quote_combo_and_standard() {
        let now = at(2025, 8, 1, 10, 0, 0);
        let cart = ids(&[1, 2, 3]);
        let eid = eid_shipping_offer(&cart, "القاهره", now);
        let quote = quote_shipping(Decimal::from(80), &eid, &combo_free_shipping(&cart));
        assert_eq!(quote.shipping_cost, Decimal::ZERO);
        assert_eq!(quote.discount_message, Some(COMBO_MESSAGE));

        let plain = quote_shipping(
            Decimal::from(80),
            &eid,
            &combo_free_shipping(&ids(&[1])),
        );
        assert_eq!(plain.shipping_cost, Decimal::from(80));
        assert!(!plain.discount_applied);
    }
}
