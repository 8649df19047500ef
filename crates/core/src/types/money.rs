//! Money helpers for Egyptian pound amounts.
//!
//! Amounts are plain [`Decimal`] values in pounds (not piastres). Percentages
//! are expressed as whole numbers, so `10` means ten percent.

use rust_decimal::{Decimal, RoundingStrategy};

/// Currency suffix used throughout the shop.
pub const EGP_SUFFIX: &str = "ج.م";

/// Apply a percentage discount to a price.
///
/// A zero or negative discount returns the price unchanged.
///
/// ```
/// use rust_decimal::Decimal;
/// use souq_core::apply_discount;
///
/// assert_eq!(apply_discount(Decimal::from(200), Decimal::from(25)), Decimal::from(150));
/// ```
#[must_use]
pub fn apply_discount(price: Decimal, percent: Decimal) -> Decimal {
    if percent <= Decimal::ZERO {
        return price;
    }
    price * (Decimal::ONE - percent / Decimal::ONE_HUNDRED)
}

/// Return `percent` percent of `amount`.
#[must_use]
pub fn percent_of(amount: Decimal, percent: Decimal) -> Decimal {
    amount * percent / Decimal::ONE_HUNDRED
}

/// Format an amount as `1,234.50 ج.م`.
#[must_use]
pub fn format_egp(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{fraction} {EGP_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_apply_discount() {
        assert_eq!(
            apply_discount(Decimal::from(300), Decimal::from(25)),
            Decimal::from(225)
        );
        assert_eq!(
            apply_discount(Decimal::from(300), Decimal::ZERO),
            Decimal::from(300)
        );
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(
            percent_of(Decimal::from(450), Decimal::from(10)),
            Decimal::from(45)
        );
    }

    #[test]
    fn test_format_egp_groups_thousands() {
        assert_eq!(format_egp(Decimal::new(123_450, 2)), "1,234.50 ج.م");
        assert_eq!(format_egp(Decimal::from(1_000_000)), "1,000,000.00 ج.م");
        assert_eq!(format_egp(Decimal::from(999)), "999.00 ج.م");
    }

    #[test]
    fn test_format_egp_rounds_and_signs() {
        assert_eq!(format_egp(Decimal::new(10_005, 3)), "10.01 ج.م");
        assert_eq!(format_egp(Decimal::new(-150_000, 2)), "-1,500.00 ج.م");
        assert_eq!(format_egp(Decimal::ZERO), "0.00 ج.م");
    }
}
