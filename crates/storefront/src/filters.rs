//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// Format an amount in Egyptian pounds.
///
/// Usage in templates: `{{ product.price|currency }}`
#[askama::filter_fn]
pub fn currency(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(format_currency(&value.to_string()))
}

/// Format a timestamp as `2025-06-05 10:30 AM`.
///
/// Usage in templates: `{{ order.created_at|date_format }}`
#[askama::filter_fn]
pub fn date_format(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(format_date(&value.to_string()))
}

/// Escape a string for use inside a JavaScript string literal.
#[askama::filter_fn]
pub fn escapejs(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(escape_js(&value.to_string()))
}

/// Browser URL for a stored image reference.
///
/// Usage in templates: `<img src="{{ product.image|image_src }}">`
#[askama::filter_fn]
pub fn image_src(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(souq_core::models::image_src(&value.to_string()))
}

fn format_currency(raw: &str) -> String {
    let value = Decimal::from_str(raw.trim()).unwrap_or_default();
    souq_core::format_egp(value)
}

fn format_date(raw: &str) -> String {
    // `DateTime<Utc>` displays as `2025-06-05 10:30:00.123 UTC`
    let trimmed = raw.trim().trim_end_matches(" UTC");
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f").map_or_else(
        |_| raw.to_owned(),
        |dt| dt.format("%Y-%m-%d %I:%M %p").to_string(),
    )
}

fn escape_js(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency("1234.5"), "1,234.50 ج.م");
        assert_eq!(format_currency("abc"), "0.00 ج.م");
    }

    #[test]
    fn test_format_date_from_display() {
        let dt = chrono::DateTime::parse_from_rfc3339("2025-06-05T14:07:00Z")
            .map(|d| d.with_timezone(&chrono::Utc));
        if let Ok(dt) = dt {
            assert_eq!(format_date(&dt.to_string()), "2025-06-05 02:07 PM");
        }
        assert_eq!(format_date("yesterday"), "yesterday");
    }

    #[test]
    fn test_escape_js() {
        assert_eq!(escape_js("it's \"x\"\n"), "it\\'s \\\"x\\\"\\n");
        assert_eq!(escape_js(""), "");
    }
}
