//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// Format an amount in Egyptian pounds.
///
/// Usage in templates: `{{ order.cod_amount|currency }}`
#[askama::filter_fn]
pub fn currency(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(format_currency(&value.to_string()))
}

/// Format a timestamp as `2025-06-05 10:30 AM`.
#[askama::filter_fn]
pub fn date_format(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(format_date(&value.to_string()))
}

/// Escape a string for a JavaScript string literal.
#[askama::filter_fn]
pub fn escapejs(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(escape_js(&value.to_string()))
}

fn format_currency(raw: &str) -> String {
    souq_core::format_egp(Decimal::from_str(raw.trim()).unwrap_or_default())
}

fn format_date(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches(" UTC");
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f").map_or_else(
        |_| raw.to_owned(),
        |dt| dt.format("%Y-%m-%d %I:%M %p").to_string(),
    )
}

fn escape_js(raw: &str) -> String {
    raw.chars().fold(String::with_capacity(raw.len()), |mut out, ch| {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency("80"), "80.00 ج.م");
        assert_eq!(format_currency(""), "0.00 ج.م");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2025-01-09 23:15:00 UTC"), "2025-01-09 11:15 PM");
        assert_eq!(format_date("n/a"), "n/a");
    }

    #[test]
    fn test_escape_js() {
        assert_eq!(escape_js("a\tb\\"), "a\\tb\\\\");
    }
}
