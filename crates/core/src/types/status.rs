//! Status enums for orders, payments and imports.
//!
//! Each enum has a stable wire value (stored in Postgres enum columns and sent
//! in forms) and an Arabic label for display.

use serde::{Deserialize, Serialize};

/// Error returned when a wire value does not match any variant.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct InvalidStatus {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Overall order state, set by the back-office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [Self; 3] = [Self::Pending, Self::Completed, Self::Cancelled];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "قيد الانتظار",
            Self::Completed => "مكتمل",
            Self::Cancelled => "ملغي",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| InvalidStatus {
                kind: "order status",
                value: s.to_owned(),
            })
    }
}

/// Delivery progress of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shipping_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ShippingStatus {
    #[default]
    Pending,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

impl ShippingStatus {
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
        Self::Returned,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Returned => "returned",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "قيد الانتظار",
            Self::Shipped => "تم الشحن",
            Self::Delivered => "تم التوصيل",
            Self::Cancelled => "ملغي",
            Self::Returned => "تم الإرجاع",
        }
    }

    /// Whether the order's items are back on the shelf in this state.
    ///
    /// Stock is restored when an order enters one of these states and taken
    /// again when it leaves.
    #[must_use]
    pub const fn is_restocked(self) -> bool {
        matches!(self, Self::Cancelled | Self::Returned)
    }

    /// Whether the order's items are currently counted out of stock, so that
    /// deleting the order or one of its lines must put them back.
    #[must_use]
    pub const fn holds_stock(self) -> bool {
        !self.is_restocked()
    }

    /// Stock adjustment for moving an order from `self` to `next`.
    #[must_use]
    pub const fn stock_move(self, next: Self) -> StockMove {
        match (self.holds_stock(), next.holds_stock()) {
            (true, false) => StockMove::Restore,
            (false, true) => StockMove::Take,
            _ => StockMove::Keep,
        }
    }
}

/// What happens to an order's items when its shipping status changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockMove {
    /// Put the items back on the shelf.
    Restore,
    /// Count the items out of stock again.
    Take,
    Keep,
}

impl std::fmt::Display for ShippingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ShippingStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| InvalidStatus {
                kind: "shipping status",
                value: s.to_owned(),
            })
    }
}

/// Payment state, driven by the gateway callbacks for card payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
    Expired,
}

impl PaymentStatus {
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Paid,
        Self::Failed,
        Self::Refunded,
        Self::Expired,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
            Self::Expired => "expired",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "قيد الانتظار",
            Self::Paid => "تم الدفع",
            Self::Failed => "فشل الدفع",
            Self::Refunded => "تم الاسترجاع",
            Self::Expired => "منتهي الصلاحية",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| InvalidStatus {
                kind: "payment status",
                value: s.to_owned(),
            })
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    CashOnDelivery,
    VodafoneCash,
    Visa,
}

impl PaymentMethod {
    pub const ALL: [Self; 3] = [Self::CashOnDelivery, Self::VodafoneCash, Self::Visa];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CashOnDelivery => "cash_on_delivery",
            Self::VodafoneCash => "vodafone_cash",
            Self::Visa => "visa",
        }
    }

    /// Label shown on order pages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CashOnDelivery => "الدفع عند الاستلام",
            Self::VodafoneCash => "فودافون كاش",
            Self::Visa => "الدفع بالفيزا",
        }
    }

    /// Label used in the admin order filter.
    #[must_use]
    pub const fn filter_label(self) -> &'static str {
        match self {
            Self::Visa => "فيزا / ماستركارد",
            other => other.label(),
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| InvalidStatus {
                kind: "payment method",
                value: s.to_owned(),
            })
    }
}

/// Lifecycle of a scraped dropshipping record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "dropship_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum DropshipStatus {
    #[default]
    Pending,
    Imported,
    Error,
}

impl DropshipStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Imported => "imported",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for DropshipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_through_wire_value() {
        for status in ShippingStatus::ALL {
            assert_eq!(status.as_str().parse::<ShippingStatus>().unwrap(), status);
        }
        for method in PaymentMethod::ALL {
            assert_eq!(method.to_string().parse::<PaymentMethod>().unwrap(), method);
        }
    }

    #[test]
    fn test_unknown_values_rejected() {
        let err = "bitcoin".parse::<PaymentMethod>().unwrap_err();
        assert_eq!(err.kind, "payment method");
        assert!("lost".parse::<ShippingStatus>().is_err());
        assert!("".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn test_arabic_labels() {
        assert_eq!(ShippingStatus::Delivered.label(), "تم التوصيل");
        assert_eq!(PaymentMethod::CashOnDelivery.label(), "الدفع عند الاستلام");
        assert_eq!(PaymentMethod::Visa.filter_label(), "فيزا / ماستركارد");
        assert_eq!(
            PaymentMethod::VodafoneCash.filter_label(),
            PaymentMethod::VodafoneCash.label()
        );
    }

    #[test]
    fn test_restocked_states() {
        assert!(ShippingStatus::Cancelled.is_restocked());
        assert!(ShippingStatus::Returned.is_restocked());
        assert!(!ShippingStatus::Shipped.is_restocked());
    }

    /// Replays status changes for an order of `qty` units placed from
    /// `initial` stock, optionally deleting it at the end.
    fn replay(initial: i32, qty: i32, path: &[ShippingStatus], delete: bool) -> i32 {
        let mut stock = initial - qty;
        let mut current = ShippingStatus::Pending;
        for &next in path {
            match current.stock_move(next) {
                StockMove::Restore => stock += qty,
                StockMove::Take => stock -= qty,
                StockMove::Keep => {}
            }
            current = next;
        }
        if delete && current.holds_stock() {
            stock += qty;
        }
        stock
    }

    #[test]
    fn test_stock_moves() {
        use ShippingStatus::{Cancelled, Delivered, Pending, Returned, Shipped};
        assert_eq!(Pending.stock_move(Cancelled), StockMove::Restore);
        assert_eq!(Shipped.stock_move(Returned), StockMove::Restore);
        assert_eq!(Returned.stock_move(Shipped), StockMove::Take);
        assert_eq!(Cancelled.stock_move(Returned), StockMove::Keep);
        assert_eq!(Pending.stock_move(Delivered), StockMove::Keep);
    }

    #[test]
    fn test_cancel_then_delete_restores_once() {
        assert_eq!(replay(10, 2, &[ShippingStatus::Cancelled], true), 10);
    }

    #[test]
    fn test_delete_pending_restores() {
        assert_eq!(replay(10, 2, &[], true), 10);
        assert_eq!(replay(10, 2, &[ShippingStatus::Shipped], true), 10);
    }

    #[test]
    fn test_returned_order_shipped_again_takes_stock() {
        use ShippingStatus::{Cancelled, Returned, Shipped};
        assert_eq!(replay(10, 2, &[Returned], false), 10);
        assert_eq!(replay(10, 2, &[Returned, Shipped], false), 8);
        assert_eq!(replay(10, 2, &[Returned, Shipped, Cancelled], false), 10);
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&PaymentMethod::CashOnDelivery).unwrap();
        assert_eq!(json, "\"cash_on_delivery\"");
    }
}
