//! Outbound integrations for the storefront.
//!
//! - `payment` - Fawaterak hosted invoices for card payments
//! - `notify` - Discord new-order notifications

pub mod notify;
pub mod payment;

pub use notify::{DiscordNotifier, NotifyError};
pub use payment::{PaymentClient, PaymentError};
