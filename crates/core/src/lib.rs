//! Souq Core - Shared domain library.
//!
//! This crate provides the types and business rules used across all Souq
//! components:
//! - `storefront` - Public shop (catalog, cart, checkout, payment callbacks)
//! - `admin` - Back-office for products, orders, shipping and imports
//! - `cli` - Command-line tools for migrations, seeding and maintenance
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Rules that depend on the clock take `now` as an
//! argument so they can be evaluated for any moment.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, money helpers, and status enums
//! - [`models`] - Database records shared by the storefront and admin
//! - [`pricing`] - Shipping discounts and promotional windows
//! - [`secret`] - Session secret strength checks
//! - [`time_ago`] - Arabic relative timestamps

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod models;
pub mod pricing;
pub mod secret;
pub mod time_ago;
pub mod types;

pub use types::*;
