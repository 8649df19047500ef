//! Souq storefront library.
//!
//! The public shop: catalog, cart, checkout and payment callbacks for
//! anonymous guests. The binary in `main.rs` wires these modules into an
//! Axum server; exposing them as a library keeps them testable.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod flash;
pub mod middleware;
pub mod page;
pub mod routes;
pub mod services;
pub mod state;
