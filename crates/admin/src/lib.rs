//! Souq Admin library.
//!
//! The back-office as a library so routes, repositories and services can be
//! tested without starting the server.
//!
//! # Security
//!
//! Admin routes can change the catalogue, orders and courier shipments.
//! Every handler outside `/admin/login` requires an authenticated admin session.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod flash;
pub mod middleware;
pub mod models;
pub mod page;
pub mod routes;
pub mod services;
pub mod state;
