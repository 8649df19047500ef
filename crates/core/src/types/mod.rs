//! Core types for Souq.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod status;

pub use id::*;
pub use money::{apply_discount, format_egp, percent_of};
pub use status::*;
