//! Admin-only models. Shared records live in `souq_core::models`.

pub mod session;

pub use session::{CurrentAdmin, keys as session_keys};
