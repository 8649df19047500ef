//! Session-stored admin identity.

use serde::{Deserialize, Serialize};

use souq_core::AdminId;
use souq_core::models::Admin;

/// Minimal data stored in the session to identify the logged-in admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentAdmin {
    pub id: AdminId,
    pub email: String,
    pub name: String,
}

impl From<&Admin> for CurrentAdmin {
    fn from(admin: &Admin) -> Self {
        Self {
            id: admin.id,
            email: admin.email.clone(),
            name: admin.name.clone(),
        }
    }
}

/// Session keys for admin authentication data.
pub mod keys {
    /// Key for storing the current logged-in admin.
    pub const CURRENT_ADMIN: &str = "current_admin";
}
