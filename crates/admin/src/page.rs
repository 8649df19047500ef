//! Layout data for admin pages.

use tower_sessions::Session;

use crate::error::Result;
use crate::flash::{self, Flash};
use crate::middleware::csrf_token;
use crate::models::CurrentAdmin;

/// What `base.html` needs: the signed-in admin, pending notices, the CSRF
/// token and the current path for the active menu entry.
#[derive(Debug, Clone)]
pub struct AdminPage {
    pub admin: CurrentAdmin,
    pub flashes: Vec<Flash>,
    pub csrf_token: String,
    pub current_path: &'static str,
}

impl AdminPage {
    /// Build the layout context, draining pending notices.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Session` if the session store fails.
    pub async fn load(session: &Session, admin: CurrentAdmin, current_path: &'static str) -> Result<Self> {
        let csrf_token = csrf_token(session).await?;
        let flashes = flash::take(session).await;
        Ok(Self {
            admin,
            flashes,
            csrf_token,
            current_path,
        })
    }

    /// Whether `prefix` is the active menu section.
    #[must_use]
    pub fn is_active(&self, prefix: &str) -> bool {
        if prefix == "/admin/" {
            self.current_path == prefix
        } else {
            self.current_path.starts_with(prefix)
        }
    }
}
