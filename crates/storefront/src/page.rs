//! Data every storefront page template needs.

use std::sync::Arc;

use tower_sessions::Session;

use souq_core::models::Category;

use crate::error::Result;
use crate::flash::{self, Flash};
use crate::middleware::{GuestContext, csrf_token};
use crate::state::AppState;

/// Shared layout context: navigation, cart badge, flashes and the CSRF token.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub flashes: Vec<Flash>,
    pub csrf_token: String,
    pub categories: Arc<Vec<Category>>,
    pub cart_count: i64,
    pub store_name: String,
    pub admin_phone: String,
}

impl PageContext {
    /// Build the layout context, draining pending flash messages.
    ///
    /// # Errors
    ///
    /// Returns `AppError` if the session store or the category query fails.
    pub async fn load(state: &AppState, session: &Session, guest: &GuestContext) -> Result<Self> {
        let categories = state.nav_categories().await?;
        let csrf_token = csrf_token(session).await?;
        let flashes = flash::take(session).await;
        let store = &state.config().store;

        Ok(Self {
            flashes,
            csrf_token,
            categories,
            cart_count: guest.cart_count,
            store_name: store.name.clone(),
            admin_phone: store.admin_phone.clone(),
        })
    }
}
