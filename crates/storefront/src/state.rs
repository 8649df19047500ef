//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use souq_core::models::Category;

use crate::config::StorefrontConfig;
use crate::db::{CatalogRepository, RepositoryError};
use crate::services::{DiscordNotifier, PaymentClient, PaymentError};

/// How long the navigation category list is reused.
const NAV_CACHE_TTL: Duration = Duration::from_secs(60);

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    payment: PaymentClient,
    notifier: DiscordNotifier,
    nav_categories: Cache<(), Arc<Vec<Category>>>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, PaymentError> {
        let payment = PaymentClient::new(&config.payment)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        let notifier = DiscordNotifier::new(http, config.discord_webhook_url.clone());
        let nav_categories = Cache::builder()
            .max_capacity(1)
            .time_to_live(NAV_CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                payment,
                notifier,
                nav_categories,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get the payment gateway client.
    #[must_use]
    pub fn payment(&self) -> &PaymentClient {
        &self.inner.payment
    }

    /// Get the order notifier.
    #[must_use]
    pub fn notifier(&self) -> &DiscordNotifier {
        &self.inner.notifier
    }

    /// Categories for the site navigation, cached briefly.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the categories cannot be loaded.
    pub async fn nav_categories(&self) -> Result<Arc<Vec<Category>>, RepositoryError> {
        if let Some(cached) = self.inner.nav_categories.get(&()).await {
            return Ok(cached);
        }
        let categories = Arc::new(CatalogRepository::new(self.pool()).categories().await?);
        self.inner
            .nav_categories
            .insert((), Arc::clone(&categories))
            .await;
        Ok(categories)
    }
}
