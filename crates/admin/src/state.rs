//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::config::AdminConfig;
use crate::services::{BostaClient, BostaError, ProductScraper, ScrapeError};

/// Timeout for image downloads during dropshipping imports.
const IMAGE_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(15);

/// Failures while building the state's HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error(transparent)]
    Bosta(#[from] BostaError),
    #[error(transparent)]
    Scrape(#[from] ScrapeError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    bosta: BostaClient,
    scraper: ProductScraper,
    http: reqwest::Client,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns `StateError` if an HTTP client cannot be built.
    pub fn new(config: AdminConfig, pool: PgPool) -> Result<Self, StateError> {
        let bosta = BostaClient::new(&config.bosta)?;
        let scraper = ProductScraper::new()?;
        let http = reqwest::Client::builder()
            .timeout(IMAGE_DOWNLOAD_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                bosta,
                scraper,
                http,
            }),
        })
    }

    /// Get a reference to the admin configuration.
    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get the courier client.
    #[must_use]
    pub fn bosta(&self) -> &BostaClient {
        &self.inner.bosta
    }

    /// Get the product page scraper.
    #[must_use]
    pub fn scraper(&self) -> &ProductScraper {
        &self.inner.scraper
    }

    /// Get the HTTP client used for image downloads.
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }
}
