//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront, used for payment callbacks
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `SOUQ_MEDIA_ROOT` - Directory containing `static/` (default: `crates/storefront`)
//! - `FAWATERAK_API_KEY` - Payment gateway key; card payments are refused without it
//! - `FAWATERAK_API_URL` - Invoice endpoint (default: production gateway)
//! - `PAYMENT_WEBHOOK_SECRET` - Shared secret expected in `X-Webhook-Secret`
//! - `DISCORD_WEBHOOK_URL` - Channel webhook for new-order notifications
//! - `ADMIN_URL` - Link to the back-office in notifications (default: `/admin/orders`)
//! - `ADMIN_PHONE` - WhatsApp number of the shop (default: `201050188516`)
//! - `STORE_NAME` - Shop name in messages (default: `Al Hamd`)
//! - `LOGO_URL` - Logo used in notifications (default: `/static/img/logo.png`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` - Sample rates (default: 1.0)

use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_FAWATERAK_URL: &str = "https://app.fawaterk.com/api/v2/createInvoiceLink";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Directory that holds `static/` (uploads live in `static/uploads`)
    pub media_root: PathBuf,
    /// Card payment gateway
    pub payment: PaymentConfig,
    /// Order notification webhook
    pub discord_webhook_url: Option<SecretString>,
    /// Shop identity used in messages and links
    pub store: StoreConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Fawaterak payment gateway configuration.
///
/// Implements `Debug` manually to redact the API key and webhook secret.
#[derive(Clone)]
pub struct PaymentConfig {
    pub api_key: Option<SecretString>,
    pub api_url: String,
    pub webhook_secret: Option<SecretString>,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_url", &self.api_url)
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Shop identity.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub name: String,
    /// WhatsApp number in international format without `+`
    pub admin_phone: String,
    pub admin_url: String,
    pub logo_url: String,
}

impl StorefrontConfig {
    /// Load configuration from environment variables, reading `.env` first
    /// when present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing, a value does
    /// not parse, or the session secret is too weak.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: database_url("STOREFRONT_DATABASE_URL")?,
            host: parsed("STOREFRONT_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: parsed("STOREFRONT_PORT", 3000)?,
            base_url: required("STOREFRONT_BASE_URL")?
                .trim_end_matches('/')
                .to_owned(),
            session_secret: session_secret("STOREFRONT_SESSION_SECRET")?,
            media_root: PathBuf::from(or_default("SOUQ_MEDIA_ROOT", "crates/storefront")),
            payment: PaymentConfig::from_env(),
            discord_webhook_url: var("DISCORD_WEBHOOK_URL").map(SecretString::from),
            store: StoreConfig::from_env(),
            sentry_dsn: var("SENTRY_DSN"),
            sentry_environment: var("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: sample_rate("SENTRY_SAMPLE_RATE"),
            sentry_traces_sample_rate: sample_rate("SENTRY_TRACES_SAMPLE_RATE"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Absolute URL for a path on this storefront.
    #[must_use]
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl PaymentConfig {
    fn from_env() -> Self {
        Self {
            api_key: var("FAWATERAK_API_KEY").map(SecretString::from),
            api_url: or_default("FAWATERAK_API_URL", DEFAULT_FAWATERAK_URL),
            webhook_secret: var("PAYMENT_WEBHOOK_SECRET").map(SecretString::from),
        }
    }
}

impl StoreConfig {
    fn from_env() -> Self {
        Self {
            name: or_default("STORE_NAME", "Al Hamd"),
            admin_phone: or_default("ADMIN_PHONE", "201050188516"),
            admin_url: or_default("ADMIN_URL", "/admin/orders"),
            logo_url: or_default("LOGO_URL", "/static/img/logo.png"),
        }
    }
}

// =============================================================================
// Environment readers
// =============================================================================

/// A set, non-blank variable.
fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn or_default(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|| default.to_owned())
}

fn required(key: &str) -> Result<String, ConfigError> {
    var(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_owned()))
}

/// Parse `key` when set, `default` otherwise.
fn parsed<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    var(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_owned(), e.to_string()))
    })
}

/// `key`, falling back to the shared `DATABASE_URL`.
fn database_url(key: &str) -> Result<SecretString, ConfigError> {
    var(key)
        .or_else(|| var("DATABASE_URL"))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_owned()))
}

fn session_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = required(key)?;
    souq_core::secret::check(&value)
        .map_err(|weak| ConfigError::InsecureSecret(key.to_owned(), weak.to_string()))?;
    Ok(SecretString::from(value))
}

fn sample_rate(key: &str) -> f32 {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(1.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config() -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/souq"),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            media_root: PathBuf::from("crates/storefront"),
            payment: PaymentConfig {
                api_key: Some(SecretString::from("fawaterak_live_key_value")),
                api_url: DEFAULT_FAWATERAK_URL.to_string(),
                webhook_secret: Some(SecretString::from("hook_shared_value")),
            },
            discord_webhook_url: None,
            store: StoreConfig {
                name: "Al Hamd".to_string(),
                admin_phone: "201050188516".to_string(),
                admin_url: "/admin/orders".to_string(),
                logo_url: "/static/img/logo.png".to_string(),
            },
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        }
    }

    #[test]
    fn test_unset_values_fall_back() {
        assert_eq!(or_default("SOUQ_STOREFRONT_TEST_UNSET", "Al Hamd"), "Al Hamd");
        let port: u16 = parsed("SOUQ_STOREFRONT_TEST_UNSET_PORT", 3000).unwrap();
        assert_eq!(port, 3000);
        assert!(matches!(
            required("SOUQ_STOREFRONT_TEST_UNSET_URL"),
            Err(ConfigError::MissingEnvVar(key)) if key == "SOUQ_STOREFRONT_TEST_UNSET_URL"
        ));
    }

    #[test]
    fn test_socket_addr_and_absolute_url() {
        let config = test_config();
        assert_eq!(config.socket_addr().port(), 3000);
        assert_eq!(
            config.absolute_url("/payment/success/7"),
            "http://localhost:3000/payment/success/7"
        );
    }

    #[test]
    fn test_payment_config_debug_redacts_secrets() {
        let debug_output = format!("{:?}", test_config().payment);
        assert!(debug_output.contains("createInvoiceLink"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("fawaterak_live_key_value"));
        assert!(!debug_output.contains("hook_shared_value"));
    }
}
