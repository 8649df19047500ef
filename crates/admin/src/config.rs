//! Admin configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ADMIN_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `ADMIN_BASE_URL` - Public URL for the back-office
//! - `ADMIN_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `ADMIN_HOST` - Bind address (default: 127.0.0.1)
//! - `ADMIN_PORT` - Listen port (default: 3001)
//! - `SOUQ_MEDIA_ROOT` - Directory containing `static/` shared with the storefront
//!   (default: `crates/storefront`)
//! - `ADMIN_EMAIL` / `ADMIN_PASSWORD` - Account created on the first login when
//!   no admin exists yet
//! - `BOSTA_API_KEY` - Courier API key; shipping falls back to local tracking
//!   numbers without it
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` - Sample rates (default: 1.0)

use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_BOSTA_URL: &str = "https://app.bosta.co/api/v2";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Admin application configuration.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the back-office
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Directory that holds `static/`; uploads are written to `static/uploads`
    pub media_root: PathBuf,
    /// First-run account
    pub bootstrap: Option<BootstrapAdmin>,
    /// Courier API
    pub bosta: BostaConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Credentials for the account created when the `admins` table is empty.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: SecretString,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Bosta courier configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct BostaConfig {
    pub api_key: Option<SecretString>,
    pub api_url: String,
}

impl std::fmt::Debug for BostaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BostaConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl AdminConfig {
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
            database_url: database_url("ADMIN_DATABASE_URL")?,
            host: parsed("ADMIN_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: parsed("ADMIN_PORT", 3001)?,
            base_url: required("ADMIN_BASE_URL")?.trim_end_matches('/').to_owned(),
            session_secret: session_secret("ADMIN_SESSION_SECRET")?,
            media_root: var("SOUQ_MEDIA_ROOT")
                .map_or_else(|| PathBuf::from("crates/storefront"), PathBuf::from),
            bootstrap: BootstrapAdmin::from_env(),
            bosta: BostaConfig::from_env(),
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

    /// Directory where uploaded and downloaded images are stored.
    #[must_use]
    pub fn uploads_dir(&self) -> PathBuf {
        self.media_root.join("static").join("uploads")
    }
}

impl BootstrapAdmin {
    /// Read `ADMIN_EMAIL` and `ADMIN_PASSWORD`; both must be set.
    fn from_env() -> Option<Self> {
        Some(Self {
            email: var("ADMIN_EMAIL")?,
            password: SecretString::from(var("ADMIN_PASSWORD")?),
        })
    }
}

impl BostaConfig {
    /// Read the courier settings from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            api_key: var("BOSTA_API_KEY").map(SecretString::from),
            api_url: var("BOSTA_API_URL").unwrap_or_else(|| DEFAULT_BOSTA_URL.to_owned()),
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

/// Sentry sample rate, 1.0 when unset or unparsable.
fn sample_rate(key: &str) -> f32 {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(1.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config() -> AdminConfig {
        AdminConfig {
            database_url: SecretString::from("postgres://localhost/souq"),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3001,
            base_url: "http://localhost:3001".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            media_root: PathBuf::from("/srv/souq"),
            bootstrap: Some(BootstrapAdmin {
                email: "owner@souq.test".to_string(),
                password: SecretString::from("first-run-pass"),
            }),
            bosta: BostaConfig {
                api_key: Some(SecretString::from("courier_live_key")),
                api_url: DEFAULT_BOSTA_URL.to_string(),
            },
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        }
    }

    #[test]
    fn test_parsed_defaults_when_unset() {
        let port: u16 = parsed("SOUQ_ADMIN_TEST_UNSET_PORT", 3001).unwrap();
        assert_eq!(port, 3001);
        assert!((sample_rate("SOUQ_ADMIN_TEST_UNSET_RATE") - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_required_reports_key() {
        let err = required("SOUQ_ADMIN_TEST_UNSET_URL").unwrap_err();
        assert!(err.to_string().contains("SOUQ_ADMIN_TEST_UNSET_URL"));
    }

    #[test]
    fn test_socket_addr_and_uploads_dir() {
        let config = test_config();
        assert_eq!(config.socket_addr().port(), 3001);
        assert_eq!(
            config.uploads_dir(),
            PathBuf::from("/srv/souq/static/uploads")
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = test_config();
        let bosta = format!("{:?}", config.bosta);
        assert!(bosta.contains("[REDACTED]"));
        assert!(!bosta.contains("courier_live_key"));

        let bootstrap = format!("{:?}", config.bootstrap.unwrap());
        assert!(bootstrap.contains("owner@souq.test"));
        assert!(!bootstrap.contains("first-run-pass"));
    }
}
