//! Admin authentication service.
//!
//! Email and password login against the `admins` table. Passwords are stored
//! as Argon2id PHC strings; rows written before hashing was introduced hold
//! the plaintext and are upgraded on their first successful login.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

use souq_core::models::Admin;

use crate::config::BootstrapAdmin;
use crate::db::{AdminRepository, RepositoryError};
use crate::middleware::csrf::constant_time_compare;

/// Minimum password length for new accounts.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Display name of the account created from `ADMIN_EMAIL`/`ADMIN_PASSWORD`.
const BOOTSTRAP_ADMIN_NAME: &str = "Admin";

/// Admin authentication service.
pub struct AdminAuthService<'a> {
    admins: AdminRepository<'a>,
}

impl<'a> AdminAuthService<'a> {
    /// Create a new admin authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            admins: AdminRepository::new(pool),
        }
    }

    /// Create the bootstrap account when the table is empty.
    ///
    /// Returns the account if one was created.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PasswordHash` if hashing fails, or
    /// `AuthError::Repository` if the database fails.
    pub async fn bootstrap(&self, bootstrap: &BootstrapAdmin) -> Result<Option<Admin>, AuthError> {
        if self.admins.count().await? > 0 {
            return Ok(None);
        }
        let hash = hash_password(bootstrap.password.expose_secret())?;
        let admin = self
            .admins
            .create(BOOTSTRAP_ADMIN_NAME, &bootstrap.email, &hash)
            .await?;
        tracing::info!(admin_id = %admin.id, "Bootstrap admin created");
        Ok(Some(admin))
    }

    /// Create an account with a hashed password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` for short passwords,
    /// `AuthError::AdminExists` if the email is taken, or
    /// `AuthError::Repository` if the database fails.
    pub async fn create_admin(
        &self,
        name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<Admin, AuthError> {
        validate_password(password.expose_secret())?;
        let hash = hash_password(password.expose_secret())?;
        match self.admins.create(name, email, &hash).await {
            Ok(admin) => Ok(admin),
            Err(RepositoryError::Conflict(_)) => Err(AuthError::AdminExists),
            Err(e) => Err(e.into()),
        }
    }

    /// Check the credentials and stamp the login.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingCredentials` for empty input,
    /// `AuthError::InvalidCredentials` for an unknown email or wrong password,
    /// or `AuthError::Repository` if the database fails.
    pub async fn login(&self, email: &str, password: &str) -> Result<Admin, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let admin = self
            .admins
            .find_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        match check_password(password, &admin.password_hash) {
            PasswordCheck::Valid => {}
            PasswordCheck::LegacyMatch => {
                let hash = hash_password(password)?;
                self.admins.set_password_hash(admin.id, &hash).await?;
                tracing::info!(admin_id = %admin.id, "Upgraded legacy password to Argon2");
            }
            PasswordCheck::Invalid => return Err(AuthError::InvalidCredentials),
        }

        self.admins.record_login(admin.id).await?;
        Ok(admin)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum PasswordCheck {
    Valid,
    /// The stored value is a plaintext password that matched.
    LegacyMatch,
    Invalid,
}

fn check_password(password: &str, stored: &str) -> PasswordCheck {
    match PasswordHash::new(stored) {
        Ok(parsed) => {
            if Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
            {
                PasswordCheck::Valid
            } else {
                PasswordCheck::Invalid
            }
        }
        Err(_) if constant_time_compare(password.as_bytes(), stored.as_bytes()) => {
            PasswordCheck::LegacyMatch
        }
        Err(_) => PasswordCheck::Invalid,
    }
}

/// Validate password strength for new accounts.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hashed_password_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert_eq!(check_password("correct horse", &hash), PasswordCheck::Valid);
        assert_eq!(check_password("wrong horse", &hash), PasswordCheck::Invalid);
    }

    #[test]
    fn test_legacy_plaintext_matches_once() {
        assert_eq!(check_password("secret123", "secret123"), PasswordCheck::LegacyMatch);
        assert_eq!(check_password("secret124", "secret123"), PasswordCheck::Invalid);
        assert_eq!(check_password("", "secret123"), PasswordCheck::Invalid);
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
    }
}
