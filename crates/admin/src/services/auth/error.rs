//! Admin authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during admin authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Email or password left empty.
    #[error("email and password are required")]
    MissingCredentials,

    /// Password too short for a new account.
    #[error("weak password: {0}")]
    WeakPassword(String),

    /// Argon2 could not hash the password.
    #[error("password hashing failed")]
    PasswordHash,

    /// Account with this email already exists.
    #[error("admin already exists")]
    AdminExists,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
