//! Back-office account repository.

use sqlx::PgPool;

use souq_core::AdminId;
use souq_core::models::Admin;

use super::{RepositoryError, unique_or_database};

const ADMIN_COLUMNS: &str = "id, name, email, password_hash, last_login, created_at";

/// Repository for admin account operations.
pub struct AdminRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AdminRepository<'a> {
    /// Create a new admin repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Number of accounts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM admins")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Find an account by email (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Admin>, RepositoryError> {
        let sql = format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE lower(email) = lower($1)");
        let row = sqlx::query_as::<_, Admin>(&sql)
            .bind(email.trim())
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Create an account with an already hashed password.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is taken.
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Admin, RepositoryError> {
        let sql = format!(
            "INSERT INTO admins (name, email, password_hash) VALUES ($1, $2, $3) \
             RETURNING {ADMIN_COLUMNS}"
        );
        sqlx::query_as::<_, Admin>(&sql)
            .bind(name)
            .bind(email.trim())
            .bind(password_hash)
            .fetch_one(self.pool)
            .await
            .map_err(|e| unique_or_database(e, "admin email"))
    }

    /// Replace the stored hash (used when upgrading a legacy row).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_password_hash(&self, id: AdminId, hash: &str) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE admins SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(hash)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Stamp a successful login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn record_login(&self, id: AdminId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE admins SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
