//! Guest repository: anonymous shopper identities and their activity trail.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use souq_core::GuestId;
use souq_core::models::Guest;

use super::RepositoryError;

/// Repository for guest database operations.
pub struct GuestRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> GuestRepository<'a> {
    /// Create a new guest repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up a guest by the token stored in their session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_token(&self, token: &str) -> Result<Option<Guest>, RepositoryError> {
        let row = sqlx::query_as::<_, Guest>(
            "SELECT id, session_token, last_activity, created_at FROM guests \
             WHERE session_token = $1",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Insert a guest for a freshly minted token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the token is already taken.
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, token: &str) -> Result<Guest, RepositoryError> {
        let result = sqlx::query_as::<_, Guest>(
            "INSERT INTO guests (session_token) VALUES ($1) \
             RETURNING id, session_token, last_activity, created_at",
        )
        .bind(token)
        .fetch_one(self.pool)
        .await;

        match result {
            Ok(guest) => Ok(guest),
            Err(e) => {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return Err(RepositoryError::Conflict(
                        "session token already exists".to_owned(),
                    ));
                }
                Err(RepositoryError::Database(e))
            }
        }
    }

    /// Record activity now.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn touch(&self, id: GuestId, now: DateTime<Utc>) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE guests SET last_activity = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Append an entry to the activity log.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn log_activity(
        &self,
        id: GuestId,
        session_token: &str,
        action: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO activity_logs (guest_id, session_token, action) VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(session_token)
        .bind(action)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
