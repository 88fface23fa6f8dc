//! User repository.
//!
//! Users are created by the authentication service; the storefront only
//! confirms that a session's user id still refers to a real account.

use sqlx::PgPool;

use pantry_core::UserId;

use super::RepositoryError;

/// Repository for user lookups.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Whether a user with this id exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists(&self, id: UserId) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM storefront.user WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// Create a user, returning its id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, email: &str) -> Result<UserId, RepositoryError> {
        sqlx::query_scalar::<_, UserId>(
            "INSERT INTO storefront.user (email) VALUES ($1) RETURNING id",
        )
        .bind(email)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "email"))
    }
}
