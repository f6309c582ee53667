//! User repository.
//!
//! Database access for users and the logout token denylist.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use mercadito_core::{Email, UserId};

use super::RepositoryError;
use crate::models::User;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> Result<User, RepositoryError> {
        let email = Email::parse(&self.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(User {
            id: self.id,
            email,
            name: self.name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user with email, display name, and password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        email: &Email,
        name: &str,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let now = Utc::now();

        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO users (email, name, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, email, name, created_at, updated_at
            ",
        )
        .bind(email.as_str())
        .bind(name)
        .bind(password_hash)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("email already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        row.into_user()
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, name, created_at, updated_at
            FROM users
            WHERE id = ?
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(UserRow::into_user).transpose()
    }

    /// Get a user and their password hash by email.
    ///
    /// Returns `None` if no such user exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, (UserId, String, String, String, DateTime<Utc>, DateTime<Utc>)>(
            r"
            SELECT id, email, name, password_hash, created_at, updated_at
            FROM users
            WHERE email = ?
            ",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        let Some((id, email, name, password_hash, created_at, updated_at)) = row else {
            return Ok(None);
        };

        let user = UserRow {
            id,
            email,
            name,
            created_at,
            updated_at,
        }
        .into_user()?;

        Ok(Some((user, password_hash)))
    }

    /// Record a token's `jti` in the logout denylist.
    ///
    /// Revoking the same token twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn revoke_token(
        &self,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO revoked_tokens (jti, revoked_at, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT (jti) DO NOTHING
            ",
        )
        .bind(jti)
        .bind(Utc::now())
        .bind(expires_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Whether a token's `jti` has been revoked by logout.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_token_revoked(&self, jti: &str) -> Result<bool, RepositoryError> {
        let row = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*) FROM revoked_tokens WHERE jti = ?
            ",
        )
        .bind(jti)
        .fetch_one(self.pool)
        .await?;

        Ok(row > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;

    #[tokio::test]
    async fn create_and_fetch_user() {
        let pool = memory_pool().await;
        let repo = UserRepository::new(&pool);

        let email = Email::parse("ana@example.com").unwrap();
        let user = repo.create(&email, "Ana", "argon2-hash").await.unwrap();
        assert_eq!(user.email.as_str(), "ana@example.com");
        assert_eq!(user.name, "Ana");

        let fetched = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, user.id);

        let (by_email, hash) = repo
            .get_with_password_hash(&email)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, user.id);
        assert_eq!(hash, "argon2-hash");
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let pool = memory_pool().await;
        let repo = UserRepository::new(&pool);

        let email = Email::parse("ana@example.com").unwrap();
        repo.create(&email, "Ana", "h").await.unwrap();

        let err = repo.create(&email, "Ana Again", "h").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn token_revocation_round_trip() {
        let pool = memory_pool().await;
        let repo = UserRepository::new(&pool);

        assert!(!repo.is_token_revoked("jti-1").await.unwrap());

        let expires = Utc::now() + chrono::Duration::hours(1);
        repo.revoke_token("jti-1", expires).await.unwrap();
        // Idempotent.
        repo.revoke_token("jti-1", expires).await.unwrap();

        assert!(repo.is_token_revoked("jti-1").await.unwrap());
    }
}
