//! Authentication service.
//!
//! Registration with argon2 password hashing, login issuing short-lived
//! HS256 access tokens, and logout via a `jti` denylist. The cart and order
//! core only ever consumes the result of [`AuthService::authenticate`]: a
//! verified [`CurrentUser`].

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use mercadito_core::{Email, UserId};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::{CurrentUser, User};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// HS256 signing material plus token lifetime, built once at startup and
/// shared through the application state.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: chrono::Duration,
}

impl JwtKeys {
    /// Build keys from the configured secret and token lifetime.
    #[must_use]
    pub fn new(secret: &SecretString, ttl: std::time::Duration) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1)),
        }
    }
}

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: i64,
    /// User email at issue time.
    pub email: String,
    /// Token ID, revoked on logout.
    pub jti: String,
    /// Issued-at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

impl Claims {
    /// Expiry as a timestamp, for the denylist's pruning horizon.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// Authentication service.
///
/// Handles user registration, login, token verification, and logout.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    keys: &'a JwtKeys,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool, keys: &'a JwtKeys) -> Self {
        Self {
            users: UserRepository::new(pool),
            keys,
        }
    }

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create(&email, name, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        Ok(user)
    }

    /// Login with email and password, issuing an access token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, String), AuthError> {
        let email = Email::parse(email)?;

        let (user, password_hash) = self
            .users
            .get_with_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        let token = self.issue_token(&user)?;
        Ok((user, token))
    }

    /// Verify a bearer token and resolve the calling identity.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for malformed/expired tokens and
    /// `AuthError::TokenRevoked` for tokens invalidated by logout.
    pub async fn authenticate(&self, token: &str) -> Result<CurrentUser, AuthError> {
        let claims = self.verify_token(token)?;

        if self.users.is_token_revoked(&claims.jti).await? {
            return Err(AuthError::TokenRevoked);
        }

        let email = Email::parse(&claims.email).map_err(|_| AuthError::InvalidToken)?;

        Ok(CurrentUser {
            id: UserId::new(claims.sub),
            email,
            token_expires_at: claims.expires_at(),
            token_id: claims.jti,
        })
    }

    /// Invalidate the presented token.
    ///
    /// Idempotent: logging out twice with the same token succeeds, though
    /// the second request will already fail authentication.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the denylist insert fails.
    pub async fn logout(&self, user: &CurrentUser) -> Result<(), AuthError> {
        self.users
            .revoke_token(&user.token_id, user.token_expires_at)
            .await?;
        Ok(())
    }

    /// Issue a signed access token for a user.
    fn issue_token(&self, user: &User) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.as_i64(),
            email: user.email.as_str().to_owned(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + self.keys.ttl).timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Decode and validate a token's signature and expiry.
    fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        jsonwebtoken::decode::<Claims>(token, &self.keys.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }
}

/// Validate password strength.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password with argon2id and a fresh random salt.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored hash.
fn verify_password(password: &str, stored_hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|_| AuthError::PasswordHash)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;

    fn test_keys() -> JwtKeys {
        JwtKeys::new(
            &SecretString::from("kX9mP2vQ7rT4wY6zB8nC1dF3gH5jL0aS"),
            std::time::Duration::from_secs(3600),
        )
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(matches!(
            validate_password("hunter2"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("a-long-enough-password").is_ok());
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong password", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn register_login_authenticate_flow() {
        let pool = memory_pool().await;
        let keys = test_keys();
        let auth = AuthService::new(&pool, &keys);

        let user = auth
            .register("ana@example.com", "Ana", "a-strong-password")
            .await
            .unwrap();

        let (logged_in, token) = auth
            .login("ana@example.com", "a-strong-password")
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);

        let current = auth.authenticate(&token).await.unwrap();
        assert_eq!(current.id, user.id);
        assert_eq!(current.email.as_str(), "ana@example.com");
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let pool = memory_pool().await;
        let keys = test_keys();
        let auth = AuthService::new(&pool, &keys);

        auth.register("ana@example.com", "Ana", "a-strong-password")
            .await
            .unwrap();

        assert!(matches!(
            auth.login("ana@example.com", "not-the-password").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody@example.com", "a-strong-password").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn logout_revokes_the_token() {
        let pool = memory_pool().await;
        let keys = test_keys();
        let auth = AuthService::new(&pool, &keys);

        auth.register("ana@example.com", "Ana", "a-strong-password")
            .await
            .unwrap();
        let (_, token) = auth
            .login("ana@example.com", "a-strong-password")
            .await
            .unwrap();

        let current = auth.authenticate(&token).await.unwrap();
        auth.logout(&current).await.unwrap();

        assert!(matches!(
            auth.authenticate(&token).await,
            Err(AuthError::TokenRevoked)
        ));
    }

    #[tokio::test]
    async fn tampered_tokens_are_rejected() {
        let pool = memory_pool().await;
        let keys = test_keys();
        let auth = AuthService::new(&pool, &keys);

        assert!(matches!(
            auth.authenticate("not-a-token").await,
            Err(AuthError::InvalidToken)
        ));

        let other_keys = JwtKeys::new(
            &SecretString::from("Zq8wN3xV5bM1cK7hJ4gF6dS2aP9rT0yL"),
            std::time::Duration::from_secs(3600),
        );
        let other_auth = AuthService::new(&pool, &other_keys);
        other_auth
            .register("eve@example.com", "Eve", "a-strong-password")
            .await
            .unwrap();
        let (_, foreign_token) = other_auth
            .login("eve@example.com", "a-strong-password")
            .await
            .unwrap();

        assert!(matches!(
            auth.authenticate(&foreign_token).await,
            Err(AuthError::InvalidToken)
        ));
    }
}
