//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use mercadito_core::{Email, UserId};

/// A registered user.
///
/// The password hash never leaves the database layer.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name.
    pub name: String,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// The authenticated caller, extracted from a verified bearer token.
///
/// Carried by [`crate::middleware::RequireAuth`]; cart and order access is
/// scoped to this identity.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    /// Unique user ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// JWT ID of the presented token (revoked on logout).
    #[serde(skip)]
    pub token_id: String,
    /// Expiry of the presented token, bounding how long its denylist
    /// entry must be kept.
    #[serde(skip)]
    pub token_expires_at: chrono::DateTime<chrono::Utc>,
}
