//! Authentication middleware and extractors.
//!
//! Provides extractors for requiring bearer-token authentication in route
//! handlers.

use axum::{extract::FromRequestParts, http::request::Parts};
use mercadito_core::UserId;

use crate::error::AppError;
use crate::models::CurrentUser;
use crate::services::AuthService;
use crate::state::AppState;

/// Extractor that requires a valid bearer token.
///
/// Parses the `Authorization: Bearer <token>` header, verifies the token
/// signature and expiry, and rejects revoked tokens. Rejects with
/// `401 Unauthorized` when any of these checks fail.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_owned()))?;

        let auth = AuthService::new(state.pool(), state.jwt());
        let user = auth.authenticate(token).await.map_err(AppError::from)?;

        Ok(Self(user))
    }
}

/// Extract the bearer token from the `Authorization` header, if present.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let header = parts.headers.get(axum::http::header::AUTHORIZATION)?;
    let value = header.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();

    if token.is_empty() { None } else { Some(token) }
}

/// Check that `caller` owns the resource belonging to `owner`.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] when the caller is not the owner.
pub fn ensure_owner(owner: UserId, caller: &CurrentUser) -> Result<(), AppError> {
    if owner == caller.id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "you do not have access to this resource".to_owned(),
        ))
    }
}
