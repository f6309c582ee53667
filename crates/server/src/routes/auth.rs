//! Authentication route handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::User;
use crate::services::AuthService;
use crate::state::AppState;

/// Request body for registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response for a successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: User,
    pub access: String,
}

/// Response for a successful logout.
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: String,
}

/// Register a new account.
///
/// # Errors
///
/// Returns `400` for an invalid email or weak password, `409` when the
/// email is already registered.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let auth = AuthService::new(state.pool(), state.jwt());
    let user = auth.register(&body.email, &body.name, &body.password).await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(user)))
}

/// Exchange credentials for a bearer token.
///
/// # Errors
///
/// Returns `401` when the credentials don't match an account.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let auth = AuthService::new(state.pool(), state.jwt());
    let (user, access) = auth.login(&body.email, &body.password).await?;

    Ok(Json(LoginResponse { user, access }))
}

/// Revoke the current token.
///
/// The token stays revoked until its natural expiry, after which the
/// denylist entry is irrelevant.
///
/// # Errors
///
/// Returns `401` when the request carries no valid token.
pub async fn logout(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<LogoutResponse>> {
    let auth = AuthService::new(state.pool(), state.jwt());
    auth.logout(&user).await?;

    tracing::info!(user_id = %user.id, "User logged out");

    Ok(Json(LogoutResponse {
        message: "logged out".to_owned(),
    }))
}
