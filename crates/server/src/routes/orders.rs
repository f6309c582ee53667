//! Order route handlers.
//!
//! Orders are immutable once placed. An existing order that belongs to
//! another user answers `403`, not `404`; order existence is not secret,
//! its contents are.

use axum::{
    Json,
    extract::{Path, State},
};
use mercadito_core::OrderId;

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAuth, ensure_owner};
use crate::models::Order;
use crate::state::AppState;

/// List the current user's orders, newest first.
///
/// # Errors
///
/// Returns `500` if the database query fails.
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool()).list(user.id).await?;
    Ok(Json(orders))
}

/// Fetch a single order.
///
/// # Errors
///
/// Returns `404` if the order doesn't exist, `403` if it belongs to
/// another user.
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

    ensure_owner(order.user_id, &user)?;

    Ok(Json(order))
}
