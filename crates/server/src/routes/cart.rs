//! Cart route handlers.
//!
//! Every user has at most one cart; it is created on first use. Adding a
//! product that is already in the cart overwrites its quantity rather than
//! adding to it.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use mercadito_core::{CartItemId, ProductId};
use serde::{Deserialize, Serialize};

use crate::db::CartRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Cart, CartItem, Order};
use crate::services::CheckoutService;
use crate::state::AppState;

/// Request body for adding a product to the cart.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Request body for setting an item's quantity.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i64,
}

/// Response for a successful checkout.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub message: String,
    pub order: Order,
}

fn validate_quantity(quantity: i64) -> Result<()> {
    if quantity < 1 {
        return Err(AppError::Validation("quantity must be at least 1".to_owned()));
    }
    Ok(())
}

/// Fetch the current user's cart, creating it on first access.
///
/// # Errors
///
/// Returns `500` if the database operation fails.
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Cart>> {
    let cart = CartRepository::new(state.pool()).get_or_create(user.id).await?;
    Ok(Json(cart))
}

/// Add a product to the cart. If the product is already present, its
/// quantity is set to the given value.
///
/// # Errors
///
/// Returns `400` for a non-positive quantity, `404` for an unknown product.
pub async fn add_item(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<CartItem>)> {
    validate_quantity(body.quantity)?;

    let item = CartRepository::new(state.pool())
        .add_or_update_item(user.id, body.product_id, body.quantity)
        .await
        .map_err(|e| match e {
            crate::db::RepositoryError::NotFound => {
                AppError::NotFound(format!("product {} not found", body.product_id))
            }
            other => other.into(),
        })?;

    Ok((StatusCode::CREATED, Json(item)))
}

/// Set the quantity of a cart item.
///
/// # Errors
///
/// Returns `400` for a non-positive quantity, `404` if the item doesn't
/// exist or belongs to another user's cart.
pub async fn update_item(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<CartItemId>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<CartItem>> {
    validate_quantity(body.quantity)?;

    let item = CartRepository::new(state.pool())
        .update_item(user.id, id, body.quantity)
        .await
        .map_err(|e| match e {
            crate::db::RepositoryError::NotFound => {
                AppError::NotFound(format!("cart item {id} not found"))
            }
            other => other.into(),
        })?;

    Ok(Json(item))
}

/// Remove an item from the cart.
///
/// # Errors
///
/// Returns `404` if the item doesn't exist or belongs to another user's cart.
pub async fn remove_item(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<CartItemId>,
) -> Result<StatusCode> {
    CartRepository::new(state.pool())
        .remove_item(user.id, id)
        .await
        .map_err(|e| match e {
            crate::db::RepositoryError::NotFound => {
                AppError::NotFound(format!("cart item {id} not found"))
            }
            other => other.into(),
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Convert the cart into an order.
///
/// The whole conversion is a single transaction: the order and its lines
/// are written, the cart is emptied, and its total reset, or none of that
/// happens.
///
/// # Errors
///
/// Returns `400` with `{"error": "cart is empty"}` when there is nothing
/// to check out.
pub async fn checkout(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CheckoutResponse>)> {
    let order = CheckoutService::new(state.pool()).checkout(user.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            message: "order placed".to_owned(),
            order,
        }),
    ))
}
