//! Product route handlers.
//!
//! Listing and detail are public; catalog mutations require auth.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use mercadito_core::{CategoryId, Price, ProductId};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::Product;
use crate::state::AppState;

/// Request body for creating a product.
#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub category_id: CategoryId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
}

/// Request body for updating a product. Absent fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub category_id: Option<CategoryId>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
}

fn parse_price(value: Decimal) -> Result<Price> {
    Price::new(value).map_err(|e| AppError::Validation(e.to_string()))
}

/// List all products, newest first.
///
/// # Errors
///
/// Returns `500` if the database query fails.
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    let products = ProductRepository::new(state.pool()).list().await?;
    Ok(Json(products))
}

/// Fetch a single product.
///
/// # Errors
///
/// Returns `404` if the product doesn't exist.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    let product = ProductRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id} not found")))?;

    Ok(Json(product))
}

/// Create a product.
///
/// # Errors
///
/// Returns `400` for an invalid price, `404` if the category doesn't exist.
pub async fn create(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>)> {
    let price = parse_price(body.price)?;

    if body.name.trim().is_empty() {
        return Err(AppError::Validation("product name must not be empty".to_owned()));
    }

    let product = ProductRepository::new(state.pool())
        .create(body.category_id, body.name.trim(), &body.description, price)
        .await?;

    Ok((StatusCode::CREATED, Json(product)))
}

/// Update a product. Only the provided fields change.
///
/// # Errors
///
/// Returns `400` for an invalid price, `404` if the product doesn't exist.
pub async fn update(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(body): Json<UpdateProductRequest>,
) -> Result<Json<Product>> {
    let price = body.price.map(parse_price).transpose()?;

    if let Some(name) = &body.name
        && name.trim().is_empty()
    {
        return Err(AppError::Validation("product name must not be empty".to_owned()));
    }

    let product = ProductRepository::new(state.pool())
        .update(
            id,
            body.category_id,
            body.name.as_deref().map(str::trim),
            body.description.as_deref(),
            price,
        )
        .await?;

    Ok(Json(product))
}

/// Delete a product. Cart lines referencing it are deleted; past order
/// lines keep their frozen copy.
///
/// # Errors
///
/// Returns `404` if the product doesn't exist.
pub async fn destroy(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    let deleted = ProductRepository::new(state.pool()).delete(id).await?;
    if !deleted {
        return Err(AppError::NotFound(format!("product {id} not found")));
    }

    Ok(StatusCode::NO_CONTENT)
}
