//! Category route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use mercadito_core::CategoryId;
use serde::Deserialize;

use crate::db::CategoryRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::Category;
use crate::state::AppState;

/// Request body for creating or renaming a category.
#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("category name must not be empty".to_owned()));
    }
    Ok(name)
}

/// List all categories.
///
/// # Errors
///
/// Returns `500` if the database query fails.
pub async fn index(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>> {
    let categories = CategoryRepository::new(state.pool()).list().await?;
    Ok(Json(categories))
}

/// Fetch a single category.
///
/// # Errors
///
/// Returns `404` if the category doesn't exist.
pub async fn show(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<Json<Category>> {
    let category = CategoryRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("category {id} not found")))?;

    Ok(Json(category))
}

/// Create a category.
///
/// # Errors
///
/// Returns `400` for an empty name, `409` for a duplicate name.
pub async fn create(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>)> {
    let name = validate_name(&body.name)?;
    let category = CategoryRepository::new(state.pool()).create(name).await?;

    Ok((StatusCode::CREATED, Json(category)))
}

/// Rename a category.
///
/// # Errors
///
/// Returns `404` if the category doesn't exist, `409` for a duplicate name.
pub async fn update(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
    Json(body): Json<CategoryRequest>,
) -> Result<Json<Category>> {
    let name = validate_name(&body.name)?;
    let category = CategoryRepository::new(state.pool()).update(id, name).await?;

    Ok(Json(category))
}

/// Delete a category. Products in the category are deleted with it.
///
/// # Errors
///
/// Returns `404` if the category doesn't exist.
pub async fn destroy(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode> {
    let deleted = CategoryRepository::new(state.pool()).delete(id).await?;
    if !deleted {
        return Err(AppError::NotFound(format!("category {id} not found")));
    }

    Ok(StatusCode::NO_CONTENT)
}
