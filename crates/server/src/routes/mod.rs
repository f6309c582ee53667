//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                 - Liveness check
//! GET    /health/ready           - Readiness check (pings the database)
//!
//! # Auth
//! POST   /auth/register          - Create an account
//! POST   /auth/login             - Exchange credentials for a bearer token
//! POST   /auth/logout            - Revoke the current token (requires auth)
//!
//! # Categories (require auth)
//! GET    /categories             - List categories
//! POST   /categories             - Create a category
//! GET    /categories/{id}        - Category detail
//! PATCH  /categories/{id}        - Rename a category
//! DELETE /categories/{id}        - Delete a category
//!
//! # Products
//! GET    /products               - Product listing (public)
//! GET    /products/{id}          - Product detail (public)
//! POST   /products               - Create a product (requires auth)
//! PATCH  /products/{id}          - Update a product (requires auth)
//! DELETE /products/{id}          - Delete a product (requires auth)
//!
//! # Cart (requires auth, one cart per user)
//! GET    /cart                   - Current user's cart
//! POST   /cart/items             - Add a product (overwrites quantity if present)
//! PATCH  /cart/items/{id}        - Set an item's quantity
//! DELETE /cart/items/{id}        - Remove an item
//! POST   /cart/checkout          - Convert the cart into an order
//!
//! # Orders (requires auth)
//! GET    /orders                 - Order history, newest first
//! GET    /orders/{id}            - Order detail (403 for other users' orders)
//! ```

pub mod auth;
pub mod cart;
pub mod categories;
pub mod orders;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
}

/// Create the category routes router.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::index).post(categories::create))
        .route(
            "/{id}",
            get(categories::show)
                .patch(categories::update)
                .delete(categories::destroy),
        )
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route(
            "/{id}",
            get(products::show)
                .patch(products::update)
                .delete(products::destroy),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{id}",
            axum::routing::patch(cart::update_item).delete(cart::remove_item),
        )
        .route("/checkout", post(cart::checkout))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
}

/// Create all routes for the API.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/categories", category_routes())
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
}
