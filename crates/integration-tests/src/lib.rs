//! Integration tests for Mercadito.
//!
//! Tests drive the real router in-process with `tower::ServiceExt::oneshot`
//! against an in-memory `SQLite` database, so they need no running server.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p mercadito-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `auth` - Registration, login, logout, token revocation
//! - `cart` - Cart item management and total maintenance
//! - `checkout` - The cart-to-order transaction, including the concurrent
//!   double-checkout race
//! - `orders` - Order history and ownership

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::Value;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use mercadito_server::config::ServerConfig;
use mercadito_server::db::MIGRATOR;
use mercadito_server::routes;
use mercadito_server::state::AppState;

/// A router plus the pool backing it, for direct database assertions.
pub struct TestContext {
    pub app: Router,
    pub pool: SqlitePool,
}

/// Server configuration with test-only secrets.
fn test_config() -> ServerConfig {
    ServerConfig {
        database_url: SecretString::from("sqlite::memory:"),
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
        port: 0,
        jwt_secret: SecretString::from("integration-test-secret-0123456789abcdef"),
        token_ttl: std::time::Duration::from_secs(3600),
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// Single-connection in-memory pool.
///
/// One connection means one in-memory database; a larger pool would give
/// each connection its own empty schema.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect(":memory:")
        .await
        .expect("failed to open in-memory database");

    MIGRATOR.run(&pool).await.expect("migrations failed");
    pool
}

impl TestContext {
    /// Build a router over a fresh in-memory database.
    pub async fn new() -> Self {
        let pool = memory_pool().await;
        let state = AppState::new(test_config(), pool.clone());
        let app = routes::routes().with_state(state);

        Self { app, pool }
    }

    /// Send a request and return the status plus parsed JSON body.
    ///
    /// Bodyless responses (204) parse as `Value::Null`.
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json).expect("failed to serialize request body"),
                )),
            None => builder.body(Body::empty()),
        }
        .expect("failed to build request");

        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router error");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to read response body")
            .to_bytes();

        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response body was not JSON")
        };

        (status, json)
    }

    /// Register an account and log in, returning the bearer token.
    pub async fn register_and_login(&self, email: &str) -> String {
        let password = "correct-horse-battery";

        let (status, _) = self
            .request(
                "POST",
                "/auth/register",
                None,
                Some(serde_json::json!({
                    "email": email,
                    "name": "Test User",
                    "password": password,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self
            .request(
                "POST",
                "/auth/login",
                None,
                Some(serde_json::json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        body["access"]
            .as_str()
            .expect("login response missing access token")
            .to_owned()
    }

    /// Create a category and a product in it, returning the product id.
    pub async fn seed_product(&self, token: &str, name: &str, price: &str) -> i64 {
        let (status, category) = self
            .request(
                "POST",
                "/categories",
                Some(token),
                Some(serde_json::json!({ "name": format!("{name} category") })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, product) = self
            .request(
                "POST",
                "/products",
                Some(token),
                Some(serde_json::json!({
                    "category_id": category["id"],
                    "name": name,
                    "description": "test product",
                    "price": price,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        product["id"].as_i64().expect("product id missing")
    }
}
