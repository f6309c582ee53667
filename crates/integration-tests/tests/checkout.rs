//! Integration tests for the cart-to-order checkout transaction.

use axum::http::StatusCode;
use mercadito_integration_tests::TestContext;
use secrecy::SecretString;
use serde_json::json;

use mercadito_core::UserId;
use mercadito_server::db::{CartRepository, MIGRATOR, UserRepository, create_pool};
use mercadito_server::services::{CheckoutError, CheckoutService};

#[tokio::test]
async fn empty_cart_cannot_be_checked_out() {
    let ctx = TestContext::new().await;
    let token = ctx.register_and_login("alice@example.com").await;

    // Never touched a cart
    let (status, body) = ctx
        .request("POST", "/cart/checkout", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "cart is empty");

    // An existing but emptied cart behaves the same
    let (_, _) = ctx.request("GET", "/cart", Some(&token), None).await;
    let (status, body) = ctx
        .request("POST", "/cart/checkout", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "cart is empty");

    // And no order was created either way
    let (_, orders) = ctx.request("GET", "/orders", Some(&token), None).await;
    assert_eq!(orders, json!([]));
}

#[tokio::test]
async fn checkout_snapshots_the_cart_and_empties_it() {
    let ctx = TestContext::new().await;
    let token = ctx.register_and_login("alice@example.com").await;
    let coffee = ctx.seed_product(&token, "Coffee", "10.00").await;
    let tea = ctx.seed_product(&token, "Tea", "2.50").await;

    for (product, quantity) in [(coffee, 2), (tea, 2)] {
        let (status, _) = ctx
            .request(
                "POST",
                "/cart/items",
                Some(&token),
                Some(json!({ "product_id": product, "quantity": quantity })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = ctx
        .request("POST", "/cart/checkout", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let order = &body["order"];
    assert_eq!(order["total_price"], "25.00");

    let items = order["items"].as_array().expect("order items");
    assert_eq!(items.len(), 2);
    for item in items {
        assert!(item["product_name"].as_str().is_some());
        assert!(item["unit_price"].as_str().is_some());
    }

    // The cart is emptied in the same transaction
    let (_, cart) = ctx.request("GET", "/cart", Some(&token), None).await;
    assert_eq!(cart["items"], json!([]));
    assert_eq!(cart["total_price"], "0.00");

    // A second checkout finds nothing to buy
    let (status, body) = ctx
        .request("POST", "/cart/checkout", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "cart is empty");

    let (_, orders) = ctx.request("GET", "/orders", Some(&token), None).await;
    assert_eq!(orders.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn orders_are_immune_to_later_catalog_changes() {
    let ctx = TestContext::new().await;
    let token = ctx.register_and_login("alice@example.com").await;
    let coffee = ctx.seed_product(&token, "Coffee", "10.00").await;

    let (_, _) = ctx
        .request(
            "POST",
            "/cart/items",
            Some(&token),
            Some(json!({ "product_id": coffee, "quantity": 1 })),
        )
        .await;

    let (_, body) = ctx
        .request("POST", "/cart/checkout", Some(&token), None)
        .await;
    let order_id = body["order"]["id"].as_i64().expect("order id");

    // Reprice and then delete the product entirely
    let (status, _) = ctx
        .request(
            "PATCH",
            &format!("/products/{coffee}"),
            Some(&token),
            Some(json!({ "price": "99.99" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx
        .request("DELETE", &format!("/products/{coffee}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // The order still shows what was actually paid
    let (status, order) = ctx
        .request("GET", &format!("/orders/{order_id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["total_price"], "10.00");
    assert_eq!(order["items"][0]["unit_price"], "10.00");
    assert_eq!(order["items"][0]["product_name"], "Coffee");
}

/// Two checkouts racing on the same cart must produce exactly one order.
///
/// Runs against a file-backed database so the two tasks use separate
/// connections, as real concurrent requests would.
#[tokio::test]
async fn concurrent_double_checkout_creates_one_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("race.db");
    let url = format!("sqlite://{}", db_path.display());

    let pool = create_pool(&SecretString::from(url))
        .await
        .expect("failed to open database");
    MIGRATOR.run(&pool).await.expect("migrations failed");

    // Seed a user with a non-empty cart directly through the repositories
    let email = mercadito_core::Email::parse("alice@example.com").expect("email");
    let user = UserRepository::new(&pool)
        .create(&email, "Alice", "unused-hash")
        .await
        .expect("create user");

    sqlx::query("INSERT INTO categories (name) VALUES ('Drinks')")
        .execute(&pool)
        .await
        .expect("seed category");
    sqlx::query(
        "INSERT INTO products (category_id, name, description, price_cents, created_at, updated_at)
         VALUES (1, 'Coffee', '', 1000, '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
    )
    .execute(&pool)
    .await
    .expect("seed product");

    CartRepository::new(&pool)
        .add_or_update_item(user.id, 1.into(), 2)
        .await
        .expect("fill cart");

    let (first, second) = tokio::join!(
        run_checkout(&pool, user.id),
        run_checkout(&pool, user.id),
    );

    let outcomes = [first, second];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    let empties = outcomes
        .iter()
        .filter(|r| matches!(r, Err(CheckoutError::EmptyCart)))
        .count();

    assert_eq!(wins, 1, "exactly one checkout must win: {outcomes:?}");
    assert_eq!(empties, 1, "the loser must see an empty cart: {outcomes:?}");

    let order_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&pool)
        .await
        .expect("count orders");
    assert_eq!(order_count, 1);

    let leftover_items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items")
        .fetch_one(&pool)
        .await
        .expect("count cart items");
    assert_eq!(leftover_items, 0);
}

async fn run_checkout(
    pool: &sqlx::SqlitePool,
    user_id: UserId,
) -> Result<mercadito_server::models::Order, CheckoutError> {
    CheckoutService::new(pool).checkout(user_id).await
}
