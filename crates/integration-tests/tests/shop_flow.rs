//! Shopper flows against a real database.
//!
//! Every test returns early unless `TEST_DATABASE_URL` is set.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use mindy_munchs_api::services::auth::spawn_token_purge;
use mindy_munchs_integration_tests::{
    TestApp, money, shipping_address, unique_email, unique_name,
};

async fn stock_of(app: &TestApp, product_id: i64) -> i64 {
    let body: Value = app
        .get(&format!("/api/products/{product_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["stock"].as_i64().unwrap()
}

#[tokio::test]
async fn test_register_login_and_profile() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let email = unique_email("meera");
    let (token, user) = app.register("Meera", &email).await;
    assert_eq!(user["email"], email.as_str());
    assert_eq!(user["role"], "user");
    assert!(user.get("password_hash").is_none());

    // Duplicate registration
    let response = app
        .post("/api/auth/register")
        .json(&json!({ "name": "Meera", "email": email, "password": "another-pass-1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post("/api/auth/login")
        .json(&json!({ "email": email, "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .put("/api/auth/me")
        .bearer_auth(&token)
        .json(&json!({ "name": "Meera Iyer", "phone": "98765 43210" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let me: Value = response.json().await.unwrap();
    assert_eq!(me["name"], "Meera Iyer");
    assert_eq!(me["phone"], "9876543210");

    let response = app
        .post("/api/auth/logout")
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.get("/api/auth/me").bearer_auth(&token).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_checkout_reserves_stock_and_cancel_restores_it() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let product = app
        .product(&unique_name("Ragi Cookies"), Decimal::new(249, 0), 10)
        .await;
    let product_id = i64::from(product.id.as_i32());
    let (token, _) = app.register("Arjun", &unique_email("arjun")).await;

    let response = app
        .post("/api/cart/items")
        .bearer_auth(&token)
        .json(&json!({ "product_id": product_id, "quantity": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cart: Value = response.json().await.unwrap();
    assert_eq!(money(&cart["subtotal"]), Decimal::new(498, 0));
    assert_eq!(money(&cart["shipping_fee"]), Decimal::new(49, 0));
    assert_eq!(money(&cart["total"]), Decimal::new(547, 0));

    let response = app
        .post("/api/orders")
        .bearer_auth(&token)
        .json(&json!({ "shipping_address": shipping_address(), "payment_method": "cod" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let order: Value = response.json().await.unwrap();
    assert_eq!(order["status"], "pending");
    assert_eq!(order["payment_status"], "pending");
    assert_eq!(money(&order["total"]), Decimal::new(547, 0));
    assert_eq!(order["items"][0]["quantity"], 2);
    let order_id = order["id"].as_i64().unwrap();

    assert_eq!(stock_of(&app, product_id).await, 8);

    // The cart is emptied by checkout.
    let cart: Value = app
        .get("/api/cart")
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);

    let response = app
        .post(&format!("/api/orders/{order_id}/cancel"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cancelled: Value = response.json().await.unwrap();
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(stock_of(&app, product_id).await, 10);

    // Cancelling again is refused and does not restock twice.
    let response = app
        .post(&format!("/api/orders/{order_id}/cancel"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(stock_of(&app, product_id).await, 10);
}

#[tokio::test]
async fn test_cart_rejects_more_than_stock() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let product = app
        .product(&unique_name("Jowar Puffs"), Decimal::new(129, 0), 3)
        .await;
    let (token, _) = app.register("Kavya", &unique_email("kavya")).await;

    let response = app
        .post("/api/cart/items")
        .bearer_auth(&token)
        .json(&json!({ "product_id": product.id, "quantity": 4 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Only 3 of"));
}

#[tokio::test]
async fn test_orders_are_private_to_their_owner() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let product = app
        .product(&unique_name("Millet Granola"), Decimal::new(599, 0), 5)
        .await;
    let (owner, _) = app.register("Owner", &unique_email("owner")).await;
    let (other, _) = app.register("Other", &unique_email("other")).await;

    app.post("/api/cart/items")
        .bearer_auth(&owner)
        .json(&json!({ "product_id": product.id, "quantity": 1 }))
        .send()
        .await
        .unwrap();
    let order: Value = app
        .post("/api/orders")
        .bearer_auth(&owner)
        .json(&json!({ "shipping_address": shipping_address() }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    // Above the free-shipping threshold.
    assert_eq!(money(&order["shipping_fee"]), Decimal::ZERO);

    let response = app
        .get(&format!("/api/orders/{}", order["id"]))
        .bearer_auth(&other)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_cart_checkout_fails() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let (token, _) = app.register("Nisha", &unique_email("nisha")).await;

    let response = app
        .post("/api/orders")
        .bearer_auth(&token)
        .json(&json!({ "shipping_address": shipping_address() }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Cart is empty");
}

#[tokio::test]
async fn test_newsletter_subscribe_is_idempotent() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let email = unique_email("news");

    for expected in [false, true] {
        let body: Value = app
            .post("/api/newsletter/subscribe")
            .json(&json!({ "email": email, "name": "Riya" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["subscribed"], true);
        assert_eq!(body["already_subscribed"], expected);
    }

    let response = app
        .post("/api/newsletter/unsubscribe")
        .json(&json!({ "email": email }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Opting back in counts as a fresh subscription.
    let body: Value = app
        .post("/api/newsletter/subscribe")
        .json(&json!({ "email": email }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["already_subscribed"], false);

    let response = app
        .post("/api/newsletter/unsubscribe")
        .json(&json!({ "email": unique_email("never") }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_concurrent_first_subscribes_all_succeed() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let email = unique_email("rush");

    let requests: Vec<_> = (0..8)
        .map(|_| {
            tokio::spawn(
                app.post("/api/newsletter/subscribe")
                    .json(&json!({ "email": email }))
                    .send(),
            )
        })
        .collect();

    let mut created = 0;
    for request in requests {
        let response = request.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        if body["already_subscribed"] == false {
            created += 1;
        }
    }
    assert_eq!(created, 1);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shop.guest WHERE email = $1")
        .bind(&email)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_expired_tokens_are_purged() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let (token, user) = app.register("Kavya", &unique_email("kavya")).await;
    let user_id = user["id"].as_i64().unwrap();
    let stale = format!("stale-{}", uuid::Uuid::new_v4().simple());

    sqlx::query(
        "INSERT INTO shop.auth_token (user_id, token_hash, expires_at) \
         VALUES ($1, $2, NOW() - INTERVAL '1 hour')",
    )
    .bind(i32::try_from(user_id).unwrap())
    .bind(&stale)
    .execute(app.pool())
    .await
    .unwrap();

    let purge = spawn_token_purge(app.pool().clone(), Duration::from_secs(3600));
    let mut remaining = 1;
    for _ in 0..50 {
        remaining = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM shop.auth_token WHERE token_hash = $1",
        )
        .bind(&stale)
        .fetch_one(app.pool())
        .await
        .unwrap();
        if remaining == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    purge.abort();
    assert_eq!(remaining, 0);

    // Live tokens survive the sweep.
    let response = app
        .get("/api/auth/me")
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
