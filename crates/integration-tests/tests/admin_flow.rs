//! Admin API flows against a real database.
//!
//! Every test returns early unless `TEST_DATABASE_URL` is set.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use secrecy::SecretString;

use mindy_munchs_api::db::{OrderRepository, UserRepository};
use mindy_munchs_api::services::payments::sign;
use mindy_munchs_core::{OrderId, UserId, UserRole};
use mindy_munchs_integration_tests::{
    PAYMENT_KEY_SECRET, TestApp, WEBHOOK_SECRET, enable_payments, money, shipping_address,
    unique_email, unique_name,
};

fn user_id(user: &Value) -> UserId {
    UserId::new(i32::try_from(user["id"].as_i64().unwrap()).unwrap())
}

/// Register an account and give it the admin role. Returns `(token, user)`.
async fn admin(app: &TestApp, email: &str) -> (String, Value) {
    let (token, user) = app.register("Store Admin", email).await;
    UserRepository::new(app.pool())
        .set_role(user_id(&user), UserRole::Admin)
        .await
        .unwrap();
    (token, user)
}

/// Put `quantity` units in the cart and check out with `payment_method`.
async fn checkout(
    app: &TestApp,
    token: &str,
    product_id: i64,
    quantity: i32,
    payment_method: &str,
) -> Value {
    let response = app
        .post("/api/cart/items")
        .bearer_auth(token)
        .json(&json!({ "product_id": product_id, "quantity": quantity }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .post("/api/orders")
        .bearer_auth(token)
        .json(&json!({
            "shipping_address": shipping_address(),
            "payment_method": payment_method,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

async fn revenue(app: &TestApp, token: &str) -> Decimal {
    let stats: Value = app
        .get("/api/admin/dashboard")
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    money(&stats["totals"]["revenue"])
}

async fn stock_in_inventory(app: &TestApp, token: &str, product_id: i64) -> i64 {
    let inventory: Vec<Value> = app
        .get("/api/admin/inventory")
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    inventory
        .iter()
        .find(|p| p["id"] == json!(product_id))
        .unwrap()["stock"]
        .as_i64()
        .unwrap()
}

/// Link a gateway order id as if `create-order` had reached the gateway.
async fn link_gateway_order(app: &TestApp, order: &Value) -> String {
    let gateway_order_id = format!("order_{}", uuid::Uuid::new_v4().simple());
    let id = OrderId::new(i32::try_from(order["id"].as_i64().unwrap()).unwrap());
    OrderRepository::new(app.pool())
        .set_gateway_order_id(id, &gateway_order_id)
        .await
        .unwrap();
    gateway_order_id
}

#[tokio::test]
async fn test_shoppers_cannot_use_admin_api() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let (token, _) = app.register("Shopper", &unique_email("shopper")).await;

    let response = app
        .get("/api/admin/dashboard")
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Admin access required");
}

#[tokio::test]
async fn test_dashboard_shape() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let (token, _) = admin(&app, &unique_email("dash")).await;

    let response = app
        .get("/api/admin/dashboard")
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stats: Value = response.json().await.unwrap();

    for key in ["revenue", "orders", "users", "products", "subscribers"] {
        assert!(stats["totals"].get(key).is_some(), "totals.{key}");
    }
    for status in ["pending", "processing", "shipped", "delivered", "cancelled"] {
        assert!(stats["orders_by_status"][status].is_i64(), "{status}");
    }
    for status in ["pending", "paid", "failed", "refunded"] {
        assert!(stats["payments_by_status"][status].is_i64(), "{status}");
    }
    let months: Vec<&str> = stats["revenue_by_month"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["month"].as_str().unwrap())
        .collect();
    assert_eq!(months.len(), 12);
    assert!(months.windows(2).all(|w| w[0] < w[1]), "{months:?}");
    for month in stats["revenue_by_month"].as_array().unwrap() {
        assert!(money(&month["revenue"]) >= Decimal::ZERO);
        assert!(month["orders"].is_i64());
    }
    assert!(stats["recent_orders"].as_array().unwrap().len() <= 5);
    assert!(stats["top_products"].as_array().unwrap().len() <= 5);
    assert!(stats["stock_levels"]["low_stock"].is_i64());
}

#[tokio::test]
async fn test_admin_cancel_restocks_once() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let product = app
        .product(&unique_name("Bajra Crackers"), Decimal::new(149, 0), 6)
        .await;
    let (shopper, _) = app.register("Shopper", &unique_email("buyer")).await;
    let (token, _) = admin(&app, &unique_email("ops")).await;

    app.post("/api/cart/items")
        .bearer_auth(&shopper)
        .json(&json!({ "product_id": product.id, "quantity": 3 }))
        .send()
        .await
        .unwrap();
    let order: Value = app
        .post("/api/orders")
        .bearer_auth(&shopper)
        .json(&json!({ "shipping_address": shipping_address() }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let path = format!("/api/admin/orders/{}", order["id"]);

    let response = app
        .patch(&path)
        .bearer_auth(&token)
        .json(&json!({ "status": "shipped" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["status"], "shipped");

    let response = app
        .patch(&path)
        .bearer_auth(&token)
        .json(&json!({ "status": "teleported" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    for _ in 0..2 {
        let response = app
            .patch(&path)
            .bearer_auth(&token)
            .json(&json!({ "status": "cancelled" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let inventory: Vec<Value> = app
        .get("/api/admin/inventory")
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let row = inventory
        .iter()
        .find(|p| p["id"] == json!(product.id))
        .unwrap();
    assert_eq!(row["stock"], 6);
    assert_eq!(row["stock_level"], "low_stock");
}

#[tokio::test]
async fn test_cancelled_order_cannot_be_reopened() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let product = app
        .product(&unique_name("Foxtail Puffs"), Decimal::new(99, 0), 6)
        .await;
    let product_id = i64::from(product.id.as_i32());
    let (shopper, _) = app.register("Shopper", &unique_email("reopen")).await;
    let (token, _) = admin(&app, &unique_email("ops")).await;

    let order = checkout(&app, &shopper, product_id, 3, "cod").await;
    let path = format!("/api/admin/orders/{}", order["id"]);
    assert_eq!(stock_in_inventory(&app, &token, product_id).await, 3);

    for status in ["cancelled", "pending", "cancelled", "processing", "cancelled"] {
        app.patch(&path)
            .bearer_auth(&token)
            .json(&json!({ "status": status }))
            .send()
            .await
            .unwrap();
    }

    for status in ["pending", "processing", "shipped", "delivered"] {
        let response = app
            .patch(&path)
            .bearer_auth(&token)
            .json(&json!({ "status": status }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{status}");
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "Cancelled orders cannot be reopened");
    }

    // Payment bookkeeping on a cancelled order is still allowed.
    let response = app
        .patch(&path)
        .bearer_auth(&token)
        .json(&json!({ "payment_status": "refunded" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["status"], "cancelled");

    assert_eq!(stock_in_inventory(&app, &token, product_id).await, 6);
}

#[tokio::test]
async fn test_online_payment_marks_order_paid_and_counts_revenue() {
    let Some(app) = TestApp::with_database_configured(enable_payments).await else {
        return;
    };
    let product = app
        .product(&unique_name("Kodo Granola"), Decimal::new(120, 0), 10)
        .await;
    let product_id = i64::from(product.id.as_i32());
    let (shopper, _) = app.register("Shopper", &unique_email("payer")).await;
    let (token, _) = admin(&app, &unique_email("finance")).await;

    // A second server has its own dashboard cache, so this reading is fresh.
    let baseline = {
        let other = TestApp::with_database().await.unwrap();
        revenue(&other, &token).await
    };

    // Checkout signature flow.
    let first = checkout(&app, &shopper, product_id, 2, "online").await;
    assert_eq!(first["payment_status"], "pending");
    assert_eq!(money(&first["total"]), Decimal::new(289, 0));
    let gateway_order_id = link_gateway_order(&app, &first).await;
    let signature = sign(
        &SecretString::from(PAYMENT_KEY_SECRET),
        format!("{gateway_order_id}|pay_verify_1").as_bytes(),
    )
    .unwrap();

    let response = app
        .post("/api/payments/verify")
        .bearer_auth(&shopper)
        .json(&json!({
            "order_id": first["id"],
            "gateway_order_id": gateway_order_id,
            "gateway_payment_id": "pay_verify_1",
            "signature": signature,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let paid: Value = response.json().await.unwrap();
    assert_eq!(paid["payment_status"], "paid");
    assert_eq!(paid["status"], "processing");
    assert_eq!(paid["gateway_payment_id"], "pay_verify_1");

    // Webhook capture flow, delivered twice.
    let second = checkout(&app, &shopper, product_id, 2, "online").await;
    let gateway_order_id = link_gateway_order(&app, &second).await;
    let body = json!({
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": "pay_hook_1",
                    "order_id": gateway_order_id,
                    "amount": 28_900,
                }
            }
        }
    })
    .to_string();
    let signature = sign(&SecretString::from(WEBHOOK_SECRET), body.as_bytes()).unwrap();

    for _ in 0..2 {
        let response = app
            .post("/api/payments/webhook")
            .header("content-type", "application/json")
            .header("x-razorpay-signature", &signature)
            .body(body.clone())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let ack: Value = response.json().await.unwrap();
        assert_eq!(ack["status"], "ok");
    }

    let order: Value = app
        .get(&format!("/api/orders/{}", second["id"]))
        .bearer_auth(&shopper)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(order["payment_status"], "paid");
    assert_eq!(order["status"], "processing");

    // Other tests may add paid orders concurrently, never remove them.
    let gained = revenue(&app, &token).await - baseline;
    assert!(gained >= Decimal::new(578, 0), "revenue grew by {gained}");
}

#[tokio::test]
async fn test_stock_update_validates_and_refreshes_catalog() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let product = app
        .product(&unique_name("Date Bites"), Decimal::new(199, 0), 4)
        .await;
    let (token, _) = admin(&app, &unique_email("stock")).await;
    let path = format!("/api/admin/inventory/{}", product.id);

    // Warm the product cache.
    app.get(&format!("/api/products/{}", product.id))
        .send()
        .await
        .unwrap();

    let response = app
        .patch(&path)
        .bearer_auth(&token)
        .json(&json!({ "stock": -1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .patch(&path)
        .bearer_auth(&token)
        .json(&json!({ "stock": 40 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = app
        .get(&format!("/api/products/{}", product.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["stock"], 40);
    assert_eq!(body["stock_level"], "in_stock");
}

#[tokio::test]
async fn test_super_admins_and_self_are_protected() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    // Sub-addresses of a configured super-admin are protected too.
    let owner_email = format!("owner+{}@mindymunchs.com", uuid_suffix());
    let (_, owner) = admin(&app, &owner_email).await;
    let (token, me) = admin(&app, &unique_email("ops")).await;
    let (_, other) = admin(&app, &unique_email("packing")).await;

    let demote = |user: &Value| format!("/api/admin/users/{}/demote", user["id"]);

    let response = app.patch(&demote(&owner)).bearer_auth(&token).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .delete(&format!("/api/admin/users/{}", owner["id"]))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.patch(&demote(&me)).bearer_auth(&token).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.patch(&demote(&other)).bearer_auth(&token).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let demoted: Value = response.json().await.unwrap();
    assert_eq!(demoted["role"], "user");

    let admins: Vec<Value> = app
        .get("/api/admin/admins")
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let listed_owner = admins.iter().find(|a| a["id"] == owner["id"]).unwrap();
    assert_eq!(listed_owner["is_super_admin"], true);
    assert!(admins.iter().all(|a| a["id"] != other["id"]));
    // Super-admins sort ahead of regular admins.
    let first_regular = admins
        .iter()
        .position(|a| a["is_super_admin"] == false)
        .unwrap_or(admins.len());
    assert!(admins[..first_regular].iter().any(|a| a["id"] == owner["id"]));
}

#[tokio::test]
async fn test_testimonial_moderation() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let (shopper, _) = app.register("Lakshmi", &unique_email("review")).await;
    let (token, _) = admin(&app, &unique_email("mod")).await;
    let content = format!("Loved the ragi cookies! {}", uuid_suffix());

    let response = app
        .post("/api/testimonials")
        .bearer_auth(&shopper)
        .json(&json!({ "content": content, "rating": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let testimonial: Value = response.json().await.unwrap();
    assert_eq!(testimonial["name"], "Lakshmi");
    assert_eq!(testimonial["is_approved"], false);

    assert!(!is_public(&app, &testimonial["id"]).await);

    let response = app
        .patch(&format!("/api/admin/testimonials/{}", testimonial["id"]))
        .bearer_auth(&token)
        .json(&json!({ "is_approved": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(is_public(&app, &testimonial["id"]).await);

    let response = app
        .delete(&format!("/api/admin/testimonials/{}", testimonial["id"]))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(!is_public(&app, &testimonial["id"]).await);
}

#[tokio::test]
async fn test_newsletter_send_without_smtp_is_unavailable() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let (token, _) = admin(&app, &unique_email("news-admin")).await;

    let response = app
        .post("/api/admin/newsletter/send")
        .bearer_auth(&token)
        .json(&json!({ "subject": "New flavours", "body": "Hello!" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

async fn is_public(app: &TestApp, id: &Value) -> bool {
    let public: Vec<Value> = app
        .get("/api/testimonials")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    public.iter().any(|t| &t["id"] == id)
}

fn uuid_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[tokio::test]
async fn test_product_edit_keeps_concurrent_stock_reservation() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let product = app
        .product(&unique_name("Jowar Flakes"), Decimal::new(180, 0), 10)
        .await;
    let (token, _) = admin(&app, &unique_email("catalog")).await;

    // Hold a reservation open while the edit is in flight.
    let mut reservation = app.pool().begin().await.unwrap();
    sqlx::query("UPDATE shop.product SET stock = stock - 2 WHERE id = $1")
        .bind(product.id.as_i32())
        .execute(&mut *reservation)
        .await
        .unwrap();

    let edit = tokio::spawn(
        app.put(&format!("/api/products/{}", product.id))
            .bearer_auth(&token)
            .json(&json!({ "price": "199.00" }))
            .send(),
    );
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    reservation.commit().await.unwrap();

    let response = edit.await.unwrap().unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let edited: Value = response.json().await.unwrap();
    assert_eq!(money(&edited["price"]), Decimal::new(199, 0));
    assert_eq!(edited["stock"], 8);

    let stock: i32 = sqlx::query_scalar("SELECT stock FROM shop.product WHERE id = $1")
        .bind(product.id.as_i32())
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(stock, 8);
}
