//! HTTP route handlers for the store API.
//!
//! # Route Structure
//!
//! ```text
//! # Auth (register/login are rate limited separately)
//! POST   /api/auth/register            - Create account, returns token
//! POST   /api/auth/login               - Exchange credentials for a token
//! POST   /api/auth/logout              - Revoke the presented token
//! GET    /api/auth/me                  - Current user
//! PUT    /api/auth/me                  - Update name/phone
//! PUT    /api/auth/me/password         - Change password
//!
//! # Catalog
//! GET    /api/products                 - Filtered, paginated listing
//! GET    /api/products/categories      - Categories with counts
//! GET    /api/products/{id}            - Product detail
//! POST   /api/products                 - Create (admin)
//! PUT    /api/products/{id}            - Update (admin)
//! DELETE /api/products/{id}            - Soft delete (admin)
//!
//! # Cart (auth)
//! GET    /api/cart                     - Cart with totals
//! DELETE /api/cart                     - Clear
//! POST   /api/cart/items               - Add product
//! PUT    /api/cart/items/{product_id}  - Set quantity
//! DELETE /api/cart/items/{product_id}  - Remove line
//!
//! # Orders (auth)
//! POST   /api/orders                   - Checkout
//! GET    /api/orders                   - Own orders
//! GET    /api/orders/{id}              - Order detail
//! POST   /api/orders/{id}/cancel       - Customer cancel
//!
//! # Payments
//! POST   /api/payments/create-order    - Gateway order for an online order
//! POST   /api/payments/verify          - Client-side payment confirmation
//! POST   /api/payments/webhook         - Gateway webhook (signed)
//!
//! # Newsletter / testimonials
//! POST   /api/newsletter/subscribe
//! POST   /api/newsletter/unsubscribe
//! GET    /api/testimonials             - Approved testimonials
//! POST   /api/testimonials             - Submit (auth)
//!
//! # Admin
//! /api/admin/*                         - See [`admin`]
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod newsletter;
pub mod orders;
pub mod payments;
pub mod products;
pub mod testimonials;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let credentials = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me).put(auth::update_me))
        .route("/me/password", put(auth::change_password))
        .merge(credentials)
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route("/categories", get(products::categories))
        .route(
            "/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::delete),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{product_id}",
            put(cart::update_item).delete(cart::remove_item),
        )
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
}

/// Create the payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/create-order", post(payments::create_order))
        .route("/verify", post(payments::verify))
        .route("/webhook", post(payments::webhook))
}

/// Create the newsletter routes router.
pub fn newsletter_routes() -> Router<AppState> {
    Router::new()
        .route("/subscribe", post(newsletter::subscribe))
        .route("/unsubscribe", post(newsletter::unsubscribe))
}

/// Create the testimonial routes router.
pub fn testimonial_routes() -> Router<AppState> {
    Router::new().route("/", get(testimonials::index).post(testimonials::create))
}

/// Everything under `/api`, with the general rate limit applied.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .nest("/payments", payment_routes())
        .nest("/newsletter", newsletter_routes())
        .nest("/testimonials", testimonial_routes())
        .nest("/admin", admin::routes())
        .layer(api_rate_limiter())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use secrecy::SecretString;
    use tower::ServiceExt;

    use crate::config::ApiConfig;
    use crate::state::AppState;

    fn state() -> AppState {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let config = ApiConfig::with_defaults(
            SecretString::from("postgres://localhost/unused"),
            SecretString::from("kR7#vQ2!mZ9@pL4$wX8^nB3&hJ6*tF1%"),
        );
        AppState::new(config, pool).unwrap()
    }

    fn request(method: Method, uri: &str, body: Option<&str>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.7");
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        for (method, uri) in [
            (Method::GET, "/api/auth/me"),
            (Method::GET, "/api/cart"),
            (Method::POST, "/api/orders/1/cancel"),
            (Method::GET, "/api/admin/dashboard"),
            (Method::PATCH, "/api/admin/users/2/demote"),
        ] {
            let response = crate::app(state())
                .oneshot(request(method.clone(), uri, None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let response = crate::app(state())
            .oneshot(request(Method::GET, "/api/nope", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "Not found");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let response = crate::app(state())
            .oneshot(request(
                Method::POST,
                "/api/auth/login",
                Some(r#"{"email": "a@b.co""#),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_bad_path_id_is_bad_request() {
        let response = crate::app(state())
            .oneshot(request(Method::GET, "/api/products/not-a-number", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_webhook_without_gateway_is_unavailable() {
        // Payments are not configured in the default config.
        let response = crate::app(state())
            .oneshot(request(
                Method::POST,
                "/api/payments/webhook",
                Some(r#"{"event":"payment.captured","payload":{}}"#),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_login_is_rate_limited() {
        let app = crate::app(state());
        let mut statuses = Vec::new();
        for _ in 0..6 {
            let response = app
                .clone()
                .oneshot(request(Method::POST, "/api/auth/login", Some("{")))
                .await
                .unwrap();
            statuses.push(response.status());
        }
        assert_eq!(statuses[..5], [StatusCode::BAD_REQUEST; 5]);
        assert_eq!(statuses[5], StatusCode::TOO_MANY_REQUESTS);
    }
}
