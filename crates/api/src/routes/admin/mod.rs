//! Admin API handlers. Every route requires an admin bearer token.
//!
//! ```text
//! GET    /dashboard                  - Store aggregates
//! GET    /inventory                  - Products by stock (?level=)
//! GET    /inventory/summary          - Stock bucket counts
//! PATCH  /inventory/{id}             - Set stock
//! GET    /orders                     - All orders (paged, filterable)
//! PATCH  /orders/{id}                - Change status / payment status
//! GET    /users                      - All users (?role=)
//! GET    /admins                     - Admins, super-admins first
//! PATCH  /users/{id}/promote         - Grant admin
//! PATCH  /users/{id}/demote          - Revoke admin
//! DELETE /users/{id}                 - Delete account
//! GET    /testimonials               - All testimonials
//! PATCH  /testimonials/{id}          - Approve / hide
//! DELETE /testimonials/{id}          - Delete testimonial
//! GET    /newsletter/subscribers     - Subscribers (paged)
//! POST   /newsletter/send            - Broadcast to subscribers
//! ```

pub mod dashboard;
pub mod inventory;
pub mod newsletter;
pub mod orders;
pub mod testimonials;
pub mod users;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};

use crate::state::AppState;

/// Create the admin router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard::index))
        .route("/inventory", get(inventory::index))
        .route("/inventory/summary", get(inventory::summary))
        .route("/inventory/{id}", patch(inventory::update))
        .route("/orders", get(orders::index))
        .route("/orders/{id}", patch(orders::update))
        .route("/users", get(users::index))
        .route("/users/{id}", delete(users::delete))
        .route("/users/{id}/promote", patch(users::promote))
        .route("/users/{id}/demote", patch(users::demote))
        .route("/admins", get(users::admins))
        .route("/testimonials", get(testimonials::index))
        .route(
            "/testimonials/{id}",
            patch(testimonials::moderate).delete(testimonials::delete),
        )
        .route("/newsletter/subscribers", get(newsletter::subscribers))
        .route("/newsletter/send", post(newsletter::send))
}
