//! Integration test harness for the Mindy Munchs API.
//!
//! Each test spawns the real router on an ephemeral port and talks to it
//! over HTTP with `reqwest`.
//!
//! # Running Tests
//!
//! ```bash
//! # Tests that need no database always run
//! cargo test -p mindy-munchs-integration-tests
//!
//! # Database-backed flows run when TEST_DATABASE_URL is set
//! TEST_DATABASE_URL=postgres://localhost/mindy_munchs_test \
//!     cargo test -p mindy-munchs-integration-tests
//! ```
//!
//! Database tests share one database, so every test uses unique emails and
//! product names.

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use std::net::SocketAddr;

use reqwest::{Client, RequestBuilder};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use mindy_munchs_api::config::{ApiConfig, DEFAULT_PAYMENT_API_BASE, PaymentConfig};
use mindy_munchs_api::db::ProductRepository;
use mindy_munchs_api::models::{Product, ProductInput};
use mindy_munchs_api::state::AppState;

/// Token pepper used by every test server.
pub const TEST_TOKEN_SECRET: &str = "kR7#vQ2!mZ9@pL4$wX8^nB3&hJ6*tF1%";

/// Gateway API secret used by test servers with payments enabled.
pub const PAYMENT_KEY_SECRET: &str = "rzp_test_secret";

/// Webhook signing secret used by test servers with payments enabled.
pub const WEBHOOK_SECRET: &str = "whsec_test_9f2c1a";

/// A running API server.
pub struct TestApp {
    pub base_url: String,
    pub client: Client,
    /// `None` for servers built on a lazy pool.
    pub pool: Option<PgPool>,
}

impl TestApp {
    /// Server with a pool that never connects. Only routes that fail before
    /// touching the database are usable.
    pub async fn without_database(configure: impl FnOnce(&mut ApiConfig)) -> Self {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .expect("lazy pool");
        let mut config = test_config("postgres://localhost/unused");
        configure(&mut config);
        Self::spawn(config, pool, false).await
    }

    /// Server on the migrated test database, or `None` when
    /// `TEST_DATABASE_URL` is unset.
    pub async fn with_database() -> Option<Self> {
        Self::with_database_configured(|_| {}).await
    }

    /// Like [`TestApp::with_database`], with extra configuration applied.
    pub async fn with_database_configured(
        configure: impl FnOnce(&mut ApiConfig),
    ) -> Option<Self> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .expect("Failed to connect to TEST_DATABASE_URL");
        sqlx::migrate!("../api/migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        let mut config = test_config(&url);
        configure(&mut config);
        Some(Self::spawn(config, pool, true).await)
    }

    async fn spawn(config: ApiConfig, pool: PgPool, keep_pool: bool) -> Self {
        let state = AppState::new(config, pool.clone()).expect("app state");
        let app = mindy_munchs_api::service(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            axum::serve(
                listener,
                axum::ServiceExt::<axum::extract::Request>::into_make_service_with_connect_info::<
                    SocketAddr,
                >(app),
            )
            .await
            .expect("test server");
        });

        Self {
            base_url: format!("http://{addr}"),
            client: Client::new(),
            pool: keep_pool.then_some(pool),
        }
    }

    /// The database pool. Panics for servers built without one.
    pub fn pool(&self) -> &PgPool {
        self.pool.as_ref().expect("test app has no database")
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(format!("{}{path}", self.base_url))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(format!("{}{path}", self.base_url))
    }

    pub fn put(&self, path: &str) -> RequestBuilder {
        self.client.put(format!("{}{path}", self.base_url))
    }

    pub fn patch(&self, path: &str) -> RequestBuilder {
        self.client.patch(format!("{}{path}", self.base_url))
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(format!("{}{path}", self.base_url))
    }

    /// Register a shopper and return `(token, user)`.
    pub async fn register(&self, name: &str, email: &str) -> (String, Value) {
        let response = self
            .post("/api/auth/register")
            .json(&serde_json::json!({
                "name": name,
                "email": email,
                "password": "millet-and-jaggery",
            }))
            .send()
            .await
            .expect("register request");
        assert_eq!(response.status(), 201, "register {email}");
        let body: Value = response.json().await.expect("register body");
        let token = body["token"].as_str().expect("token").to_owned();
        (token, body["user"].clone())
    }

    /// Insert an active product directly.
    pub async fn product(&self, name: &str, price: Decimal, stock: i32) -> Product {
        ProductRepository::new(self.pool())
            .create(&ProductInput {
                name: name.to_owned(),
                description: "Test product".to_owned(),
                price,
                compare_at_price: None,
                category: "Test".to_owned(),
                stock,
                image_urls: Vec::new(),
                is_featured: false,
                is_active: true,
            })
            .await
            .expect("insert product")
    }
}

/// Configuration shared by test servers: no email, no payments.
pub fn test_config(database_url: &str) -> ApiConfig {
    ApiConfig::with_defaults(
        SecretString::from(database_url.to_owned()),
        SecretString::from(TEST_TOKEN_SECRET),
    )
}

/// Enable the payment gateway with the test secrets.
///
/// The gateway base URL is never called by tests: gateway orders are linked
/// directly in the database.
pub fn enable_payments(config: &mut ApiConfig) {
    config.payment = Some(PaymentConfig {
        key_id: "rzp_test_key".to_owned(),
        key_secret: SecretString::from(PAYMENT_KEY_SECRET),
        webhook_secret: Some(SecretString::from(WEBHOOK_SECRET)),
        api_base: DEFAULT_PAYMENT_API_BASE.to_owned(),
    });
}

/// A unique email address for one test.
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", uuid::Uuid::new_v4().simple())
}

/// A unique product name for one test.
pub fn unique_name(prefix: &str) -> String {
    format!("{prefix} {}", uuid::Uuid::new_v4().simple())
}

/// Parse a JSON money string (`"249.00"`).
pub fn money(value: &Value) -> Decimal {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("not a money string: {value}"))
}

/// A valid shipping address body.
pub fn shipping_address() -> Value {
    serde_json::json!({
        "full_name": "Meera Iyer",
        "phone": "9876543210",
        "line1": "12 Lake View Road",
        "city": "Bengaluru",
        "state": "Karnataka",
        "pincode": "560001",
    })
}
